//! Chain-state reconciliation engine for a contract deployment console.
//!
//! Keeps a local view of recorded deployments, recent transactions, the
//! pending pool and block cadence in sync with a development or public node.

pub mod block_clock;
pub mod config;
pub mod error;
pub mod events;
pub mod mempool_monitor;
pub mod mining_controller;
pub mod reconciler;
pub mod session;
pub mod timeline;
mod utils;

pub use block_clock::{BlockClock, ClockSettings, ClockTracker};
pub use config::EngineConfig;
pub use error::{ChainSyncError, ErrorKind};
pub use events::{ContractEvent, EventFeed};
pub use mempool_monitor::{MempoolMonitor, MempoolSnapshot, PollOutcome};
pub use mining_controller::{MineOutcome, MiningController};
pub use reconciler::{DeploymentReconciler, Reconciliation, ScanOmission};
pub use session::{ConsoleSession, SyncSnapshot, metadata_client};
