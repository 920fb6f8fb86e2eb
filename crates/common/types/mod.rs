mod deployment;
mod state;
mod timeline;
mod transaction;

pub use deployment::{Deployment, DeploymentRecord};
pub use state::{ClockState, MiningState};
pub use timeline::BlockSlot;
pub use transaction::{TransactionRecord, TxKind, TxStatus};
