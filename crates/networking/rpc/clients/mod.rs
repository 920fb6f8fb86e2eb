pub mod backend;
pub mod chain;
pub mod eth;
pub mod subscription;

pub use backend::{BackendClient, MetadataStore, RecordReceipt, errors as backend_errors};
pub use chain::ChainClient;
pub use eth::{EthClient, errors as eth_errors};
pub use subscription::{NewBlockSender, NewBlockSubscription};
