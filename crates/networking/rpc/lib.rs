pub mod clients;
pub mod types;
pub mod utils;

pub use clients::{
    BackendClient, ChainClient, EthClient, MetadataStore, NewBlockSender, NewBlockSubscription,
    RecordReceipt, backend_errors, eth_errors,
};
