use chainsync_common::Address;
use chainsync_rpc::{backend_errors::BackendClientError, eth_errors::EthClientError};

/// Coarse classification every engine failure maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure, timeout or a request the node rejected.
    RpcError,
    /// The block subscription was lost.
    NodeUnavailable,
    /// A recorded contract has no bytecode anymore. Not a fault.
    StaleDeployment,
    /// A manual mine did not advance the head by exactly one block.
    InconsistentMine,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainSyncError {
    #[error("RPC error: {0}")]
    Rpc(#[from] EthClientError),

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Deployment {0:#x} has no bytecode")]
    StaleDeployment(Address),

    #[error("Manual mine moved the head from {before} to {after}")]
    InconsistentMine { before: u64, after: u64 },

    #[error("Metadata store error: {0}")]
    MetadataStore(#[from] BackendClientError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChainSyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainSyncError::Rpc(EthClientError::SubscriptionClosed(_))
            | ChainSyncError::NodeUnavailable(_) => ErrorKind::NodeUnavailable,
            ChainSyncError::Rpc(_)
            | ChainSyncError::MetadataStore(_)
            | ChainSyncError::Config(_) => ErrorKind::RpcError,
            ChainSyncError::StaleDeployment(_) => ErrorKind::StaleDeployment,
            ChainSyncError::InconsistentMine { .. } => ErrorKind::InconsistentMine,
        }
    }
}
