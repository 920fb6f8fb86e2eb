/// A single error type for all RPC request failures.
#[derive(Debug, thiserror::Error)]
pub enum RpcRequestError {
    #[error("{method}: {source}")]
    SerdeJSONError {
        method: String,
        source: serde_json::Error,
    },
    #[error("{method}: {message} (data: {data:?})")]
    RPCError {
        method: String,
        message: String,
        data: Option<serde_json::Value>,
    },
    #[error("{method}: {source}")]
    ParseIntError {
        method: String,
        source: std::num::ParseIntError,
    },
    #[error("{method}: {source}")]
    HexError {
        method: String,
        source: hex::FromHexError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EthClientError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("RPC request error: {0}")]
    RpcRequestError(#[from] RpcRequestError),
    #[error("Failed to serialize request body: {0}")]
    FailedToSerializeRequestBody(String),
    #[error("Request timed out")]
    TimeoutError,
    #[error("Parse Url Error. {0}")]
    ParseUrlError(String),
    #[error("All RPC calls failed")]
    FailedAllRPC,
    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),
    #[error("Error: {0}")]
    Custom(String),
}

impl EthClientError {
    /// True when the node answered with a JSON-RPC error object, i.e. it is
    /// reachable but refused the call (e.g. a production node rejecting
    /// `evm_mine`).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EthClientError::RpcRequestError(RpcRequestError::RPCError { .. })
        )
    }
}
