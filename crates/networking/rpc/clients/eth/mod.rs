use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::{
    types::{
        block::RpcBlock,
        block_identifier::{BlockIdentifier, BlockTag},
        receipt::{RpcLog, RpcReceipt},
        transaction::RpcTransaction,
    },
    utils::{RpcErrorResponse, RpcRequest, RpcRequestId, RpcSuccessResponse, parse_hex_u64},
};
use bytes::Bytes;
use chainsync_common::{Address, H256};
use errors::{EthClientError, RpcRequestError};
use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

pub mod errors;

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RpcResponse {
    Success(RpcSuccessResponse),
    Error(RpcErrorResponse),
}

/// JSON-RPC client for an Ethereum node. Every request carries the
/// transport timeout configured at construction; an elapsed timeout is
/// reported as [`EthClientError::TimeoutError`].
#[derive(Debug, Clone)]
pub struct EthClient {
    client: Client,
    pub urls: Vec<Url>,
    pub request_timeout: Duration,
}

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl EthClient {
    pub fn new(url: &str) -> Result<EthClient, EthClientError> {
        Self::new_with_config(vec![url], DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn new_with_config(
        urls: Vec<&str>,
        request_timeout: Duration,
    ) -> Result<Self, EthClientError> {
        let urls = urls
            .iter()
            .map(|url| {
                Url::parse(url)
                    .map_err(|_| EthClientError::ParseUrlError(format!("Failed to parse url {url}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if urls.is_empty() {
            return Err(EthClientError::ParseUrlError(
                "At least one RPC url is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            urls,
            request_timeout,
        })
    }

    pub fn new_with_multiple_urls(urls: Vec<String>) -> Result<EthClient, EthClientError> {
        Self::new_with_config(
            urls.iter().map(AsRef::as_ref).collect(),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Send a request to the RPC. Tries each URL until one succeeds.
    pub async fn send_request(&self, request: RpcRequest) -> Result<RpcResponse, EthClientError> {
        let mut response = Err(EthClientError::FailedAllRPC);

        for url in self.urls.iter() {
            response = self.send_request_to_url(url, &request).await;
            // A node that lacks an endpoint answers with an error object, so the
            // next url still gets a chance.
            match &response {
                Ok(RpcResponse::Success(_)) => {
                    debug!(endpoint = %url, method = %request.method, "RPC request successful");
                    return response;
                }
                Ok(RpcResponse::Error(err)) => {
                    debug!(endpoint = %url, method = %request.method, error = ?err.error, "RPC server returned an error");
                }
                Err(error) => {
                    warn!(endpoint = %url, method = %request.method, %error, "Could not request RPC server");
                }
            }
        }

        response
    }

    /// Send a request to a specific URL.
    async fn send_request_to_url(
        &self,
        rpc_url: &Url,
        request: &RpcRequest,
    ) -> Result<RpcResponse, EthClientError> {
        let id = uuid::Uuid::new_v4();
        trace!(endpoint = %rpc_url, ?request, %id, "Sending RPC request");

        self.client
            .post(rpc_url.as_str())
            .header("content-type", "application/json")
            .body(serde_json::ser::to_string(&request).map_err(|error| {
                EthClientError::FailedToSerializeRequestBody(format!("{error}: {request:?}"))
            })?)
            .send()
            .await
            .inspect(|_| trace!(endpoint = %rpc_url, %id, "Request finished successfully"))
            .map_err(map_transport_error)?
            .json::<RpcResponse>()
            .await
            .inspect(|body| trace!(endpoint = %rpc_url, %id, ?body, "Response deserialized successfully"))
            .inspect_err(|err| trace!(endpoint = %rpc_url, %id, %err, "Failed to deserialize response"))
            .map_err(map_transport_error)
    }

    /// Issues `method` and decodes the `result` field into `T`.
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Vec<Value>>,
    ) -> Result<T, EthClientError> {
        let request = RpcRequest::new(
            RpcRequestId::Number(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
            method,
            params,
        );

        match self.send_request(request).await? {
            RpcResponse::Success(result) => serde_json::from_value(result.result)
                .map_err(|source| RpcRequestError::SerdeJSONError {
                    method: method.to_string(),
                    source,
                })
                .map_err(EthClientError::from),
            RpcResponse::Error(error_response) => Err(RpcRequestError::RPCError {
                method: method.to_string(),
                message: error_response.error.message,
                data: error_response.error.data,
            }
            .into()),
        }
    }

    async fn request_quantity(
        &self,
        method: &str,
        params: Option<Vec<Value>>,
    ) -> Result<u64, EthClientError> {
        let quantity: String = self.request(method, params).await?;
        parse_hex_u64(&quantity)
            .map_err(|source| RpcRequestError::ParseIntError {
                method: method.to_string(),
                source,
            })
            .map_err(EthClientError::from)
    }

    pub async fn get_block_number(&self) -> Result<u64, EthClientError> {
        self.request_quantity("eth_blockNumber", None).await
    }

    pub async fn get_chain_id(&self) -> Result<u64, EthClientError> {
        self.request_quantity("eth_chainId", None).await
    }

    /// Fetches a block by number or tag. `hydrated` selects full transaction
    /// objects instead of hashes. Unknown blocks come back as `None`.
    pub async fn get_block_by_number(
        &self,
        block: BlockIdentifier,
        hydrated: bool,
    ) -> Result<Option<RpcBlock>, EthClientError> {
        self.request(
            "eth_getBlockByNumber",
            Some(vec![block.into(), json!(hydrated)]),
        )
        .await
    }

    pub async fn get_pending_block(&self) -> Result<Option<RpcBlock>, EthClientError> {
        self.get_block_by_number(BlockIdentifier::Tag(BlockTag::Pending), true)
            .await
    }

    pub async fn get_transaction_by_hash(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcTransaction>, EthClientError> {
        self.request(
            "eth_getTransactionByHash",
            Some(vec![json!(format!("{tx_hash:#x}"))]),
        )
        .await
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcReceipt>, EthClientError> {
        self.request(
            "eth_getTransactionReceipt",
            Some(vec![json!(format!("{tx_hash:#x}"))]),
        )
        .await
    }

    /// Returns the deployed bytecode at `address`. Both `0x` and the `0x0`
    /// sentinel some nodes emit decode to empty bytes.
    pub async fn get_code(
        &self,
        address: Address,
        block: BlockIdentifier,
    ) -> Result<Bytes, EthClientError> {
        let hex_str: String = self
            .request(
                "eth_getCode",
                Some(vec![json!(format!("{address:#x}")), block.into()]),
            )
            .await?;
        decode_code(&hex_str)
            .map_err(|source| RpcRequestError::HexError {
                method: "eth_getCode".to_string(),
                source,
            })
            .map_err(EthClientError::from)
    }

    pub async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
    ) -> Result<Vec<RpcLog>, EthClientError> {
        let params = Some(vec![json!({
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
            "address": format!("{address:#x}"),
        })]);
        self.request("eth_getLogs", params).await
    }

    /// Development-node extension. Production nodes answer with an RPC error.
    pub async fn evm_set_automine(&self, enabled: bool) -> Result<(), EthClientError> {
        let _: Value = self
            .request("evm_setAutomine", Some(vec![json!(enabled)]))
            .await?;
        Ok(())
    }

    /// Development-node extension: mines exactly one block.
    pub async fn evm_mine(&self) -> Result<(), EthClientError> {
        let _: Value = self.request("evm_mine", Some(vec![])).await?;
        Ok(())
    }
}

fn map_transport_error(error: reqwest::Error) -> EthClientError {
    if error.is_timeout() {
        EthClientError::TimeoutError
    } else {
        EthClientError::ReqwestError(error)
    }
}

/// Decodes an `eth_getCode` result, treating the `0x0` sentinel as no code.
pub fn decode_code(hex_str: &str) -> Result<Bytes, hex::FromHexError> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if stripped.is_empty() || stripped == "0" {
        return Ok(Bytes::new());
    }
    hex::decode(stripped).map(Into::into)
}
