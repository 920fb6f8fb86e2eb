//! Client for the deployment metadata backend: the off-chain store that
//! remembers which contracts a user deployed on which network.

use async_trait::async_trait;
use chainsync_common::{
    H256,
    types::{Deployment, DeploymentRecord},
};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use errors::BackendClientError;

pub mod errors;

/// Acknowledgement for a persisted deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReceipt {
    pub ok: bool,
    #[serde(default)]
    pub id: Option<String>,
}

/// Read/write access to deployment metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Deployments recorded for `owner` on the network labelled `network`.
    async fn deployments_by_owner(
        &self,
        owner: &str,
        network: &str,
    ) -> Result<Vec<Deployment>, BackendClientError>;

    async fn record_deployment(
        &self,
        record: &DeploymentRecord,
    ) -> Result<RecordReceipt, BackendClientError>;
}

#[derive(Deserialize)]
struct DeploymentsResponse {
    #[serde(default)]
    deployments: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendClientError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, BackendClientError> {
        // Url::join drops the last segment unless the base ends with a slash.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|err| BackendClientError::ParseUrlError(format!("{base_url}: {err}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendClientError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendClientError::ParseUrlError(format!("{path}: {err}")))
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendClientError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MetadataStore for BackendClient {
    async fn deployments_by_owner(
        &self,
        owner: &str,
        network: &str,
    ) -> Result<Vec<Deployment>, BackendClientError> {
        let mut url = self.endpoint(&format!("deploy/byUser/{}", owner.to_lowercase()))?;
        url.query_pairs_mut().append_pair("network", network);
        debug!(%url, "Fetching deployments");

        let response = self.client.get(url).send().await?;
        let body: DeploymentsResponse = Self::check_status(response).await?.json().await?;

        Ok(parse_deployments(body.deployments))
    }

    async fn record_deployment(
        &self,
        record: &DeploymentRecord,
    ) -> Result<RecordReceipt, BackendClientError> {
        let url = self.endpoint("deploy/record_erc20")?;
        debug!(%url, contract = %format!("{:#x}", record.contract_address), "Recording deployment");

        let response = self.client.post(url).json(record).send().await?;
        let receipt: RecordReceipt = Self::check_status(response).await?.json().await?;
        if !receipt.ok {
            return Err(BackendClientError::InvalidResponse(
                "backend refused the deployment record".to_string(),
            ));
        }
        Ok(receipt)
    }
}

/// Keeps the well-formed entries. A record the engine cannot address is
/// useless to it, so it is logged and skipped instead of failing the batch.
pub fn parse_deployments(raw: Vec<Value>) -> Vec<Deployment> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<Deployment>(value) {
            Ok(deployment) => Some(deployment),
            Err(err) => {
                warn!(error = %err, "Skipping malformed deployment record");
                None
            }
        })
        .collect()
}

/// Builds the record persisted after a deployment is confirmed on chain.
pub fn deployment_record(
    deployment: &Deployment,
    tx_hash: Option<H256>,
    user_id: Option<String>,
) -> DeploymentRecord {
    DeploymentRecord {
        contract_address: deployment.contract_address,
        tx_hash: tx_hash.or(deployment.deploy_tx_hash),
        chain: deployment.chain.clone(),
        user_id,
        project_id: None,
        build_id: None,
        abi: match &deployment.abi {
            Some(Value::Array(entries)) => entries.clone(),
            _ => Vec::new(),
        },
        contract_type: deployment.contract_type.clone(),
    }
}
