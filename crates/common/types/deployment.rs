use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

/// A contract deployment as recorded by the metadata backend.
///
/// The engine never creates these; it only checks them against the chain
/// and drops the ones whose bytecode is gone (e.g. after a devnet reset).
/// Identity is `contract_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub contract_address: Address,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default, alias = "tx_hash")]
    pub deploy_tx_hash: Option<H256>,
    #[serde(default)]
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
    #[serde(
        default,
        alias = "blockNumber",
        deserialize_with = "crate::serde_utils::u64::deser_number_or_str"
    )]
    pub block_number: u64,
}

impl Deployment {
    pub fn new(contract_address: Address, contract_type: impl Into<String>) -> Self {
        Self {
            contract_address,
            contract_type: contract_type.into(),
            deploy_tx_hash: None,
            chain: String::new(),
            abi: None,
            block_number: 0,
        }
    }
}

/// Body sent to the backend when a freshly confirmed deployment is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub contract_address: Address,
    pub tx_hash: Option<H256>,
    pub chain: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub build_id: Option<String>,
    #[serde(default)]
    pub abi: Vec<serde_json::Value>,
    pub contract_type: String,
}
