use bytes::Bytes;
use chainsync_common::{Address, H256, U256, serde_utils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub block_number: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    /// Set only for contract-creation transactions.
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `0x1` on success, `0x0` on revert. Missing on pre-Byzantium receipts.
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub status: Option<u64>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub gas_used: u64,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub effective_gas_price: Option<U256>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
}

impl RpcReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_some_and(|status| status == 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<H256>,
    #[serde(default, with = "serde_utils::bytes")]
    pub data: Bytes,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub log_index: Option<u64>,
}
