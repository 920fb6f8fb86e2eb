use bytes::Bytes;
use chainsync_common::{Address, H256, U256, serde_utils};
use serde::{Deserialize, Serialize};

/// A transaction object as returned by `eth_getTransactionByHash` or inside a
/// hydrated block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub nonce: u64,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<H256>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default, with = "serde_utils::u256::hex_str_opt")]
    pub gas_price: Option<U256>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub gas: Option<u64>,
    #[serde(default, with = "serde_utils::bytes")]
    pub input: Bytes,
}
