use chainsync_common::{H256, serde_utils};
use serde::{Deserialize, Serialize};

use crate::types::transaction::RpcTransaction;

/// Block as returned by `eth_getBlockByNumber`. The pending block has no
/// hash and, on some nodes, no number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub number: Option<u64>,
    #[serde(default)]
    pub hash: Option<H256>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub timestamp: u64,
    #[serde(default)]
    pub transactions: BlockTransactions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    Full(Vec<RpcTransaction>),
    Hashes(Vec<H256>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        BlockTransactions::Hashes(Vec::new())
    }
}

impl BlockTransactions {
    pub fn len(&self) -> usize {
        match self {
            BlockTransactions::Full(transactions) => transactions.len(),
            BlockTransactions::Hashes(hashes) => hashes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transaction hashes in block order, whichever form the node returned.
    pub fn hashes(&self) -> Vec<H256> {
        match self {
            BlockTransactions::Full(transactions) => transactions.iter().map(|tx| tx.hash).collect(),
            BlockTransactions::Hashes(hashes) => hashes.clone(),
        }
    }

    pub fn into_full(self) -> Vec<RpcTransaction> {
        match self {
            BlockTransactions::Full(transactions) => transactions,
            BlockTransactions::Hashes(_) => Vec::new(),
        }
    }
}
