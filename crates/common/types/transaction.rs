use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// The receipt carries a contract-creation address.
    Deploy,
    /// Any other mined transaction.
    Write,
    /// Synthetic marker for a block that held no transactions.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
    Pending,
}

/// One entry of the reconciled transaction history.
///
/// Every block in a scanned window yields at least one record; blocks
/// without transactions yield a single [`TxKind::Empty`] record built with
/// [`TransactionRecord::empty_block`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: H256,
    pub kind: TxKind,
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub value: U256,
    pub gas_used: u64,
    pub gas_price: U256,
    pub nonce: u64,
    pub status: TxStatus,
}

impl TransactionRecord {
    /// Placeholder for a block with zero transactions. The hash is zero and
    /// the status is `Success`: the block itself was mined.
    pub fn empty_block(block_number: u64, timestamp: Option<u64>) -> Self {
        Self {
            hash: H256::zero(),
            kind: TxKind::Empty,
            block_number,
            timestamp,
            from: Address::zero(),
            to: None,
            value: U256::zero(),
            gas_used: 0,
            gas_price: U256::zero(),
            nonce: 0,
            status: TxStatus::Success,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == TxKind::Empty
    }
}
