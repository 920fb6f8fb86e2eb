use serde::{Deserialize, Serialize};

use super::{TransactionRecord, TxKind};

/// A block position in the rendered timeline. Slots are derived from a
/// transaction list and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSlot {
    pub number: u64,
    pub transactions: Vec<TransactionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    pub is_latest: bool,
}

impl BlockSlot {
    pub fn has_activity(&self) -> bool {
        !self.transactions.is_empty()
    }

    pub fn has_deploy(&self) -> bool {
        self.transactions.iter().any(|tx| tx.kind == TxKind::Deploy)
    }

    pub fn has_write(&self) -> bool {
        self.transactions.iter().any(|tx| tx.kind == TxKind::Write)
    }
}
