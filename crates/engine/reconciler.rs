//! Deployment reconciliation.
//!
//! Cross-checks recorded deployments against live bytecode, then scans a
//! trailing window of blocks into a flat transaction history. Per-item
//! failures degrade the result (they are listed as omissions) but never
//! abort the pass; the caller re-runs reconciliation on its own cadence.

use std::sync::Arc;

use chainsync_common::{
    H256,
    types::{Deployment, TransactionRecord, TxKind, TxStatus},
};
use chainsync_rpc::{
    ChainClient,
    eth_errors::EthClientError,
    types::{block::RpcBlock, receipt::RpcReceipt, transaction::RpcTransaction},
};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ChainSyncError;

/// Blocks scanned by default, ending at the chain head.
pub const DEFAULT_SCAN_WINDOW: u64 = 10;

/// Something the scan could not fetch. The corresponding entries are simply
/// missing from the history of this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOmission {
    Block { number: u64, reason: String },
    Transaction { hash: H256, block: u64, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Deployments with live bytecode at check time.
    pub valid: Vec<Deployment>,
    /// Deployments whose address holds no code anymore.
    pub stale: Vec<Deployment>,
    /// Deployments whose code lookup failed. Neither kept nor pruned.
    pub unverified: Vec<Deployment>,
    /// Scanned transactions, newest block first.
    pub history: Vec<TransactionRecord>,
    pub omissions: Vec<ScanOmission>,
    /// Chain head the scan ended at.
    pub head: u64,
}

impl Reconciliation {
    /// Pruned deployments as [`ChainSyncError::StaleDeployment`] signals.
    pub fn stale_signals(&self) -> Vec<ChainSyncError> {
        self.stale
            .iter()
            .map(|deployment| ChainSyncError::StaleDeployment(deployment.contract_address))
            .collect()
    }
}

#[derive(Debug)]
enum CodeCheck {
    Live,
    Stale,
    Unknown(EthClientError),
}

#[derive(Debug)]
pub struct DeploymentReconciler<C> {
    client: Arc<C>,
    scan_window: u64,
    pass_lock: Mutex<()>,
}

/// First block of a `window`-sized scan ending at `head`. Genesis is never
/// scanned; `None` when there is nothing to scan.
pub fn scan_start(head: u64, window: u64) -> Option<u64> {
    if head == 0 || window == 0 {
        return None;
    }
    Some(head.saturating_sub(window - 1).max(1))
}

impl<C: ChainClient> DeploymentReconciler<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self::with_window(client, DEFAULT_SCAN_WINDOW)
    }

    pub fn with_window(client: Arc<C>, scan_window: u64) -> Self {
        Self {
            client,
            scan_window,
            pass_lock: Mutex::new(()),
        }
    }

    pub fn scan_window(&self) -> u64 {
        self.scan_window
    }

    /// Runs one reconciliation pass. Overlapping calls are serialized.
    ///
    /// Fails only when the chain head cannot be read; every other failure
    /// is recorded in the returned report.
    pub async fn reconcile(
        &self,
        candidates: Vec<Deployment>,
    ) -> Result<Reconciliation, ChainSyncError> {
        let _pass = self.pass_lock.lock().await;
        let mut report = Reconciliation::default();

        let checks = join_all(
            candidates
                .iter()
                .map(|deployment| self.check_code(deployment)),
        )
        .await;
        for (deployment, check) in candidates.into_iter().zip(checks) {
            match check {
                CodeCheck::Live => report.valid.push(deployment),
                CodeCheck::Stale => {
                    info!(
                        contract = %format!("{:#x}", deployment.contract_address),
                        "Pruning deployment without bytecode"
                    );
                    report.stale.push(deployment);
                }
                CodeCheck::Unknown(err) => {
                    warn!(
                        contract = %format!("{:#x}", deployment.contract_address),
                        error = %err,
                        "Could not verify deployment bytecode"
                    );
                    report.unverified.push(deployment);
                }
            }
        }

        let head = self.client.latest_block_number().await?;
        report.head = head;
        let (history, omissions) = self.scan(head).await;
        report.history = history;
        report.omissions = omissions;

        debug!(
            valid = report.valid.len(),
            stale = report.stale.len(),
            transactions = report.history.len(),
            omissions = report.omissions.len(),
            head,
            "Reconciliation finished"
        );
        Ok(report)
    }

    async fn check_code(&self, deployment: &Deployment) -> CodeCheck {
        match self.client.get_code(deployment.contract_address).await {
            Ok(code) if code.is_empty() => CodeCheck::Stale,
            Ok(_) => CodeCheck::Live,
            Err(err) => CodeCheck::Unknown(err),
        }
    }

    /// Scans `[scan_start(head), head]` in ascending order and returns the
    /// history sorted newest block first. Records of the same block keep
    /// their in-block order.
    pub async fn scan(&self, head: u64) -> (Vec<TransactionRecord>, Vec<ScanOmission>) {
        let mut history = Vec::new();
        let mut omissions = Vec::new();
        let Some(start) = scan_start(head, self.scan_window) else {
            return (history, omissions);
        };

        for number in start..=head {
            match self.client.get_block(number, false).await {
                Ok(Some(block)) => {
                    self.scan_block(number, block, &mut history, &mut omissions)
                        .await
                }
                Ok(None) => {
                    warn!(block = number, "Node does not know block in scan window");
                    omissions.push(ScanOmission::Block {
                        number,
                        reason: "block not found".to_string(),
                    });
                }
                Err(err) => {
                    warn!(block = number, error = %err, "Failed to fetch block");
                    omissions.push(ScanOmission::Block {
                        number,
                        reason: err.to_string(),
                    });
                }
            }
        }

        history.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        (history, omissions)
    }

    async fn scan_block(
        &self,
        number: u64,
        block: RpcBlock,
        history: &mut Vec<TransactionRecord>,
        omissions: &mut Vec<ScanOmission>,
    ) {
        let hashes = block.transactions.hashes();
        if hashes.is_empty() {
            history.push(TransactionRecord::empty_block(number, Some(block.timestamp)));
            return;
        }

        for hash in hashes {
            let (transaction, receipt) = tokio::join!(
                self.client.get_transaction(hash),
                self.client.get_receipt(hash)
            );
            match (transaction, receipt) {
                (Ok(Some(transaction)), Ok(Some(receipt))) => {
                    history.push(transaction_record(
                        number,
                        block.timestamp,
                        transaction,
                        &receipt,
                    ));
                }
                (Err(err), _) | (_, Err(err)) => {
                    warn!(block = number, tx = %format!("{hash:#x}"), error = %err, "Failed to fetch transaction");
                    omissions.push(ScanOmission::Transaction {
                        hash,
                        block: number,
                        reason: err.to_string(),
                    });
                }
                _ => {
                    warn!(block = number, tx = %format!("{hash:#x}"), "Transaction or receipt missing");
                    omissions.push(ScanOmission::Transaction {
                        hash,
                        block: number,
                        reason: "transaction or receipt not found".to_string(),
                    });
                }
            }
        }
    }
}

/// Merges a transaction and its receipt into a history record. A receipt
/// carrying a contract address marks a deployment.
pub fn transaction_record(
    block_number: u64,
    timestamp: u64,
    transaction: RpcTransaction,
    receipt: &RpcReceipt,
) -> TransactionRecord {
    let kind = if receipt.contract_address.is_some() {
        TxKind::Deploy
    } else {
        TxKind::Write
    };
    let status = if receipt.succeeded() {
        TxStatus::Success
    } else {
        TxStatus::Failed
    };

    TransactionRecord {
        hash: transaction.hash,
        kind,
        block_number,
        timestamp: Some(timestamp),
        from: transaction.from,
        to: transaction.to,
        value: transaction.value,
        gas_used: receipt.gas_used,
        gas_price: receipt
            .effective_gas_price
            .or(transaction.gas_price)
            .unwrap_or_default(),
        nonce: transaction.nonce,
        status,
    }
}
