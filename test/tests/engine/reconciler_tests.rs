use std::sync::Arc;

use bytes::Bytes;
use chainsync_common::types::{TxKind, TxStatus};
use chainsync_engine::{DeploymentReconciler, ErrorKind, ScanOmission};
use chainsync_test::{
    FakeChain, Method,
    fixtures::{contract, deployment, receipt, runtime_code, transaction, tx_hash},
};

fn chain_with_history() -> Arc<FakeChain> {
    let chain = Arc::new(FakeChain::new());
    chain.push_empty_blocks(4);
    chain.push_block(vec![(
        transaction(tx_hash(1), 0, None),
        Some(receipt(tx_hash(1), Some(contract(1)), true)),
    )]);
    chain.push_block(vec![
        (
            transaction(tx_hash(2), 1, Some(contract(1))),
            Some(receipt(tx_hash(2), None, true)),
        ),
        (
            transaction(tx_hash(3), 2, Some(contract(1))),
            Some(receipt(tx_hash(3), None, false)),
        ),
    ]);
    chain
}

#[tokio::test]
async fn stale_deployment_is_dropped_and_scan_still_runs() {
    let chain = chain_with_history();
    chain.set_code(contract(2), runtime_code());
    let a = deployment(contract(1), "erc20");
    let b = deployment(contract(2), "erc721");

    let reconciler = DeploymentReconciler::new(chain.clone());
    let report = reconciler.reconcile(vec![a.clone(), b.clone()]).await.unwrap();

    assert_eq!(report.valid, vec![b]);
    assert_eq!(report.stale, vec![a]);
    assert!(report.unverified.is_empty());
    assert!(!report.history.is_empty());
    assert!(chain.calls(Method::GetBlock) > 0);

    let signals = report.stale_signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].kind(), ErrorKind::StaleDeployment);
}

#[tokio::test]
async fn zero_length_code_is_never_valid() {
    let chain = Arc::new(FakeChain::new());
    chain.set_code(contract(1), Bytes::new());
    let reconciler = DeploymentReconciler::new(chain.clone());

    let report = reconciler
        .reconcile(vec![deployment(contract(1), "erc20")])
        .await
        .unwrap();

    assert!(report.valid.is_empty());
    assert_eq!(report.stale.len(), 1);
}

#[tokio::test]
async fn scan_runs_without_candidates() {
    let chain = chain_with_history();
    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    assert!(report.valid.is_empty());
    assert_eq!(report.head, 6);
    assert_eq!(report.history.len(), 7);
}

#[tokio::test]
async fn every_block_in_window_produces_a_record() {
    let chain = Arc::new(FakeChain::new());
    chain.push_empty_blocks(15);
    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    let blocks: Vec<u64> = report.history.iter().map(|tx| tx.block_number).collect();
    assert_eq!(blocks, (6..=15).rev().collect::<Vec<_>>());
    assert!(report.history.iter().all(|tx| tx.kind == TxKind::Empty));
    assert!(report.history.iter().all(|tx| tx.timestamp.is_some()));
    assert!(report.omissions.is_empty());
}

#[tokio::test]
async fn short_chain_scans_from_block_one() {
    let chain = Arc::new(FakeChain::new());
    chain.push_empty_blocks(4);
    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    let blocks: Vec<u64> = report.history.iter().map(|tx| tx.block_number).collect();
    assert_eq!(blocks, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn genesis_only_chain_has_empty_history() {
    let chain = Arc::new(FakeChain::new());
    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    assert!(report.history.is_empty());
    assert_eq!(chain.calls(Method::GetBlock), 0);
}

#[tokio::test]
async fn history_is_newest_first_and_stable_within_a_block() {
    let chain = chain_with_history();
    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    let history = report.history;
    assert_eq!(history[0].hash, tx_hash(2));
    assert_eq!(history[0].kind, TxKind::Write);
    assert_eq!(history[0].status, TxStatus::Success);
    assert_eq!(history[1].hash, tx_hash(3));
    assert_eq!(history[1].status, TxStatus::Failed);
    assert_eq!(history[2].hash, tx_hash(1));
    assert_eq!(history[2].kind, TxKind::Deploy);
    assert!(
        history
            .windows(2)
            .all(|pair| pair[0].block_number >= pair[1].block_number)
    );
}

#[tokio::test]
async fn per_item_failures_are_isolated() {
    crate::init_tracing();
    let chain = chain_with_history();
    chain.set_code(contract(2), runtime_code());
    chain.fail_code_for(contract(3));
    chain.fail_block(2);
    chain.fail_transaction(tx_hash(2));

    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(vec![
            deployment(contract(2), "erc20"),
            deployment(contract(3), "erc20"),
        ])
        .await
        .unwrap();

    assert_eq!(report.valid.len(), 1);
    assert_eq!(report.unverified.len(), 1);
    assert_eq!(report.unverified[0].contract_address, contract(3));

    assert!(report.history.iter().all(|tx| tx.block_number != 2));
    assert!(report.history.iter().any(|tx| tx.hash == tx_hash(3)));
    assert!(report.history.iter().all(|tx| tx.hash != tx_hash(2)));

    assert!(
        report
            .omissions
            .iter()
            .any(|omission| matches!(omission, ScanOmission::Block { number: 2, .. }))
    );
    assert!(report.omissions.iter().any(|omission| matches!(
        omission,
        ScanOmission::Transaction { hash, block: 6, .. } if *hash == tx_hash(2)
    )));
}

#[tokio::test]
async fn missing_receipt_skips_only_that_transaction() {
    let chain = Arc::new(FakeChain::new());
    chain.push_block(vec![
        (transaction(tx_hash(7), 0, None), None),
        (
            transaction(tx_hash(8), 1, None),
            Some(receipt(tx_hash(8), None, true)),
        ),
    ]);

    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    assert_eq!(report.history.len(), 1);
    assert_eq!(report.history[0].hash, tx_hash(8));
    assert_eq!(report.omissions.len(), 1);
}

#[tokio::test]
async fn unknown_block_is_reported_not_skipped_silently() {
    let chain = Arc::new(FakeChain::new());
    chain.push_empty_blocks(3);
    chain.remove_block(2);

    let report = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap();

    assert_eq!(report.history.len(), 2);
    assert_eq!(
        report.omissions,
        vec![ScanOmission::Block {
            number: 2,
            reason: "block not found".to_string()
        }]
    );
}

#[tokio::test]
async fn unreachable_head_fails_the_pass() {
    let chain = Arc::new(FakeChain::new());
    chain.fail(Method::BlockNumber);

    let err = DeploymentReconciler::new(chain.clone())
        .reconcile(Vec::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RpcError);
}

#[tokio::test]
async fn custom_scan_window() {
    let chain = Arc::new(FakeChain::new());
    chain.push_empty_blocks(30);
    let reconciler = DeploymentReconciler::with_window(chain.clone(), 3);
    let (history, omissions) = reconciler.scan(30).await;

    let blocks: Vec<u64> = history.iter().map(|tx| tx.block_number).collect();
    assert_eq!(blocks, vec![30, 29, 28]);
    assert!(omissions.is_empty());
}
