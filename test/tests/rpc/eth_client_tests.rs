use std::sync::Arc;
use std::time::Duration;

use chainsync_common::{Address, H160, H256};
use chainsync_engine::{
    BlockClock, ChainSyncError, ClockSettings, DeploymentReconciler, ErrorKind, MineOutcome,
    MiningController,
};
use chainsync_rpc::{ChainClient, EthClient, NewBlockSubscription, eth_errors::EthClientError};
use chainsync_test::fake_node::{FakeNode, METHOD_NOT_FOUND};
use hex_literal::hex;
use serde_json::json;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const CONTRACT_A: Address = H160(hex!("5fbdb2315678afecb367f032d93f642f64180aa3"));
const CONTRACT_B: Address = H160(hex!("e7f1725e7734ce288f8367e1bb143e90bb3f0512"));

fn client(node: &FakeNode) -> EthClient {
    EthClient::new(&node.url).unwrap()
}

#[tokio::test]
async fn reads_quantities() {
    let node = FakeNode::spawn().await;
    node.set_block_number(0x1a);
    let client = client(&node);

    assert_eq!(client.latest_block_number().await.unwrap(), 26);
    assert_eq!(client.chain_id().await.unwrap(), 31337);
}

#[tokio::test]
async fn fetches_blocks_by_number_and_pending() {
    let node = FakeNode::spawn().await;
    node.respond(
        "eth_getBlockByNumber:0x2",
        json!({
            "number": "0x2",
            "hash": "0x2222222222222222222222222222222222222222222222222222222222222222",
            "timestamp": "0x64",
            "transactions": []
        }),
    );
    node.respond(
        "eth_getBlockByNumber:pending",
        json!({
            "number": "0x3",
            "timestamp": "0x65",
            "transactions": [{
                "hash": "0x4444444444444444444444444444444444444444444444444444444444444444",
                "nonce": "0x0",
                "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "to": null,
                "value": "0x0",
                "gasPrice": "0x3b9aca00",
                "gas": "0x5208",
                "input": "0x"
            }]
        }),
    );
    node.respond("eth_getBlockByNumber", serde_json::Value::Null);
    let client = client(&node);

    let block = client.get_block(2, false).await.unwrap().unwrap();
    assert_eq!(block.number, Some(2));
    assert_eq!(block.timestamp, 100);
    assert!(block.transactions.is_empty());
    assert_eq!(node.params_of_last("eth_getBlockByNumber"), Some(json!(["0x2", false])));

    assert_eq!(client.get_block(9, false).await.unwrap(), None);

    let pending = ChainClient::get_pending_block(&client).await.unwrap().unwrap();
    assert_eq!(pending.transactions.len(), 1);
    assert_eq!(
        pending.transactions.hashes(),
        vec![H256::repeat_byte(0x44)]
    );
    assert_eq!(
        node.params_of_last("eth_getBlockByNumber"),
        Some(json!(["pending", true]))
    );
}

#[tokio::test]
async fn zero_code_sentinel_prunes_deployment() {
    let node = FakeNode::spawn().await;
    node.set_block_number(0);
    node.respond(&format!("eth_getCode:{CONTRACT_A:#x}"), json!("0x0"));
    node.respond(&format!("eth_getCode:{CONTRACT_B:#x}"), json!("0x6080604052"));
    let client = Arc::new(client(&node));

    assert!(ChainClient::get_code(client.as_ref(), CONTRACT_A).await.unwrap().is_empty());

    let mut a = chainsync_common::types::Deployment::new(CONTRACT_A, "erc20");
    a.chain = "anvil".to_string();
    let b = chainsync_common::types::Deployment::new(CONTRACT_B, "erc20");
    let report = DeploymentReconciler::new(client.clone())
        .reconcile(vec![a, b.clone()])
        .await
        .unwrap();

    assert_eq!(report.valid, vec![b]);
    assert_eq!(report.stale.len(), 1);
    assert!(report.history.is_empty());
}

#[tokio::test]
async fn manual_mine_against_development_node() {
    let node = FakeNode::spawn().await;
    node.set_block_number(7);
    let controller = MiningController::new(Arc::new(client(&node)));

    assert!(!controller.toggle_mining_mode().await.unwrap());
    assert!(!node.automine());
    assert_eq!(controller.manual_mine().await.unwrap(), MineOutcome::Mined(8));
    assert_eq!(node.calls("evm_mine"), 1);
}

#[tokio::test]
async fn production_node_rejection_is_an_rpc_error() {
    let node = FakeNode::spawn_production().await;
    let client = client(&node);

    let err = client.mine_one_block().await.unwrap_err();
    assert!(err.is_rejection());

    let controller = MiningController::new(Arc::new(client));
    let err = controller.toggle_mining_mode().await.unwrap_err();
    assert!(matches!(err, ChainSyncError::Rpc(_)));
    assert_eq!(err.kind(), ErrorKind::RpcError);
    assert!(controller.state().is_automine);
}

#[tokio::test]
async fn rpc_error_object_keeps_method_and_message() {
    let node = FakeNode::spawn().await;
    node.reject("eth_getTransactionReceipt", -32000, "header not found");
    let client = client(&node);

    let err = client
        .get_receipt(H256::repeat_byte(1))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("eth_getTransactionReceipt"));
    assert!(message.contains("header not found"));
    assert_eq!(node.calls("eth_getTransactionReceipt"), 1);
}

#[tokio::test]
async fn slow_node_times_out() {
    let node = FakeNode::spawn().await;
    node.set_delay(Duration::from_millis(500));
    let client = EthClient::new_with_config(vec![node.url.as_str()], Duration::from_millis(50)).unwrap();

    let err = client.latest_block_number().await.unwrap_err();
    assert!(matches!(err, EthClientError::TimeoutError));
    assert_eq!(ChainSyncError::from(err).kind(), ErrorKind::RpcError);
}

#[tokio::test]
async fn falls_back_to_the_next_url() {
    let down = FakeNode::spawn().await;
    down.reject("eth_blockNumber", METHOD_NOT_FOUND, "unavailable");
    let up = FakeNode::spawn().await;
    up.set_block_number(42);

    let client = EthClient::new_with_multiple_urls(vec![down.url.clone(), up.url.clone()]).unwrap();

    assert_eq!(client.latest_block_number().await.unwrap(), 42);
    assert_eq!(down.calls("eth_blockNumber"), 1);
}

#[tokio::test]
async fn empty_url_list_is_rejected() {
    assert!(matches!(
        EthClient::new_with_config(Vec::new(), Duration::from_secs(1)),
        Err(EthClientError::ParseUrlError(_))
    ));
}

#[tokio::test]
async fn reads_transactions_receipts_and_logs() {
    let node = FakeNode::spawn().await;
    let hash = "0x1111111111111111111111111111111111111111111111111111111111111111";
    node.respond(
        &format!("eth_getTransactionByHash:{hash}"),
        json!({
            "hash": hash,
            "nonce": "0x2",
            "blockNumber": "0x5",
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": null,
            "value": "0x0",
            "gasPrice": "0x3b9aca00",
            "input": "0x6080"
        }),
    );
    node.respond(
        &format!("eth_getTransactionReceipt:{hash}"),
        json!({
            "transactionHash": hash,
            "blockNumber": "0x5",
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": null,
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1",
            "gasUsed": "0x2dc6c0",
            "effectiveGasPrice": "0x3b9aca00",
            "logs": []
        }),
    );
    node.respond(
        "eth_getLogs",
        json!([{
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": [],
            "data": "0x",
            "blockNumber": "0x5",
            "transactionHash": hash,
            "logIndex": "0x0"
        }]),
    );
    let client = client(&node);
    let hash = H256::repeat_byte(0x11);

    let transaction = client.get_transaction(hash).await.unwrap().unwrap();
    assert_eq!(transaction.nonce, 2);
    assert_eq!(transaction.to, None);

    let receipt = client.get_receipt(hash).await.unwrap().unwrap();
    assert!(receipt.succeeded());
    assert_eq!(receipt.contract_address, Some(CONTRACT_A));
    assert_eq!(receipt.gas_used, 3_000_000);

    let logs = ChainClient::get_logs(&client, 1, 5, CONTRACT_A).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(
        node.params_of_last("eth_getLogs"),
        Some(json!([{
            "fromBlock": "0x1",
            "toBlock": "0x5",
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        }]))
    );
}

const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(20);

async fn next_height(subscription: &mut NewBlockSubscription) -> u64 {
    timeout(WAIT, subscription.next())
        .await
        .expect("no block event in time")
        .expect("subscription ended")
        .unwrap()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn subscription_reports_head_then_every_new_height() {
    let node = FakeNode::spawn().await;
    node.set_block_number(5);
    let client = client(&node);
    let mut subscription = client.subscribe_new_blocks(POLL).unwrap();

    assert_eq!(next_height(&mut subscription).await, 5);

    node.set_block_number(8);
    assert_eq!(next_height(&mut subscription).await, 6);
    assert_eq!(next_height(&mut subscription).await, 7);
    assert_eq!(next_height(&mut subscription).await, 8);

    // An unchanged head is not reported again.
    assert!(timeout(POLL * 5, subscription.next()).await.is_err());
}

#[tokio::test]
async fn subscription_ends_with_error_when_node_rejects_polls() {
    let node = FakeNode::spawn().await;
    node.set_block_number(3);
    let client = client(&node);
    let mut subscription = client.subscribe_new_blocks(POLL).unwrap();
    assert_eq!(next_height(&mut subscription).await, 3);

    node.reject("eth_blockNumber", -32000, "node is syncing");

    let event = timeout(WAIT, subscription.next()).await.unwrap();
    assert!(matches!(event, Some(Err(EthClientError::RpcRequestError(_)))));
    assert!(timeout(WAIT, subscription.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn subscription_ends_with_error_on_transport_timeout() {
    let node = FakeNode::spawn().await;
    node.set_delay(Duration::from_millis(300));
    let client = EthClient::new_with_config(vec![node.url.as_str()], Duration::from_millis(50)).unwrap();
    let mut subscription = client.subscribe_new_blocks(POLL).unwrap();

    let event = timeout(WAIT, subscription.next()).await.unwrap();
    assert!(matches!(event, Some(Err(EthClientError::TimeoutError))));
    assert!(timeout(WAIT, subscription.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn dropping_subscription_stops_polling() {
    let node = FakeNode::spawn().await;
    node.set_block_number(1);
    let client = client(&node);
    let mut subscription = client.subscribe_new_blocks(POLL).unwrap();
    assert_eq!(next_height(&mut subscription).await, 1);

    drop(subscription);
    sleep(POLL * 3).await;
    let polls = node.calls("eth_blockNumber");

    sleep(POLL * 10).await;
    assert_eq!(node.calls("eth_blockNumber"), polls);
}

#[tokio::test]
async fn clock_keeps_counting_across_a_resubscribe_at_the_same_head() {
    let node = FakeNode::spawn().await;
    node.set_block_number(5);
    let settings = ClockSettings {
        tick_interval: Duration::from_millis(100),
        block_poll_interval: POLL,
        subscribe_retry: Duration::from_millis(100),
    };
    let clock = BlockClock::spawn(Arc::new(client(&node)), settings, CancellationToken::new());

    eventually(|| {
        let state = clock.state();
        state.latest_block == Some(5) && state.seconds_since_last_block >= 3
    })
    .await;

    let polled = node.calls("eth_blockNumber");
    node.reject("eth_blockNumber", -32000, "connection reset");
    eventually(|| node.calls("eth_blockNumber") > polled).await;
    let before = clock.state().seconds_since_last_block;

    node.accept("eth_blockNumber");
    let resumed = node.calls("eth_blockNumber");
    // The fresh subscription reports head 5 on its first poll.
    eventually(|| node.calls("eth_blockNumber") > resumed + 3).await;

    let after = clock.state();
    assert_eq!(after.latest_block, Some(5));
    assert!(
        after.seconds_since_last_block >= before,
        "head stayed at 5 but the counter went from {before} to {}",
        after.seconds_since_last_block
    );

    clock.stop().await;
}
