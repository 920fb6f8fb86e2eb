use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chainsync_common::{Address, H256};

use crate::{
    clients::{
        eth::{EthClient, errors::EthClientError},
        subscription::{NewBlockSubscription, spawn_block_poller},
    },
    types::{
        block::RpcBlock,
        block_identifier::{BlockIdentifier, BlockTag},
        receipt::{RpcLog, RpcReceipt},
        transaction::RpcTransaction,
    },
};

/// The node operations the reconciliation engine depends on.
///
/// Any failure means "state unknown, retry later"; callers never read an
/// error as an empty or zero answer.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn latest_block_number(&self) -> Result<u64, EthClientError>;

    async fn chain_id(&self) -> Result<u64, EthClientError>;

    /// `with_txs` selects full transaction objects over hashes.
    async fn get_block(
        &self,
        number: u64,
        with_txs: bool,
    ) -> Result<Option<RpcBlock>, EthClientError>;

    async fn get_transaction(&self, hash: H256) -> Result<Option<RpcTransaction>, EthClientError>;

    async fn get_receipt(&self, hash: H256) -> Result<Option<RpcReceipt>, EthClientError>;

    /// Code at the latest block. Empty when no contract lives there.
    async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError>;

    async fn get_pending_block(&self) -> Result<Option<RpcBlock>, EthClientError>;

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
    ) -> Result<Vec<RpcLog>, EthClientError>;

    async fn set_automine(&self, enabled: bool) -> Result<(), EthClientError>;

    async fn mine_one_block(&self) -> Result<(), EthClientError>;

    fn subscribe_new_blocks(
        &self,
        poll_interval: Duration,
    ) -> Result<NewBlockSubscription, EthClientError>;
}

#[async_trait]
impl ChainClient for EthClient {
    async fn latest_block_number(&self) -> Result<u64, EthClientError> {
        self.get_block_number().await
    }

    async fn chain_id(&self) -> Result<u64, EthClientError> {
        self.get_chain_id().await
    }

    async fn get_block(
        &self,
        number: u64,
        with_txs: bool,
    ) -> Result<Option<RpcBlock>, EthClientError> {
        self.get_block_by_number(BlockIdentifier::Number(number), with_txs)
            .await
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<RpcTransaction>, EthClientError> {
        self.get_transaction_by_hash(hash).await
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<RpcReceipt>, EthClientError> {
        self.get_transaction_receipt(hash).await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError> {
        EthClient::get_code(self, address, BlockIdentifier::Tag(BlockTag::Latest)).await
    }

    async fn get_pending_block(&self) -> Result<Option<RpcBlock>, EthClientError> {
        EthClient::get_pending_block(self).await
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        address: Address,
    ) -> Result<Vec<RpcLog>, EthClientError> {
        EthClient::get_logs(self, from_block, to_block, address).await
    }

    async fn set_automine(&self, enabled: bool) -> Result<(), EthClientError> {
        self.evm_set_automine(enabled).await
    }

    async fn mine_one_block(&self) -> Result<(), EthClientError> {
        self.evm_mine().await
    }

    fn subscribe_new_blocks(
        &self,
        poll_interval: Duration,
    ) -> Result<NewBlockSubscription, EthClientError> {
        spawn_block_poller(self.clone(), poll_interval)
    }
}
