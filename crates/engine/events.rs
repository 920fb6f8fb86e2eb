//! Recent raw events emitted by a contract.

use std::sync::Arc;

use bytes::Bytes;
use chainsync_common::{Address, H256};
use chainsync_rpc::{ChainClient, types::receipt::RpcLog};
use tracing::debug;

use crate::error::ChainSyncError;

pub const DEFAULT_EVENT_LOOKBACK: u64 = 200;

/// A log entry, undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEvent {
    pub address: Address,
    pub tx_hash: Option<H256>,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

impl From<RpcLog> for ContractEvent {
    fn from(log: RpcLog) -> Self {
        Self {
            address: log.address,
            tx_hash: log.transaction_hash,
            block_number: log.block_number,
            log_index: log.log_index,
            topics: log.topics,
            data: log.data,
        }
    }
}

#[derive(Debug)]
pub struct EventFeed<C> {
    client: Arc<C>,
    lookback: u64,
}

impl<C: ChainClient> EventFeed<C> {
    pub fn new(client: Arc<C>, lookback: u64) -> Self {
        Self { client, lookback }
    }

    /// Events of `address` over the last `lookback` blocks, newest first.
    pub async fn load_recent(&self, address: Address) -> Result<Vec<ContractEvent>, ChainSyncError> {
        let head = self.client.latest_block_number().await?;
        let from = head.saturating_sub(self.lookback);
        let logs = self.client.get_logs(from, head, address).await?;
        debug!(contract = %format!("{address:#x}"), from, to = head, events = logs.len(), "Loaded contract events");

        let mut events: Vec<ContractEvent> = logs.into_iter().map(Into::into).collect();
        sort_newest_first(&mut events);
        Ok(events)
    }
}

/// Orders by block, then log index, both descending. Pending logs without
/// a position sort last.
pub fn sort_newest_first(events: &mut [ContractEvent]) {
    events.sort_by(|a, b| {
        (b.block_number, b.log_index).cmp(&(a.block_number, a.log_index))
    });
}
