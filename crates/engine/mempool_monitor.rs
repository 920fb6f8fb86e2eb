//! Pending-pool monitor.
//!
//! Polls the node's pending block on a fixed cadence and publishes an
//! immutable snapshot. Failed polls keep the last good snapshot in place.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chainsync_common::H256;
use chainsync_rpc::{ChainClient, types::transaction::RpcTransaction};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{error::ChainSyncError, utils::InFlightGuard};

/// Contents of the pending pool at one successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MempoolSnapshot {
    /// Every pending transaction hash, in the node's order.
    pub hashes: Vec<H256>,
    /// Full transaction objects, when the node returned them.
    pub transactions: Vec<RpcTransaction>,
}

impl MempoolSnapshot {
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A new snapshot with this many transactions was published.
    Updated(usize),
    /// Another poll was still in flight.
    Skipped,
}

#[derive(Debug)]
pub struct MempoolMonitor<C> {
    client: Arc<C>,
    snapshot: watch::Sender<Arc<MempoolSnapshot>>,
    polling: AtomicBool,
}

impl<C: ChainClient> MempoolMonitor<C> {
    pub fn new(client: Arc<C>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(MempoolSnapshot::default()));
        Self {
            client,
            snapshot,
            polling: AtomicBool::new(false),
        }
    }

    /// Last successfully fetched pool contents.
    pub fn snapshot(&self) -> Arc<MempoolSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<MempoolSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Fetches the pending block once. At most one poll runs at a time; a
    /// call made while another is in flight returns [`PollOutcome::Skipped`].
    pub async fn poll_once(&self) -> Result<PollOutcome, ChainSyncError> {
        let Some(_guard) = InFlightGuard::try_acquire(&self.polling) else {
            debug!("Mempool poll still in flight, skipping");
            return Ok(PollOutcome::Skipped);
        };

        let snapshot = match self.client.get_pending_block().await? {
            Some(block) => MempoolSnapshot {
                hashes: block.transactions.hashes(),
                transactions: block.transactions.into_full(),
            },
            None => MempoolSnapshot::default(),
        };
        let count = snapshot.len();
        self.snapshot.send_replace(Arc::new(snapshot));
        debug!(pending = count, "Mempool snapshot updated");

        Ok(PollOutcome::Updated(count))
    }

    /// Polls every `poll_interval` until `cancel_token` fires. Ticks missed
    /// while a poll was running are dropped, not replayed: the next poll
    /// starts a full interval after the slow one finished.
    pub fn spawn(
        self: Arc<Self>,
        poll_interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let started = Instant::now();
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    result = self.poll_once() => match result {
                        Ok(_) => {}
                        Err(err @ ChainSyncError::Rpc(_)) => {
                            warn!(error = %err, "Mempool poll failed, keeping last snapshot");
                        }
                        Err(err) => error!(error = %err, "Mempool poll failed"),
                    },
                }
                if started.elapsed() >= poll_interval {
                    debug!("Mempool poll outlasted the interval, skipping missed ticks");
                    ticker.reset();
                }
            }
            debug!("Mempool monitor stopped");
        })
    }
}
