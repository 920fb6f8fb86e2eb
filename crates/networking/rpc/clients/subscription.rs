//! New-block notifications.
//!
//! HTTP nodes have no push channel, so [`EthClient`] implements the
//! subscription by polling `eth_blockNumber` and emitting every height it has
//! not reported yet. The subscription owns its poller: dropping it (or
//! calling [`NewBlockSubscription::unsubscribe`]) stops the task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clients::eth::{EthClient, errors::EthClientError};

/// Upper bound on heights emitted for a single poll. A node that jumped
/// further (or a subscriber that fell asleep) only gets the newest ones.
pub const MAX_BLOCKS_PER_POLL: u64 = 32;

const SUBSCRIPTION_BUFFER: usize = 64;

pub type NewBlockEvent = Result<u64, EthClientError>;

/// Producer side of a [`NewBlockSubscription`].
pub type NewBlockSender = mpsc::Sender<NewBlockEvent>;

/// Stream of new block heights. An `Err` item means the subscription was
/// lost; the stream ends right after it.
#[derive(Debug)]
pub struct NewBlockSubscription {
    receiver: mpsc::Receiver<NewBlockEvent>,
    cancel_token: CancellationToken,
}

impl NewBlockSubscription {
    /// Creates a subscription fed by the returned sender. The token is
    /// cancelled when the subscription is dropped so the producer can stop.
    pub fn channel() -> (NewBlockSender, CancellationToken, Self) {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel_token = CancellationToken::new();
        let subscription = Self {
            receiver,
            cancel_token: cancel_token.clone(),
        };
        (sender, cancel_token, subscription)
    }

    /// Next event, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<NewBlockEvent> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for NewBlockSubscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub(crate) fn spawn_block_poller(
    client: EthClient,
    poll_interval: Duration,
) -> Result<NewBlockSubscription, EthClientError> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|err| EthClientError::Custom(format!("No async runtime to poll blocks: {err}")))?;
    let (sender, cancel_token, subscription) = NewBlockSubscription::channel();

    runtime.spawn(poll_new_blocks(client, poll_interval, sender, cancel_token));

    Ok(subscription)
}

async fn poll_new_blocks(
    client: EthClient,
    poll_interval: Duration,
    sender: NewBlockSender,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_seen: Option<u64> = None;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("Block subscription cancelled");
                return;
            }
            _ = interval.tick() => {}
        }

        let head = match client.get_block_number().await {
            Ok(head) => head,
            Err(err) => {
                warn!(error = %err, "Block subscription lost");
                let _ = sender.send(Err(err)).await;
                return;
            }
        };

        for number in heights_to_emit(last_seen, head) {
            if sender.send(Ok(number)).await.is_err() {
                return;
            }
        }
        last_seen = Some(head);
    }
}

/// Heights to report after observing `head`, given the last reported one.
/// A head below the last one means the dev chain was reset: the new head is
/// reported on its own.
pub fn heights_to_emit(last_seen: Option<u64>, head: u64) -> Vec<u64> {
    match last_seen {
        None => vec![head],
        Some(seen) if head > seen => {
            let first = (seen + 1).max(head.saturating_sub(MAX_BLOCKS_PER_POLL - 1));
            (first..=head).collect()
        }
        Some(seen) if head < seen => vec![head],
        Some(_) => Vec::new(),
    }
}
