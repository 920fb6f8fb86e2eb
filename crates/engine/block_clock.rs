//! Tracks the chain head and how long ago it moved.
//!
//! A background task merges two event sources: new-block notifications from
//! the node and a fixed tick. Every change is published as a [`ClockState`]
//! snapshot on a watch channel. A steadily growing
//! `seconds_since_last_block` is the "chain may be stalled" signal.

use std::sync::Arc;
use std::time::Duration;

use chainsync_common::types::ClockState;
use chainsync_rpc::{ChainClient, NewBlockSubscription, clients::subscription::NewBlockEvent};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{config::EngineConfig, utils::sleep_until_some};

/// Pure state machine behind [`BlockClock`].
///
/// `seconds_since_last_block` is the number of whole tick intervals elapsed
/// since the head last changed. A notification for the height already tracked
/// (a fresh subscription re-reporting the head) is not a new block and leaves
/// the counter alone. Any other height resets it, including a lower one after
/// a dev chain reset.
///
/// After a reset the next tick is swallowed. Ticks are one interval apart, so
/// that tick always lands less than one interval after the block: counting it
/// would round the elapsed time up, and a tick arriving together with the
/// block would read 1 instead of 0. The counter is therefore the elapsed
/// time rounded down, never up.
#[derive(Debug, Clone, Default)]
pub struct ClockTracker {
    state: ClockState,
    reset_pending: bool,
}

impl ClockTracker {
    /// Records a block notification. Returns false when `number` is the head
    /// already tracked, in which case nothing changed.
    pub fn on_block(&mut self, number: u64) -> bool {
        if self.state.latest_block == Some(number) {
            return false;
        }
        self.state.latest_block = Some(number);
        self.state.seconds_since_last_block = 0;
        self.reset_pending = true;
        true
    }

    pub fn on_tick(&mut self) {
        if self.reset_pending {
            self.reset_pending = false;
            return;
        }
        self.state.seconds_since_last_block = self.state.seconds_since_last_block.saturating_add(1);
    }

    pub fn state(&self) -> ClockState {
        self.state
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClockSettings {
    pub tick_interval: Duration,
    pub block_poll_interval: Duration,
    pub subscribe_retry: Duration,
}

impl From<&EngineConfig> for ClockSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            block_poll_interval: config.block_poll_interval(),
            subscribe_retry: config.subscribe_retry(),
        }
    }
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Handle to a running clock task. Dropping it cancels the task.
#[derive(Debug)]
pub struct BlockClock {
    state: watch::Receiver<ClockState>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl BlockClock {
    /// Starts tracking. The task stops when `cancel_token` (or the returned
    /// handle) is cancelled.
    pub fn spawn<C: ChainClient>(
        client: Arc<C>,
        settings: ClockSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ClockState::default());
        let handle = tokio::spawn(run_clock(client, settings, state_tx, cancel_token.clone()));

        Self {
            state: state_rx,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> ClockState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ClockState> {
        self.state.clone()
    }

    /// Cancels the task and waits for it to unsubscribe and exit.
    pub async fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for BlockClock {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn next_block(subscription: &mut Option<NewBlockSubscription>) -> Option<NewBlockEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

async fn run_clock<C: ChainClient>(
    client: Arc<C>,
    settings: ClockSettings,
    state_tx: watch::Sender<ClockState>,
    cancel_token: CancellationToken,
) {
    let mut tracker = ClockTracker::default();
    let mut ticker = interval_at(Instant::now() + settings.tick_interval, settings.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut subscription: Option<NewBlockSubscription> = None;
    let mut resubscribe_at = Some(Instant::now());

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            event = next_block(&mut subscription) => {
                match event {
                    Some(Ok(number)) => {
                        if tracker.on_block(number) {
                            debug!(block = number, "New block");
                            state_tx.send_replace(tracker.state());
                        } else {
                            debug!(block = number, "Head already tracked");
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "Block subscription lost, retrying");
                        subscription = None;
                        resubscribe_at = Some(Instant::now() + settings.subscribe_retry);
                    }
                    None => {
                        warn!("Block subscription closed, retrying");
                        subscription = None;
                        resubscribe_at = Some(Instant::now() + settings.subscribe_retry);
                    }
                }
            }

            _ = sleep_until_some(resubscribe_at) => {
                match client.subscribe_new_blocks(settings.block_poll_interval) {
                    Ok(new_subscription) => {
                        info!("Subscribed to new blocks");
                        subscription = Some(new_subscription);
                        resubscribe_at = None;
                    }
                    Err(err) => {
                        warn!(error = %err, "Failed to subscribe to new blocks");
                        resubscribe_at = Some(Instant::now() + settings.subscribe_retry);
                    }
                }
            }

            _ = ticker.tick() => {
                tracker.on_tick();
                state_tx.send_replace(tracker.state());
            }
        }
    }

    if let Some(subscription) = subscription.take() {
        subscription.unsubscribe();
    }
    debug!("Block clock stopped");
}
