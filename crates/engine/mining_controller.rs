//! Block production control for development nodes.
//!
//! Mode changes go to the node first and are only reflected locally once the
//! node accepted them. Manual mining is single-flight: a request made while
//! another one runs returns immediately instead of queueing.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chainsync_common::types::MiningState;
use chainsync_rpc::ChainClient;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::{error::ChainSyncError, utils::InFlightGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineOutcome {
    /// The node mined exactly this block.
    Mined(u64),
    /// Another manual mine was in progress; nothing was sent to the node.
    AlreadyMining,
}

#[derive(Debug)]
pub struct MiningController<C> {
    client: Arc<C>,
    state: watch::Sender<MiningState>,
    mode_lock: Mutex<()>,
    mining: AtomicBool,
}

/// Publishes `is_mining = false` when dropped.
struct MiningFlag<'a>(&'a watch::Sender<MiningState>);

impl<'a> MiningFlag<'a> {
    fn raise(state: &'a watch::Sender<MiningState>) -> Self {
        state.send_modify(|state| state.is_mining = true);
        Self(state)
    }
}

impl Drop for MiningFlag<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|state| state.is_mining = false);
    }
}

impl<C: ChainClient> MiningController<C> {
    /// Development nodes start in automine mode.
    pub fn new(client: Arc<C>) -> Self {
        Self::with_state(client, MiningState::default())
    }

    pub fn with_state(client: Arc<C>, initial: MiningState) -> Self {
        let (state, _) = watch::channel(MiningState {
            is_mining: false,
            ..initial
        });
        Self {
            client,
            state,
            mode_lock: Mutex::new(()),
            mining: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> MiningState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<MiningState> {
        self.state.subscribe()
    }

    /// Flips between automine and manual mode. Returns the new automine flag.
    /// If the node rejects the change the local mode is left untouched.
    pub async fn toggle_mining_mode(&self) -> Result<bool, ChainSyncError> {
        let _lock = self.mode_lock.lock().await;
        let enabled = !self.state.borrow().is_automine;
        self.apply_mode(enabled).await?;
        Ok(enabled)
    }

    pub async fn set_automine(&self, enabled: bool) -> Result<(), ChainSyncError> {
        let _lock = self.mode_lock.lock().await;
        self.apply_mode(enabled).await
    }

    async fn apply_mode(&self, enabled: bool) -> Result<(), ChainSyncError> {
        if let Err(err) = self.client.set_automine(enabled).await {
            warn!(error = %err, automine = enabled, "Node refused mining mode change");
            return Err(err.into());
        }
        self.state.send_modify(|state| state.is_automine = enabled);
        info!(automine = enabled, "Mining mode changed");
        Ok(())
    }

    /// Mines one block and checks the head moved by exactly one.
    ///
    /// `last_mined_block` is only updated when it did; any other movement is
    /// reported as [`ChainSyncError::InconsistentMine`].
    pub async fn manual_mine(&self) -> Result<MineOutcome, ChainSyncError> {
        let Some(_in_flight) = InFlightGuard::try_acquire(&self.mining) else {
            debug!("Manual mine already in progress");
            return Ok(MineOutcome::AlreadyMining);
        };
        let _flag = MiningFlag::raise(&self.state);

        let before = self.client.latest_block_number().await?;
        self.client.mine_one_block().await?;
        let after = self.client.latest_block_number().await?;

        if before.checked_add(1) != Some(after) {
            warn!(before, after, "Manual mine did not advance the head by one block");
            return Err(ChainSyncError::InconsistentMine { before, after });
        }

        self.state
            .send_modify(|state| state.last_mined_block = Some(after));
        info!(block = after, "Mined block");
        Ok(MineOutcome::Mined(after))
    }
}
