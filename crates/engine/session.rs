//! A console session: every engine component wired to one node.
//!
//! Owns the background tasks (block clock, mempool polling, periodic
//! reconciliation) and tears them all down on [`ConsoleSession::shutdown`] or
//! drop. Callers read published snapshots and relay user actions.

use std::sync::Arc;

use chainsync_common::{
    Address, H256,
    networks::{Network, network_label},
    types::{BlockSlot, ClockState, Deployment, MiningState, TransactionRecord},
};
use chainsync_rpc::{
    BackendClient, ChainClient, EthClient, MetadataStore, RecordReceipt,
    clients::backend::deployment_record,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    block_clock::{BlockClock, ClockSettings},
    config::EngineConfig,
    error::ChainSyncError,
    events::{ContractEvent, EventFeed},
    mempool_monitor::{MempoolMonitor, MempoolSnapshot},
    mining_controller::{MineOutcome, MiningController},
    reconciler::{DeploymentReconciler, ScanOmission},
    timeline::build_window,
};

/// Result of the last successful instance sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub valid: Vec<Deployment>,
    pub stale: Vec<Deployment>,
    pub unverified: Vec<Deployment>,
    pub history: Vec<TransactionRecord>,
    pub timeline: Vec<BlockSlot>,
    pub omissions: Vec<ScanOmission>,
    pub head: u64,
}

#[derive(Debug)]
struct SyncWorker<C> {
    reconciler: DeploymentReconciler<C>,
    network_label: &'static str,
    display_window: u64,
    snapshot: watch::Sender<Arc<SyncSnapshot>>,
}

impl<C: ChainClient> SyncWorker<C> {
    async fn sync_instances<S: MetadataStore + ?Sized>(
        &self,
        store: &S,
        owner: &str,
    ) -> Result<Arc<SyncSnapshot>, ChainSyncError> {
        let deployments = store
            .deployments_by_owner(owner, self.network_label)
            .await?;
        let report = self.reconciler.reconcile(deployments).await?;
        for signal in report.stale_signals() {
            debug!(%signal, "Stale deployment dropped");
        }
        let timeline = build_window(&report.history, self.display_window);

        let snapshot = Arc::new(SyncSnapshot {
            valid: report.valid,
            stale: report.stale,
            unverified: report.unverified,
            history: report.history,
            timeline,
            omissions: report.omissions,
            head: report.head,
        });
        self.snapshot.send_replace(snapshot.clone());
        Ok(snapshot)
    }
}

pub struct ConsoleSession<C: ChainClient> {
    chain_id: u64,
    network: Option<Network>,
    config: EngineConfig,
    clock: Option<BlockClock>,
    mempool: Arc<MempoolMonitor<C>>,
    mining: MiningController<C>,
    events: EventFeed<C>,
    sync: Arc<SyncWorker<C>>,
    cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ConsoleSession<EthClient> {
    /// Connects to the configured RPC endpoints and starts a session.
    pub async fn connect(config: EngineConfig) -> Result<Self, ChainSyncError> {
        let client = EthClient::new_with_config(
            config.rpc_urls.iter().map(String::as_str).collect(),
            config.request_timeout(),
        )?;
        Self::start(Arc::new(client), config).await
    }
}

/// Metadata backend client for the configured base url.
pub fn metadata_client(config: &EngineConfig) -> Result<BackendClient, ChainSyncError> {
    Ok(BackendClient::new(&config.metadata_api_base)?)
}

impl<C: ChainClient> ConsoleSession<C> {
    /// Resolves the network and spawns the block clock and mempool monitor.
    /// Chains outside the known registry are allowed; their deployments are
    /// looked up under the `unsupported` label. An invalid `config` is
    /// rejected before anything is spawned.
    pub async fn start(client: Arc<C>, config: EngineConfig) -> Result<Self, ChainSyncError> {
        let config = config.validated()?;
        let chain_id = client.chain_id().await?;
        let network = Network::from_chain_id(chain_id);
        match network {
            Some(network) => info!(chain_id, %network, "Console session started"),
            None => warn!(chain_id, "Console session started on an unknown chain"),
        }

        let cancel_token = CancellationToken::new();
        let clock = BlockClock::spawn(
            client.clone(),
            ClockSettings::from(&config),
            cancel_token.child_token(),
        );
        let mempool = Arc::new(MempoolMonitor::new(client.clone()));
        let mempool_task = mempool
            .clone()
            .spawn(config.mempool_poll_interval(), cancel_token.child_token());

        let (snapshot, _) = watch::channel(Arc::new(SyncSnapshot::default()));
        let sync = Arc::new(SyncWorker {
            reconciler: DeploymentReconciler::with_window(client.clone(), config.scan_window),
            network_label: network_label(chain_id),
            display_window: config.display_window,
            snapshot,
        });

        Ok(Self {
            chain_id,
            network,
            mining: MiningController::new(client.clone()),
            events: EventFeed::new(client, config.event_lookback_blocks),
            config,
            clock: Some(clock),
            mempool,
            sync,
            cancel_token,
            tasks: vec![mempool_task],
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn network(&self) -> Option<Network> {
        self.network
    }

    pub fn network_label(&self) -> &'static str {
        self.sync.network_label
    }

    /// Only local development chains accept `evm_mine` / `evm_setAutomine`.
    pub fn supports_mining_control(&self) -> bool {
        self.network.is_some_and(|network| network.is_dev_chain())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> ClockState {
        self.clock
            .as_ref()
            .map(BlockClock::state)
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.mempool.pending_count()
    }

    pub fn mempool(&self) -> Arc<MempoolSnapshot> {
        self.mempool.snapshot()
    }

    pub fn mining(&self) -> MiningState {
        self.mining.state()
    }

    pub fn latest_sync(&self) -> Arc<SyncSnapshot> {
        self.sync.snapshot.borrow().clone()
    }

    pub fn watch_sync(&self) -> watch::Receiver<Arc<SyncSnapshot>> {
        self.sync.snapshot.subscribe()
    }

    pub async fn toggle_mining_mode(&self) -> Result<bool, ChainSyncError> {
        if !self.supports_mining_control() {
            debug!(chain_id = self.chain_id, "Mining control sent to a non-development chain");
        }
        self.mining.toggle_mining_mode().await
    }

    pub async fn manual_mine(&self) -> Result<MineOutcome, ChainSyncError> {
        if !self.supports_mining_control() {
            debug!(chain_id = self.chain_id, "Mining control sent to a non-development chain");
        }
        self.mining.manual_mine().await
    }

    pub async fn load_events(&self, address: Address) -> Result<Vec<ContractEvent>, ChainSyncError> {
        self.events.load_recent(address).await
    }

    /// Fetches `owner`'s deployments for this network, reconciles them and
    /// publishes the result. On failure the previous snapshot stays current.
    pub async fn sync_instances<S: MetadataStore + ?Sized>(
        &self,
        store: &S,
        owner: &str,
    ) -> Result<Arc<SyncSnapshot>, ChainSyncError> {
        self.sync
            .sync_instances(store, owner)
            .await
            .inspect_err(|err| error!(error = %err, owner, "Instance sync failed"))
    }

    /// Persists a confirmed deployment. An empty chain label is filled in
    /// with this session's network.
    pub async fn record_deployment<S: MetadataStore + ?Sized>(
        &self,
        store: &S,
        deployment: &Deployment,
        tx_hash: Option<H256>,
        user_id: Option<String>,
    ) -> Result<RecordReceipt, ChainSyncError> {
        let mut record = deployment_record(deployment, tx_hash, user_id);
        if record.chain.is_empty() {
            record.chain = self.network_label().to_string();
        }
        Ok(store.record_deployment(&record).await?)
    }

    /// Re-runs [`ConsoleSession::sync_instances`] every reconcile interval
    /// until the session shuts down. A failed cycle is logged and the next
    /// one runs on schedule.
    pub fn spawn_auto_sync<S: MetadataStore>(&mut self, store: Arc<S>, owner: impl Into<String>) {
        let worker = self.sync.clone();
        let owner = owner.into();
        let cancel_token = self.cancel_token.child_token();
        let period = self.config.reconcile_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    result = worker.sync_instances(store.as_ref(), &owner) => {
                        if let Err(err) = result {
                            error!(error = %err, owner = %owner, "Instance sync failed");
                        }
                    }
                }
            }
            debug!("Auto sync stopped");
        });
        self.tasks.push(handle);
    }

    /// Stops every background task and waits for them to exit.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(clock) = self.clock.take() {
            clock.stop().await;
        }
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        info!(chain_id = self.chain_id, "Console session stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl<C: ChainClient> Drop for ConsoleSession<C> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
