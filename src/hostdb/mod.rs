/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    collections::HashSet,
    sync::Arc,
    time::UNIX_EPOCH,
};

use darkfi_serial::{SerialDecodable, SerialEncodable};
use log::{debug, error, info, warn};
use smol::lock::Mutex;
use url::Url;

use crate::{
    chain::{ConsensusChangeId, ConsensusSet, HostPublicKey},
    currency::Currency,
    system::{ExecutorPtr, StoppableTask, StoppableTaskPtr},
    Error, Result,
};

/// Snapshot store for crash-consistent persistence of the host set and
/// the consensus checkpoint.
pub mod persist;
pub use persist::{HostDbSnapshot, HostStore};

/// Scan scheduler. A bounded pool of workers probes hosts for their
/// live settings, plus a periodic rescan cycle that keeps the whole
/// set fresh.
pub mod scan;
pub use scan::{HostAnnouncedSettings, HostProber};

/// Hostdb configuration presets.
pub mod settings;
pub use settings::{HostDbSettings, HostDbSettingsPtr};

/// Consensus change processing. Discovers host announcements in
/// applied blocks and keeps the registry in sync with the chain across
/// reorgs.
pub mod sync;

/// Weighted random-selection index over the known hosts.
pub mod tree;
pub use tree::HostTree;

/// The multi-factor host weighting function.
pub mod weight;
pub use weight::calculate_host_weight;

/// Atomic pointer to a host database
pub type HostDbPtr = Arc<HostDb>;

/// One record per known storage host, keyed by its announced public
/// key. Created on the first valid announcement found in an applied
/// block, updated in place by scan results and re-announcements, and
/// never deleted.
#[derive(Debug, Clone, SerialEncodable, SerialDecodable)]
pub struct HostEntry {
    /// Key the host announced itself under
    pub public_key: HostPublicKey,
    /// Address the host was last announced or scanned on
    pub net_address: Url,
    /// Whether the host reported accepting new contracts
    pub accepting_contracts: bool,
    /// Price per byte per block of stored data
    pub storage_price: Currency,
    /// Flat rate charged for forming a contract
    pub contract_price: Currency,
    /// Price per byte of upload bandwidth
    pub upload_price: Currency,
    /// Price per byte of download bandwidth
    pub download_price: Currency,
    /// Funds the host pledges against failing a storage obligation
    pub collateral: Currency,
    /// Storage capacity the host has left to sell, in bytes
    pub remaining_storage: u64,
    /// Software version the host advertises
    pub version: String,
    /// Chain height the host was first announced at, immutable
    pub first_seen: u32,
    /// Unix time of the last successful scan, zero if never scanned
    pub last_scan: u64,
    /// Failed scans since the last successful one
    pub scan_failures: u32,
}

impl HostEntry {
    /// New entry for a host discovered at the given height. Terms stay
    /// zeroed until the first successful scan fills them in.
    pub fn new(public_key: HostPublicKey, net_address: Url, first_seen: u32) -> Self {
        Self {
            public_key,
            net_address,
            accepting_contracts: false,
            storage_price: Currency::zero(),
            contract_price: Currency::zero(),
            upload_price: Currency::zero(),
            download_price: Currency::zero(),
            collateral: Currency::zero(),
            remaining_storage: 0,
            version: String::new(),
            first_seen,
            last_scan: 0,
            scan_failures: 0,
        }
    }

    /// Fold a successful scan reply into the entry.
    pub fn apply_settings(&mut self, settings: &HostAnnouncedSettings) {
        self.accepting_contracts = settings.accepting_contracts;
        self.storage_price = settings.storage_price.clone();
        self.contract_price = settings.contract_price.clone();
        self.upload_price = settings.upload_price.clone();
        self.download_price = settings.download_price.clone();
        self.collateral = settings.collateral.clone();
        self.remaining_storage = settings.remaining_storage;
        self.version = settings.version.clone();
        if let Some(addr) = &settings.net_address {
            self.net_address = addr.clone();
        }
        self.last_scan = UNIX_EPOCH.elapsed().unwrap().as_secs();
        self.scan_failures = 0;
    }

    /// Whether the host is currently believed reachable with acceptable
    /// terms.
    pub fn is_active(&self, max_scan_failures: u32) -> bool {
        self.last_scan > 0 && self.accepting_contracts && self.scan_failures < max_scan_failures
    }
}

/// Startup checkpoints the fault-injection port can fire at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCheckpoint {
    /// The persisted snapshot was loaded into the registry
    AfterLoad,
    /// The consensus subscription is about to be re-established
    BeforeResubscribe,
}

/// Test-harness port: lets a harness halt the startup sequence at a
/// named checkpoint so crash recovery can be exercised
/// deterministically. Production code passes `NoFaults`.
pub trait FaultInjection: Send + Sync {
    /// Whether startup should halt at the given checkpoint.
    fn disrupt(&self, checkpoint: FaultCheckpoint) -> bool;
}

/// The default injector. Never fires.
pub struct NoFaults;

impl FaultInjection for NoFaults {
    fn disrupt(&self, _checkpoint: FaultCheckpoint) -> bool {
        false
    }
}

/// Registry, block height and checkpoint form one logical unit of
/// shared state behind a single exclusive lock. No operation performs
/// network I/O while holding it.
pub(crate) struct HostDbState {
    pub tree: HostTree,
    pub block_height: u32,
    pub last_change: ConsensusChangeId,
}

impl HostDbState {
    fn snapshot(&self) -> HostDbSnapshot {
        HostDbSnapshot {
            block_height: self.block_height,
            last_change: self.last_change,
            hosts: self.tree.all(),
        }
    }
}

/// The host database. Discovers storage hosts announced on the chain,
/// keeps their settings fresh through scans, and serves weighted random
/// selections to the contract layer.
pub struct HostDb {
    /// Shared mutable state under one exclusive lock
    state: Mutex<HostDbState>,
    /// Runtime configuration
    settings: HostDbSettingsPtr,
    /// Consensus subsystem handle
    consensus: Arc<dyn ConsensusSet>,
    /// Network probe used by the scan workers
    prober: Arc<dyn HostProber>,
    /// Snapshot store
    store: HostStore,
    /// Startup fault-injection port, a no-op outside test harnesses
    faults: Arc<dyn FaultInjection>,
    /// Scan queue
    scan_send: smol::channel::Sender<HostPublicKey>,
    scan_recv: smol::channel::Receiver<HostPublicKey>,
    /// Keys currently waiting in the scan queue
    pending_scans: Mutex<HashSet<HostPublicKey>>,
    /// Consensus processing task
    sync_task: StoppableTaskPtr,
    /// Scan worker tasks
    scan_tasks: Vec<StoppableTaskPtr>,
    /// Periodic rescan task
    rescan_task: StoppableTaskPtr,
}

impl HostDb {
    /// Instantiate a host database. Opening the snapshot store is a
    /// construction-time error; nothing else touches the disk here.
    pub fn new(
        settings: HostDbSettingsPtr,
        consensus: Arc<dyn ConsensusSet>,
        prober: Arc<dyn HostProber>,
        faults: Arc<dyn FaultInjection>,
    ) -> Result<HostDbPtr> {
        let store = HostStore::open(&settings.db_path)?;
        let (scan_send, scan_recv) = smol::channel::unbounded();

        let mut scan_tasks = Vec::with_capacity(settings.scanning_tasks);
        for _ in 0..settings.scanning_tasks {
            scan_tasks.push(StoppableTask::new());
        }

        Ok(Arc::new(Self {
            state: Mutex::new(HostDbState {
                tree: HostTree::new(),
                block_height: 0,
                last_change: ConsensusChangeId::initial(),
            }),
            settings,
            consensus,
            prober,
            store,
            faults,
            scan_send,
            scan_recv,
            pending_scans: Mutex::new(HashSet::new()),
            sync_task: StoppableTask::new(),
            scan_tasks,
            rescan_task: StoppableTask::new(),
        }))
    }

    /// Restore persisted state, resubscribe to the consensus feed from
    /// the stored checkpoint, and launch the background tasks. A
    /// snapshot with an unknown schema is fatal.
    pub async fn start(self: Arc<Self>, executor: ExecutorPtr) -> Result<()> {
        debug!(target: "hostdb::start()", "Starting hostdb...");

        match self.store.load()? {
            Some(snapshot) => {
                let mut state = self.state.lock().await;
                state.block_height = snapshot.block_height;
                state.last_change = snapshot.last_change;
                for entry in snapshot.hosts {
                    let weight =
                        calculate_host_weight(&entry, snapshot.block_height, &self.settings);
                    state.tree.insert(entry, weight);
                }
                info!(
                    target: "hostdb::start()",
                    "Restored {} hosts at height {}", state.tree.len(), state.block_height
                );
            }
            None => {
                info!(target: "hostdb::start()", "No hostdb file found, starting empty");
            }
        }

        if self.faults.disrupt(FaultCheckpoint::AfterLoad) {
            warn!(target: "hostdb::start()", "Fault injected after load, halting startup");
            return Ok(())
        }

        let last_change = self.state.lock().await.last_change;

        if self.faults.disrupt(FaultCheckpoint::BeforeResubscribe) {
            warn!(target: "hostdb::start()", "Fault injected before resubscribe, halting startup");
            return Ok(())
        }

        let sub = self.consensus.subscribe(last_change).await?;

        self.sync_task.clone().start(
            self.clone().sync_loop(sub),
            |result| async move {
                match result {
                    Ok(()) | Err(Error::HostDbStopped) => {}
                    Err(e) => error!(target: "hostdb", "Consensus processing task exited: {}", e),
                }
            },
            Error::HostDbStopped,
            executor.clone(),
        );

        for task in &self.scan_tasks {
            task.clone().start(
                self.clone().scan_worker(),
                |result| async move {
                    match result {
                        Ok(()) | Err(Error::HostDbStopped) => {}
                        Err(e) => error!(target: "hostdb", "Scan worker exited: {}", e),
                    }
                },
                Error::HostDbStopped,
                executor.clone(),
            );
        }

        self.rescan_task.clone().start(
            self.clone().rescan_loop(),
            |_| async {},
            Error::HostDbStopped,
            executor.clone(),
        );

        info!(
            target: "hostdb::start()",
            "Hostdb started with {} scanning tasks", self.settings.scanning_tasks
        );
        Ok(())
    }

    /// Stop every background task, abandoning in-flight probes, then
    /// durably save a final snapshot.
    pub async fn stop(&self) {
        debug!(target: "hostdb::stop()", "Stopping hostdb...");

        self.sync_task.stop().await;
        for task in &self.scan_tasks {
            task.stop().await;
        }
        self.rescan_task.stop().await;

        let snapshot = self.state.lock().await.snapshot();
        match self.store.save_durable(&snapshot) {
            Ok(()) => debug!(target: "hostdb::stop()", "Final snapshot saved"),
            Err(e) => error!(target: "hostdb::stop()", "Error saving final snapshot: {}", e),
        }
    }

    /// All known hosts, in no particular order.
    pub async fn all_hosts(&self) -> Vec<HostEntry> {
        self.state.lock().await.tree.all()
    }

    /// Hosts currently believed reachable with acceptable terms:
    /// scanned successfully at least once, accepting contracts, and not
    /// failing recent probes.
    pub async fn active_hosts(&self) -> Vec<HostEntry> {
        let max = self.settings.max_scan_failures;
        self.state.lock().await.tree.all().into_iter().filter(|h| h.is_active(max)).collect()
    }

    /// Exact lookup of a single host.
    pub async fn host(&self, key: &HostPublicKey) -> Option<HostEntry> {
        self.state.lock().await.tree.get(key).cloned()
    }

    /// Up to `n` distinct hosts sampled at random without replacement,
    /// biased by weight. Keys in `exclude` are never returned.
    pub async fn random_hosts(&self, n: usize, exclude: &[HostPublicKey]) -> Vec<HostEntry> {
        self.state.lock().await.tree.random_hosts(n, exclude)
    }

    /// Chain height the database has processed up to.
    pub async fn block_height(&self) -> u32 {
        self.state.lock().await.block_height
    }

    /// Checkpoint of the last fully processed change set.
    pub async fn last_change(&self) -> ConsensusChangeId {
        self.state.lock().await.last_change
    }
}
