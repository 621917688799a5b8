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

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, warn};
use rand::{rngs::OsRng, Rng};
use url::Url;

use super::{weight::calculate_host_weight, HostDb};
use crate::{
    chain::HostPublicKey,
    currency::Currency,
    system::{sleep, timeout},
    Error, Result,
};

/// Settings a host reports during a scan.
#[derive(Debug, Clone, Default)]
pub struct HostAnnouncedSettings {
    /// Whether the host takes on new storage contracts
    pub accepting_contracts: bool,
    /// Price per byte per block of stored data
    pub storage_price: Currency,
    /// Flat rate charged for forming a contract
    pub contract_price: Currency,
    /// Price per byte of upload bandwidth
    pub upload_price: Currency,
    /// Price per byte of download bandwidth
    pub download_price: Currency,
    /// Collateral pledged against storage obligations
    pub collateral: Currency,
    /// Unsold storage capacity, in bytes
    pub remaining_storage: u64,
    /// Software version the host runs
    pub version: String,
    /// Address the host prefers to be reached on, if it moved
    pub net_address: Option<Url>,
}

/// Capability used to reach a host over the network and fetch its
/// advertised settings.
#[async_trait]
pub trait HostProber: Send + Sync {
    /// Open an authenticated connection to the host and perform a
    /// settings fetch round trip.
    async fn fetch_settings(&self, addr: &Url) -> Result<HostAnnouncedSettings>;
}

impl HostDb {
    /// Queue a host for scanning. A host already waiting in the queue
    /// is not queued again, which also keeps failed hosts from being
    /// retried in a tight loop.
    pub async fn queue_scan(&self, key: &HostPublicKey) {
        let mut pending = self.pending_scans.lock().await;
        if !pending.insert(*key) {
            return
        }
        drop(pending);

        if let Err(e) = self.scan_send.send(*key).await {
            warn!(target: "hostdb::scan::queue_scan()", "Error queueing scan: {}", e);
        }
    }

    /// Scan worker loop. Workers share one FIFO queue, each probing a
    /// single host at a time. The network round trip happens outside
    /// the state lock so a slow host never stalls consensus processing,
    /// and a fixed deadline keeps a hung host from starving the pool.
    pub(super) async fn scan_worker(self: Arc<Self>) -> Result<()> {
        loop {
            let key = match self.scan_recv.recv().await {
                Ok(key) => key,
                Err(e) => return Err(Error::ChannelRecvError(e.to_string())),
            };
            self.pending_scans.lock().await.remove(&key);

            let Some(entry) = self.host(&key).await else {
                warn!(target: "hostdb::scan::scan_worker()", "Queued host {} is unknown", key);
                continue
            };

            debug!(
                target: "hostdb::scan::scan_worker()",
                "Scanning host {} on {}", key, entry.net_address
            );

            let deadline = Duration::from_secs(self.settings.scan_deadline);
            let reply = timeout(deadline, self.prober.fetch_settings(&entry.net_address)).await;

            // Reread the entry, it may have changed during the probe.
            let mut state = self.state.lock().await;
            let Some(current) = state.tree.get(&key) else { continue };
            let mut updated = current.clone();

            match reply {
                Ok(Ok(settings)) => {
                    debug!(target: "hostdb::scan::scan_worker()", "Host {} is online", key);
                    updated.apply_settings(&settings);
                }
                Ok(Err(e)) => {
                    debug!(
                        target: "hostdb::scan::scan_worker()",
                        "Scan of host {} failed: {}", key, e
                    );
                    updated.scan_failures += 1;
                }
                Err(_) => {
                    debug!(
                        target: "hostdb::scan::scan_worker()",
                        "Scan of host {} timed out", key
                    );
                    updated.scan_failures += 1;
                }
            }

            let weight = calculate_host_weight(&updated, state.block_height, &self.settings);
            state.tree.insert(updated, weight);
        }
    }

    /// Periodic rescan loop. Sleeps a random interval between cycles,
    /// then queues a fixed quantity of weighted-random hosts. The
    /// randomized interval keeps independent instances from probing
    /// the same hosts in synchronized bursts.
    pub(super) async fn rescan_loop(self: Arc<Self>) -> Result<()> {
        loop {
            let interval = OsRng
                .gen_range(self.settings.min_rescan_interval..=self.settings.max_rescan_interval);
            debug!(
                target: "hostdb::scan::rescan_loop()",
                "Next rescan cycle in {} seconds", interval
            );
            sleep(interval).await;

            if !self.consensus.synced().await {
                debug!(
                    target: "hostdb::scan::rescan_loop()",
                    "Consensus not synced, skipping rescan cycle"
                );
                continue
            }

            let hosts = {
                let mut state = self.state.lock().await;
                state.tree.random_hosts(self.settings.checkup_quantity, &[])
            };

            debug!(
                target: "hostdb::scan::rescan_loop()",
                "Queueing {} hosts for rescan", hosts.len()
            );
            for host in hosts {
                self.queue_scan(&host.public_key).await;
            }
        }
    }
}
