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

use std::sync::Arc;

use log::{debug, error, warn};
use url::Url;

use super::{weight::calculate_host_weight, HostDb, HostEntry};
use crate::{
    chain::{decode_announcement, ChainBlock, ConsensusChange, HostPublicKey},
    system::Subscription,
    Result,
};

// An array containing all possible local host strings
const LOCAL_HOST_STRS: [&str; 2] = ["localhost", "localhost.localdomain"];

impl HostDb {
    /// Consensus processing loop. Change sets are handled strictly in
    /// delivery order by this single task, never concurrently.
    pub(super) async fn sync_loop(
        self: Arc<Self>,
        sub: Subscription<ConsensusChange>,
    ) -> Result<()> {
        loop {
            let change = sub.receive().await;
            self.process_consensus_change(change).await;
        }
    }

    /// Apply one change set: track the block height across reverted and
    /// applied blocks, register hosts announced in applied blocks, then
    /// advance the checkpoint and persist a snapshot.
    ///
    /// Persistence failures are logged but never roll back the
    /// in-memory update. The processor always advances with the chain,
    /// risking at most one change set of durability.
    pub(super) async fn process_consensus_change(&self, change: ConsensusChange) {
        let mut state = self.state.lock().await;
        let mut to_scan = vec![];

        for block in &change.reverted {
            if state.block_height > 0 {
                state.block_height -= 1;
            } else if !block.is_genesis() {
                error!(
                    target: "hostdb::sync::process_consensus_change()",
                    "CRITICAL: non-genesis block reverted at height zero, forcing height to zero"
                );
                state.block_height = 0;
            }
            // Reverting the genesis block at height zero keeps height zero
        }

        for block in &change.applied {
            if state.block_height > 0 || !block.is_genesis() {
                state.block_height = match state.block_height.checked_add(1) {
                    Some(height) => height,
                    None => {
                        error!(
                            target: "hostdb::sync::process_consensus_change()",
                            "CRITICAL: block height overflow on applied block, forcing height to zero"
                        );
                        0
                    }
                };
            }
            // Applying the genesis block at height zero keeps height zero
        }

        for block in &change.applied {
            for (addr, key) in find_host_announcements(block) {
                debug!(
                    target: "hostdb::sync::process_consensus_change()",
                    "Found a host announcement: {} -> {}", key, addr
                );

                if !is_valid_announcement_addr(&addr, self.settings.localnet) {
                    warn!(
                        target: "hostdb::sync::process_consensus_change()",
                        "Host {} announced an invalid address {}, dropping", key, addr
                    );
                    continue
                }

                match state.tree.get(&key).cloned() {
                    Some(known) => {
                        // Re-announcement. Pick up the new address, the
                        // score catches up on the next scan.
                        if known.net_address != addr {
                            let mut updated = known;
                            updated.net_address = addr;
                            let weight =
                                calculate_host_weight(&updated, state.block_height, &self.settings);
                            state.tree.insert(updated, weight);
                        }
                    }
                    None => {
                        let entry = HostEntry::new(key, addr, state.block_height);
                        let weight =
                            calculate_host_weight(&entry, state.block_height, &self.settings);
                        state.tree.insert(entry, weight);
                    }
                }
                to_scan.push(key);
            }
        }

        state.last_change = change.id;
        let snapshot = state.snapshot();
        drop(state);

        if let Err(e) = self.store.save(&snapshot) {
            error!(
                target: "hostdb::sync::process_consensus_change()",
                "Error saving hostdb: {}", e
            );
        }

        for key in to_scan {
            self.queue_scan(&key).await;
        }
    }
}

/// Extract host announcements from a block. Aux data fields carrying
/// foreign payloads are skipped without raising errors, the chain is
/// full of third-party data. No address validation happens here.
fn find_host_announcements(block: &ChainBlock) -> Vec<(Url, HostPublicKey)> {
    let mut found = vec![];
    for tx in &block.txs {
        for aux in &tx.aux_data {
            if let Ok(announcement) = decode_announcement(aux) {
                found.push(announcement);
            }
        }
    }
    found
}

/// Check that an announced address has the form `scheme://host:port`
/// with a transport we support and, outside localnet deployments,
/// doesn't point into a local range.
fn is_valid_announcement_addr(addr: &Url, localnet: bool) -> bool {
    if addr.host_str().is_none() ||
        addr.port().is_none() ||
        addr.cannot_be_a_base() ||
        addr.path_segments().is_some()
    {
        return false
    }

    match addr.scheme() {
        "tcp" | "tcp+tls" => {}
        _ => return false,
    }

    if !localnet && is_local_host(addr) {
        return false
    }

    true
}

/// Whether a URL points at a local or otherwise non-routable host.
fn is_local_host(url: &Url) -> bool {
    // We do this hack in order to parse IPs properly.
    // https://github.com/whatwg/url/issues/749
    let Ok(addr) = Url::parse(&url.as_str().replace(url.scheme(), "http")) else { return true };

    match addr.host() {
        Some(url::Host::Ipv4(ip)) => {
            ip.is_loopback() ||
                ip.is_private() ||
                ip.is_link_local() ||
                ip.is_broadcast() ||
                ip.is_unspecified()
        }
        Some(url::Host::Ipv6(ip)) => {
            ip.is_loopback() ||
                ip.is_unspecified() ||
                (ip.segments()[0] & 0xfe00) == 0xfc00 ||
                (ip.segments()[0] & 0xffc0) == 0xfe80
        }
        Some(url::Host::Domain(domain)) => LOCAL_HOST_STRS.contains(&domain),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_host() {
        let local_hosts: Vec<Url> = vec![
            Url::parse("tcp://localhost:2222").unwrap(),
            Url::parse("tcp://127.0.0.1:2222").unwrap(),
            Url::parse("tcp+tls://[::1]:2222").unwrap(),
            Url::parse("tcp://localhost.localdomain:2222").unwrap(),
            Url::parse("tcp://192.168.10.65:2222").unwrap(),
            Url::parse("tcp://0.0.0.0:2222").unwrap(),
            Url::parse("tcp://255.255.255.255:2222").unwrap(),
        ];
        for host in local_hosts {
            assert!(is_local_host(&host), "{} should be local", host);
        }

        let remote_hosts: Vec<Url> = vec![
            Url::parse("tcp://dark.fi:80").unwrap(),
            Url::parse("tcp://77.168.10.65:2222").unwrap(),
            Url::parse("tcp://[2345:0425:2ca1:0000:0000:0567:5673:23b5]:2222").unwrap(),
        ];
        for host in remote_hosts {
            assert!(!is_local_host(&host), "{} should not be local", host);
        }
    }

    #[test]
    fn test_announcement_addr_validation() {
        // Valid remote addresses
        assert!(is_valid_announcement_addr(&Url::parse("tcp://dark.fi:80").unwrap(), false));
        assert!(is_valid_announcement_addr(
            &Url::parse("tcp+tls://77.168.10.65:2222").unwrap(),
            false
        ));

        // Missing port, bad scheme, or a path
        assert!(!is_valid_announcement_addr(&Url::parse("tcp://dark.fi").unwrap(), false));
        assert!(!is_valid_announcement_addr(&Url::parse("https://dark.fi:443").unwrap(), false));
        assert!(!is_valid_announcement_addr(&Url::parse("tcp://dark.fi:80/x").unwrap(), false));

        // Local addresses pass only on localnet
        let local = Url::parse("tcp://127.0.0.1:2222").unwrap();
        assert!(!is_valid_announcement_addr(&local, false));
        assert!(is_valid_announcement_addr(&local, true));
    }
}
