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

use std::collections::HashMap;

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;

use super::HostEntry;
use crate::{chain::HostPublicKey, currency::Currency};

/// Weighted random-selection index over host entries.
///
/// Entries sit at the leaves of a binary sum tree whose internal nodes
/// hold subtree weight totals, so replacement, lookup and weighted
/// sampling all run in logarithmic time. Sampling is on the hot path
/// of contract formation, which rules out linear rescans of the host
/// set.
///
/// Entries are never removed. A host that went dark keeps accruing
/// weight penalties until sampling practically never returns it.
pub struct HostTree {
    /// Leaf entries with their current weight, in insertion order
    entries: Vec<(HostEntry, Currency)>,
    /// Sum tree over leaf weights. Node `i` covers nodes `2i` and
    /// `2i + 1`, leaves start at `capacity`.
    sums: Vec<BigUint>,
    /// Leaf capacity, always a power of two
    capacity: usize,
    /// Host key -> leaf index
    index: HashMap<HostPublicKey, usize>,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    pub fn new() -> Self {
        Self {
            entries: vec![],
            sums: vec![BigUint::from(0u32); 2],
            capacity: 1,
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Combined weight of every entry in the tree.
    pub fn total_weight(&self) -> Currency {
        Currency(self.sums[1].clone())
    }

    /// Insert an entry under its public key, or replace the entry
    /// already stored there. A replace swaps out the old weighted slot
    /// rather than adding to it, since a weight change invalidates the
    /// cumulative ordering.
    pub fn insert(&mut self, entry: HostEntry, weight: Currency) {
        if let Some(&leaf) = self.index.get(&entry.public_key) {
            self.entries[leaf] = (entry, weight.clone());
            self.set_leaf(leaf, &weight.0);
            return
        }

        if self.entries.len() == self.capacity {
            self.grow();
        }

        let leaf = self.entries.len();
        self.index.insert(entry.public_key, leaf);
        self.entries.push((entry, weight.clone()));
        self.set_leaf(leaf, &weight.0);
    }

    /// Exact lookup by host key.
    pub fn get(&self, key: &HostPublicKey) -> Option<&HostEntry> {
        self.index.get(key).map(|&leaf| &self.entries[leaf].0)
    }

    /// Current weight of the host stored under the given key.
    pub fn weight(&self, key: &HostPublicKey) -> Option<&Currency> {
        self.index.get(key).map(|&leaf| &self.entries[leaf].1)
    }

    /// Enumerate all entries, in no particular order.
    pub fn all(&self) -> Vec<HostEntry> {
        self.entries.iter().map(|(entry, _)| entry.clone()).collect()
    }

    /// Sample up to `n` distinct entries without replacement, each draw
    /// biased by current weight. Keys in `exclude` are never returned.
    /// Returns fewer than `n` entries if not enough are eligible.
    ///
    /// Excluded and already-drawn leaves are masked to weight zero for
    /// the duration of the call and restored before returning.
    pub fn random_hosts(&mut self, n: usize, exclude: &[HostPublicKey]) -> Vec<HostEntry> {
        let zero = BigUint::from(0u32);
        let mut masked: Vec<(usize, BigUint)> = vec![];

        for key in exclude {
            if let Some(&leaf) = self.index.get(key) {
                masked.push((leaf, self.sums[self.capacity + leaf].clone()));
                self.set_leaf(leaf, &zero);
            }
        }

        let mut picked = vec![];
        while picked.len() < n {
            let total = self.sums[1].clone();
            if total == zero {
                break
            }

            let target = OsRng.gen_biguint_below(&total);
            let leaf = self.leaf_at_weight(target);

            masked.push((leaf, self.sums[self.capacity + leaf].clone()));
            self.set_leaf(leaf, &zero);
            picked.push(self.entries[leaf].0.clone());
        }

        // Restore newest-first, so a leaf masked twice (a key listed
        // twice in `exclude`) gets its original weight back.
        for (leaf, weight) in masked.into_iter().rev() {
            self.set_leaf(leaf, &weight);
        }

        picked
    }

    /// Leaf whose cumulative weight range contains the given offset.
    /// The offset must be below the total weight.
    fn leaf_at_weight(&self, mut target: BigUint) -> usize {
        let mut node = 1;
        while node < self.capacity {
            let left = 2 * node;
            if target < self.sums[left] {
                node = left;
            } else {
                target -= &self.sums[left];
                node = left + 1;
            }
        }
        node - self.capacity
    }

    /// Write a leaf weight and refresh the sums on the path to the root.
    fn set_leaf(&mut self, leaf: usize, weight: &BigUint) {
        let mut node = self.capacity + leaf;
        self.sums[node] = weight.clone();
        while node > 1 {
            node /= 2;
            let sum = &self.sums[2 * node] + &self.sums[2 * node + 1];
            self.sums[node] = sum;
        }
    }

    /// Double the leaf capacity and rebuild the sum tree.
    fn grow(&mut self) {
        self.capacity *= 2;
        self.sums = vec![BigUint::from(0u32); 2 * self.capacity];
        for (leaf, (_, weight)) in self.entries.iter().enumerate() {
            self.sums[self.capacity + leaf] = weight.0.clone();
        }
        for node in (1..self.capacity).rev() {
            let sum = &self.sums[2 * node] + &self.sums[2 * node + 1];
            self.sums[node] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    fn entry(id: u8) -> HostEntry {
        HostEntry::new(
            HostPublicKey([id; 32]),
            Url::parse(&format!("tcp://host{}.example.com:7777", id)).unwrap(),
            0,
        )
    }

    fn filled_tree(n: u8) -> HostTree {
        let mut tree = HostTree::new();
        for id in 0..n {
            tree.insert(entry(id), Currency::from(100));
        }
        tree
    }

    #[test]
    fn insert_select_all_roundtrip() {
        let tree = filled_tree(17);

        assert_eq!(tree.len(), 17);
        assert_eq!(tree.all().len(), 17);
        assert_eq!(tree.total_weight(), Currency::from(1700));

        for id in 0..17 {
            let found = tree.get(&HostPublicKey([id; 32])).unwrap();
            assert_eq!(found.public_key, HostPublicKey([id; 32]));
        }
        assert!(tree.get(&HostPublicKey([99; 32])).is_none());
    }

    #[test]
    fn replace_is_never_additive() {
        let mut tree = filled_tree(4);

        let mut updated = entry(2);
        updated.remaining_storage = 777;
        tree.insert(updated, Currency::from(5000));

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get(&HostPublicKey([2; 32])).unwrap().remaining_storage, 777);
        assert_eq!(tree.weight(&HostPublicKey([2; 32])), Some(&Currency::from(5000)));
        // 3 * 100 + 5000, the old slot weight is gone
        assert_eq!(tree.total_weight(), Currency::from(5300));
    }

    #[test]
    fn sampling_respects_exclusion() {
        let mut tree = filled_tree(10);
        let exclude: Vec<_> = (0..5).map(|id| HostPublicKey([id; 32])).collect();

        for _ in 0..200 {
            let picked = tree.random_hosts(3, &exclude);
            assert_eq!(picked.len(), 3);
            for host in &picked {
                assert!(!exclude.contains(&host.public_key));
            }
        }

        // Sampling must not disturb the stored weights
        assert_eq!(tree.total_weight(), Currency::from(1000));
    }

    #[test]
    fn duplicate_exclusion_keys_are_harmless() {
        let mut tree = filled_tree(4);
        let exclude =
            vec![HostPublicKey([0; 32]), HostPublicKey([0; 32]), HostPublicKey([1; 32])];

        let picked = tree.random_hosts(4, &exclude);
        assert_eq!(picked.len(), 2);
        assert_eq!(tree.total_weight(), Currency::from(400));
    }

    #[test]
    fn sampling_is_without_replacement() {
        let mut tree = filled_tree(8);

        let picked = tree.random_hosts(8, &[]);
        assert_eq!(picked.len(), 8);
        let mut keys: Vec<_> = picked.iter().map(|h| h.public_key).collect();
        keys.sort_by_key(|k| k.0);
        keys.dedup();
        assert_eq!(keys.len(), 8);

        // Asking for more than exists returns everything eligible
        assert_eq!(tree.random_hosts(50, &[]).len(), 8);
        let exclude: Vec<_> = (0..8).map(|id| HostPublicKey([id; 32])).collect();
        assert!(tree.random_hosts(3, &exclude).is_empty());
    }

    #[test]
    fn sampling_follows_weights() {
        let mut tree = HostTree::new();
        tree.insert(entry(0), Currency::from(200));
        tree.insert(entry(1), Currency::from(100));

        let mut heavy = 0usize;
        let trials = 30000;
        for _ in 0..trials {
            let picked = tree.random_hosts(1, &[]);
            if picked[0].public_key == HostPublicKey([0; 32]) {
                heavy += 1;
            }
        }

        // The 2x weighted host should win about twice as often
        let ratio = heavy as f64 / (trials - heavy) as f64;
        assert!(ratio > 1.8 && ratio < 2.2, "sampling ratio {} outside tolerance", ratio);
    }

    #[test]
    fn growth_keeps_sums_consistent() {
        let mut tree = HostTree::new();
        let mut expected = 0u64;
        for id in 0..100u8 {
            tree.insert(entry(id), Currency::from(id as u64 + 1));
            expected += id as u64 + 1;
        }
        assert_eq!(tree.total_weight(), Currency::from(expected));
        assert_eq!(tree.len(), 100);
    }
}
