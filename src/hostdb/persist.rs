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
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use darkfi_serial::{
    deserialize, deserialize_partial, serialize, SerialDecodable, SerialEncodable,
};

use super::HostEntry;
use crate::{
    chain::ConsensusChangeId,
    util::file::{load_file, save_file},
    Error, Result,
};

/// Schema name written at the top of every hostdb file.
const PERSIST_HEADER: &str = "HostDb Persistence";

/// Schema version. Bump on any layout change, old files are rejected.
const PERSIST_VERSION: &str = "0.1.0";

/// Snapshot of the full host set and the consensus checkpoint, the
/// unit of persistence.
#[derive(Debug, Clone, SerialEncodable, SerialDecodable)]
pub struct HostDbSnapshot {
    pub block_height: u32,
    pub last_change: ConsensusChangeId,
    pub hosts: Vec<HostEntry>,
}

/// File-backed snapshot store. One versioned file per installation.
pub struct HostStore {
    path: PathBuf,
}

impl HostStore {
    /// Open a store at the given path, creating missing parent
    /// directories. An unpreparable path is a construction-time error.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path: path.to_path_buf() })
    }

    /// Write a snapshot. The data may still sit in OS buffers when this
    /// returns.
    pub fn save(&self, snapshot: &HostDbSnapshot) -> Result<()> {
        save_file(&self.path, &encode_snapshot(snapshot))
    }

    /// Write a snapshot and block until it is confirmed on disk. Called
    /// before controlled shutdown.
    pub fn save_durable(&self, snapshot: &HostDbSnapshot) -> Result<()> {
        let mut file = File::create(&self.path)?;
        file.write_all(&encode_snapshot(snapshot))?;
        file.sync_all()?;
        Ok(())
    }

    /// Load the stored snapshot. `None` if no file exists yet. A file
    /// with an unknown header or version is a fatal error, not a fresh
    /// start, so an operator downgrade cannot silently wipe the host
    /// set.
    pub fn load(&self) -> Result<Option<HostDbSnapshot>> {
        if !self.path.exists() {
            return Ok(None)
        }
        let data = load_file(&self.path)?;

        let (header, mut consumed) = deserialize_partial::<String>(&data)?;
        if header != PERSIST_HEADER {
            return Err(Error::PersistHeaderMismatch(header))
        }

        let (version, n) = deserialize_partial::<String>(&data[consumed..])?;
        consumed += n;
        if version != PERSIST_VERSION {
            return Err(Error::PersistVersionMismatch(version))
        }

        let snapshot = deserialize::<HostDbSnapshot>(&data[consumed..])?;
        Ok(Some(snapshot))
    }
}

fn encode_snapshot(snapshot: &HostDbSnapshot) -> Vec<u8> {
    let mut data = serialize(&PERSIST_HEADER.to_string());
    data.extend_from_slice(&serialize(&PERSIST_VERSION.to_string()));
    data.extend_from_slice(&serialize(snapshot));
    data
}

#[cfg(test)]
mod tests {
    use rand::{rngs::OsRng, Rng};
    use url::Url;

    use super::*;
    use crate::chain::HostPublicKey;

    fn tmp_store(name: &str) -> HostStore {
        let file = format!("hostdb_{}_{}.dat", name, OsRng.gen::<u32>());
        HostStore::open(&std::env::temp_dir().join(file)).unwrap()
    }

    fn snapshot() -> HostDbSnapshot {
        let mut hosts = vec![];
        for id in 0..3u8 {
            let mut entry = HostEntry::new(
                HostPublicKey([id; 32]),
                Url::parse(&format!("tcp://host{}.example.com:7777", id)).unwrap(),
                40 + id as u32,
            );
            entry.version = "0.4.1".to_string();
            entry.remaining_storage = 1000 * id as u64;
            hosts.push(entry);
        }
        HostDbSnapshot { block_height: 42, last_change: ConsensusChangeId([9u8; 32]), hosts }
    }

    #[test]
    fn save_load_roundtrip() {
        let store = tmp_store("roundtrip");
        let original = snapshot();

        store.save(&original).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.block_height, original.block_height);
        assert_eq!(loaded.last_change, original.last_change);
        assert_eq!(loaded.hosts.len(), original.hosts.len());
        for (a, b) in loaded.hosts.iter().zip(original.hosts.iter()) {
            assert_eq!(a.public_key, b.public_key);
            assert_eq!(a.net_address, b.net_address);
            assert_eq!(a.first_seen, b.first_seen);
            assert_eq!(a.remaining_storage, b.remaining_storage);
        }
    }

    #[test]
    fn durable_save_load_roundtrip() {
        let store = tmp_store("durable");
        let original = snapshot();

        store.save_durable(&original).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.last_change, original.last_change);
    }

    #[test]
    fn missing_file_is_a_fresh_start() {
        let store = tmp_store("missing");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn foreign_header_is_fatal() {
        let store = tmp_store("header");
        let mut data = serialize(&"Wallet Persistence".to_string());
        data.extend_from_slice(&serialize(&PERSIST_VERSION.to_string()));
        crate::util::file::save_file(store.path.as_path(), &data).unwrap();

        assert!(matches!(store.load(), Err(Error::PersistHeaderMismatch(_))));
    }

    #[test]
    fn unknown_version_is_fatal() {
        let store = tmp_store("version");
        let mut data = serialize(&PERSIST_HEADER.to_string());
        data.extend_from_slice(&serialize(&"9.9.9".to_string()));
        data.extend_from_slice(&serialize(&snapshot()));
        crate::util::file::save_file(store.path.as_path(), &data).unwrap();

        assert!(matches!(store.load(), Err(Error::PersistVersionMismatch(_))));
    }
}
