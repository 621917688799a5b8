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

use std::fmt;

use async_trait::async_trait;
use darkfi_serial::{
    deserialize, deserialize_partial, serialize, SerialDecodable, SerialEncodable,
};
use url::Url;

use crate::{system::Subscription, Error, Result};

/// Public key a storage host announces itself under. Immutable for the
/// lifetime of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerialEncodable, SerialDecodable)]
pub struct HostPublicKey(pub [u8; 32]);

impl fmt::Display for HostPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

/// Identifier of a consensus change set. The change identifier of the
/// last fully processed set is the resume checkpoint handed back to the
/// consensus subscription after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerialEncodable, SerialDecodable)]
pub struct ConsensusChangeId(pub [u8; 32]);

impl ConsensusChangeId {
    /// Checkpoint used before any change set has been processed.
    pub fn initial() -> Self {
        Self([0u8; 32])
    }
}

impl fmt::Display for ConsensusChangeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

/// Id the consensus layer assigns to the genesis block.
pub const GENESIS_BLOCK_ID: blake3::Hash = blake3::Hash::from_bytes([0u8; 32]);

/// A transaction as seen at this boundary. Only the auxiliary data
/// fields matter here, since host announcements ride in them. The
/// fields are opaque and may carry arbitrary third-party payloads.
#[derive(Debug, Clone, Default)]
pub struct ChainTransaction {
    pub aux_data: Vec<Vec<u8>>,
}

/// A block as delivered by the consensus subscription.
#[derive(Debug, Clone)]
pub struct ChainBlock {
    pub id: blake3::Hash,
    pub txs: Vec<ChainTransaction>,
}

impl ChainBlock {
    pub fn is_genesis(&self) -> bool {
        self.id == GENESIS_BLOCK_ID
    }
}

/// An ordered set of blockchain deltas. Reverted blocks are listed
/// oldest-to-newest, followed by applied blocks oldest-to-newest.
#[derive(Debug, Clone)]
pub struct ConsensusChange {
    pub id: ConsensusChangeId,
    pub reverted: Vec<ChainBlock>,
    pub applied: Vec<ChainBlock>,
}

/// Capability the consensus subsystem exposes to us.
#[async_trait]
pub trait ConsensusSet: Send + Sync {
    /// Subscribe to ordered change sets, resuming after the given
    /// checkpoint so no applied block is processed twice and none is
    /// skipped.
    async fn subscribe(&self, start: ConsensusChangeId) -> Result<Subscription<ConsensusChange>>;

    /// Whether the consensus set believes it is synced with the network.
    async fn synced(&self) -> bool;
}

/// Magic bytes prefacing a host announcement in transaction aux data.
pub const ANNOUNCEMENT_MAGIC: [u8; 8] = [0x68, 0x6f, 0x73, 0x74, 0x61, 0x6e, 0x6e, 0x63];

/// Encode a host announcement for embedding in a transaction's
/// auxiliary data.
pub fn encode_announcement(addr: &Url, public_key: &HostPublicKey) -> Vec<u8> {
    let mut payload = ANNOUNCEMENT_MAGIC.to_vec();
    payload.extend_from_slice(&serialize(addr));
    payload.extend_from_slice(&serialize(public_key));
    payload
}

/// Try to decode a host announcement from a transaction aux data field.
/// Fields carrying foreign or malformed payloads return an error, which
/// callers treat as "not an announcement" and skip.
pub fn decode_announcement(data: &[u8]) -> Result<(Url, HostPublicKey)> {
    if data.len() < ANNOUNCEMENT_MAGIC.len() || data[..ANNOUNCEMENT_MAGIC.len()] != ANNOUNCEMENT_MAGIC
    {
        return Err(Error::DecodeError("missing announcement magic"))
    }

    let payload = &data[ANNOUNCEMENT_MAGIC.len()..];
    let (addr, consumed) = deserialize_partial::<Url>(payload)?;
    let public_key = deserialize::<HostPublicKey>(&payload[consumed..])?;

    Ok((addr, public_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_roundtrip() {
        let addr = Url::parse("tcp://storage.dark.fi:7777").unwrap();
        let key = HostPublicKey([7u8; 32]);

        let payload = encode_announcement(&addr, &key);
        let (addr2, key2) = decode_announcement(&payload).unwrap();

        assert_eq!(addr, addr2);
        assert_eq!(key, key2);
    }

    #[test]
    fn announcement_rejects_foreign_data() {
        assert!(decode_announcement(b"").is_err());
        assert!(decode_announcement(b"hostann").is_err());
        assert!(decode_announcement(b"arbitrary third-party payload").is_err());

        // Truncated announcement
        let addr = Url::parse("tcp://storage.dark.fi:7777").unwrap();
        let payload = encode_announcement(&addr, &HostPublicKey([7u8; 32]));
        assert!(decode_announcement(&payload[..payload.len() - 5]).is_err());

        // Trailing garbage after a valid announcement
        let mut noisy = payload.clone();
        noisy.extend_from_slice(b"trailing");
        assert!(decode_announcement(&noisy).is_err());
    }
}
