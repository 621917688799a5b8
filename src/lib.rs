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

//! Storage host discovery and reputation engine.
//!
//! Ingests a blockchain's transaction stream to discover storage-host
//! announcements, probes known hosts to measure liveness and terms,
//! and maintains a weighted index so the contract layer can sample
//! good hosts efficiently and fairly.

/// Consensus boundary types and the host announcement codec.
pub mod chain;

/// Fixed-point currency arithmetic used for prices and weights.
pub mod currency;

/// Error codes
pub mod error;
pub use error::{Error, Result};

/// The host database: registry, weighting, consensus sync, scanning
/// and persistence.
pub mod hostdb;

/// Async runtime primitives: stoppable tasks, pub-sub, timeouts.
pub mod system;

/// Utility functions
pub mod util;
