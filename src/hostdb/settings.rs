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

use std::{path::PathBuf, sync::Arc};

/// Atomic pointer to hostdb settings
pub type HostDbSettingsPtr = Arc<HostDbSettings>;

/// Host database settings. The scope of this is one hostdb instance
/// configured by the library user. Deployment profiles are expressed
/// as presets rather than baked into the binary.
#[derive(Debug, Clone)]
pub struct HostDbSettings {
    /// Number of concurrent tasks probing hosts for their settings
    pub scanning_tasks: usize,
    /// Shortest pause between two periodic rescan cycles (in seconds)
    pub min_rescan_interval: u64,
    /// Longest pause between two periodic rescan cycles (in seconds)
    pub max_rescan_interval: u64,
    /// Number of hosts re-probed per rescan cycle
    pub checkup_quantity: usize,
    /// Deadline for a single settings fetch round trip (in seconds)
    pub scan_deadline: u64,
    /// Storage a host must offer before it stops accruing storage
    /// penalties (in bytes)
    pub required_storage: u64,
    /// Consecutive failed probes after which a host stops being
    /// reported as active
    pub max_scan_failures: u32,
    /// Allow localnet host addresses
    pub localnet: bool,
    /// Hostdb storage path
    pub db_path: PathBuf,
}

impl Default for HostDbSettings {
    fn default() -> Self {
        Self::production()
    }
}

impl HostDbSettings {
    /// Values for production deployments. The rescan interval is drawn
    /// uniformly from 80-240 minutes so that independent instances
    /// don't probe the same hosts in synchronized bursts.
    pub fn production() -> Self {
        Self {
            scanning_tasks: 25,
            min_rescan_interval: 4800,
            max_rescan_interval: 14400,
            checkup_quantity: 250,
            scan_deadline: 60,
            required_storage: 5_000_000_000,
            max_scan_failures: 3,
            localnet: false,
            db_path: PathBuf::from("hostdb.dat"),
        }
    }

    /// Values for local development networks.
    pub fn development() -> Self {
        Self {
            scanning_tasks: 6,
            min_rescan_interval: 60,
            max_rescan_interval: 300,
            checkup_quantity: 4,
            scan_deadline: 10,
            required_storage: 1_000_000,
            localnet: true,
            ..Self::production()
        }
    }

    /// Values for unit and integration tests.
    pub fn testing() -> Self {
        Self {
            scanning_tasks: 3,
            min_rescan_interval: 1,
            max_rescan_interval: 2,
            checkup_quantity: 5,
            scan_deadline: 5,
            required_storage: 1000,
            localnet: true,
            ..Self::production()
        }
    }
}
