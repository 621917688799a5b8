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

// Hello developer. Please add your error to the according subsection
// that is commented, or make a new subsection. Keep it clean.

/// Main result type used throughout the codebase.
pub type Result<T> = std::result::Result<T, Error>;

/// General library errors used throughout the codebase.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    // ==============
    // Parsing errors
    // ==============
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid host address: {0}")]
    InvalidHostAddress(String),

    // ===============
    // Encoding errors
    // ===============
    #[error("decode failed: {0}")]
    DecodeError(&'static str),

    // ======================
    // Network-related errors
    // ======================
    #[error("Connection failed")]
    ConnectFailed,

    #[error("Timeout Error")]
    TimeoutError,

    #[error("Host scan failed: {0}")]
    ScanFailed(String),

    // ==========================
    // Persistence-related errors
    // ==========================
    #[error("Unknown hostdb file header: {0}")]
    PersistHeaderMismatch(String),

    #[error("Unsupported hostdb file version: {0}")]
    PersistVersionMismatch(String),

    // ====================
    // Miscellaneous errors
    // ====================
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),

    #[error("Host database stopped")]
    HostDbStopped,

    #[error("smol::channel sender error: {0}")]
    ChannelSendError(String),

    #[error("smol::channel receiver error: {0}")]
    ChannelRecvError(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.kind())
    }
}
