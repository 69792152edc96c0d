// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::BifurcationProvider;

/// Where the platform image installs its bifurcation table.
pub const DEFAULT_STATIC_CONFIG_PATH: &str =
    "/usr/share/oem-ipmi/bifurcation.json";

/// Bifurcation table read from a JSON document of the form
///
/// ```json
/// { "/PE1": [8, 8], "/PE2": [4, 4, 12] }
/// ```
///
/// The file is re-read on every lookup, so it can be edited underneath a
/// running process.
#[derive(Clone, Debug)]
pub struct BifurcationStatic {
    path: PathBuf,
}

/// Reasons a static lookup can fail.
#[derive(Debug)]
pub enum StaticConfigError {
    /// The table couldn't be read at all.
    Open(std::io::Error),
    /// The table isn't valid JSON.
    Parse(serde_json::Error),
    /// The table has no entry for the requested name.
    MissingKey,
    /// The entry exists but isn't a list of bytes.
    InvalidValue(serde_json::Error),
}

impl fmt::Display for StaticConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(e) => write!(f, "can't open table: {e}"),
            Self::Parse(e) => write!(
                f,
                "can't parse table at line {} column {}: {e}",
                e.line(),
                e.column()
            ),
            Self::MissingKey => write!(f, "no entry for slot"),
            Self::InvalidValue(e) => write!(f, "bad lane list: {e}"),
        }
    }
}

impl std::error::Error for StaticConfigError {}

impl From<std::io::Error> for StaticConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Open(e)
    }
}

impl From<serde_json::Error> for StaticConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl Default for BifurcationStatic {
    fn default() -> Self {
        Self::new(DEFAULT_STATIC_CONFIG_PATH)
    }
}

impl BifurcationStatic {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up `name` in the table, reporting why it couldn't be found.
    pub fn lookup(&self, name: &str) -> Result<Vec<u8>, StaticConfigError> {
        let contents = std::fs::read(&self.path)?;
        let table: serde_json::Value = serde_json::from_slice(&contents)?;

        // A top-level value that isn't an object has no keys, which is the
        // same thing as not having ours.
        let entry = table.get(name).ok_or(StaticConfigError::MissingKey)?;

        Vec::<u8>::deserialize(entry).map_err(StaticConfigError::InvalidValue)
    }

    /// Looks up `name` in the table, logging (and discarding) the reason for
    /// any failure.
    pub fn get_bifurcation_by_name(&self, name: &str) -> Option<Vec<u8>> {
        match self.lookup(name) {
            Ok(lanes) => Some(lanes),
            Err(e @ StaticConfigError::MissingKey) => {
                log::debug!("{}: {name}: {e}", self.path.display());
                None
            }
            Err(e @ StaticConfigError::InvalidValue(_)) => {
                log::warn!("{}: {name}: {e}", self.path.display());
                None
            }
            Err(e) => {
                log::error!("{}: {e}", self.path.display());
                None
            }
        }
    }
}

impl BifurcationProvider for BifurcationStatic {
    /// Slots are keyed by the decimal rendering of their index.
    fn get_bifurcation(&self, index: u8) -> Option<Vec<u8>> {
        self.get_bifurcation_by_name(&index.to_string())
    }
}
