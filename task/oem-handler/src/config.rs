// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pcie_bifurcation::{DEFAULT_STATIC_CONFIG_PATH, MAIN_BOARD};
use serde::Deserialize;

/// Where the handler looks for its configuration if not told otherwise.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/oem-ipmi/handler.toml";

/// A `Config` represents a `handler.toml` file, e.g.
///
/// ```toml
/// [bifurcation]
/// source = "dynamic"
/// inventory = "/etc/oem-ipmi/inventory.json"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub bifurcation: BifurcationConfig,
}

/// Which bifurcation provider to build, chosen once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case", deny_unknown_fields)]
pub enum BifurcationConfig {
    /// Answers come from a JSON table on disk.
    Static {
        #[serde(default = "default_static_path")]
        path: PathBuf,
    },
    /// Answers come from walking an inventory graph, described by a JSON
    /// file.
    Dynamic {
        inventory: PathBuf,
        #[serde(rename = "main-board", default = "default_main_board")]
        main_board: String,
    },
}

impl Default for BifurcationConfig {
    fn default() -> Self {
        Self::Static {
            path: default_static_path(),
        }
    }
}

fn default_static_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATIC_CONFIG_PATH)
}

fn default_main_board() -> String {
    MAIN_BOARD.to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("can't read {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("can't parse {}", path.display()))
    }

    /// Like [`Config::from_file`], but a file that isn't there at all gives
    /// the default configuration.
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found; using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }
}
