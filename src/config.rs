// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Engine configuration, read from a YAML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors reading or parsing a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// How effect instances relate to channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendTopology {
    /// One shared instance per effect type; channels sum into it weighted
    /// by their send depths. The cheaper option and the default.
    #[default]
    Shared,
    /// Every channel owns its own chorus/echo/reverb chain.
    PerChannel,
}

/// Top level synthesizer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SynthConfig {
    /// Root directory of the waveform sample store.
    pub sample_store: PathBuf,
    /// Effect send topology.
    pub send_topology: SendTopology,
    /// Initial master volume, 0.0 through 1.0.
    pub master_volume: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_store: PathBuf::from("Waveform"),
            send_topology: SendTopology::default(),
            master_volume: 1.0,
        }
    }
}

impl SynthConfig {
    /// Reads a config from a YAML file.
    pub fn load(path: &Path) -> Result<SynthConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&contents)?)
    }
}
