// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bridge configuration.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Filename used when a caller gives none.
pub const DEFAULT_FILENAME: &str = "<evalsource>";

/// Where the `print` builtin writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintTarget {
    /// Standard output, one line per call
    #[default]
    Stdout,
    /// `tracing` info events
    Log,
    /// Kept in memory until [`crate::Bridge::take_output`]
    Buffer,
    /// Dropped
    Discard,
}

impl std::str::FromStr for PrintTarget {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "log" => Ok(Self::Log),
            "buffer" => Ok(Self::Buffer),
            "discard" | "none" => Ok(Self::Discard),
            other => Err(BridgeError::invalid_argument(format!(
                "unknown print target '{other}'"
            ))),
        }
    }
}

/// Configuration for a [`crate::Bridge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Global name of the host namespace object
    pub namespace: String,

    /// Name of the async host entry point on the namespace
    pub async_entry: String,

    /// Filename used when a caller gives none
    pub default_filename: String,

    /// Destination of `print`
    pub print: PrintTarget,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: "env".to_string(),
            async_entry: "callHostAsync".to_string(),
            default_filename: DEFAULT_FILENAME.to_string(),
            print: PrintTarget::Stdout,
        }
    }
}

impl BridgeConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| BridgeError::Config {
            path: PathBuf::from("<inline>"),
            reason: err.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|err| BridgeError::Config {
            path: path.to_path_buf(),
            reason: err.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `QJSBRIDGE_*` environment variables.
    pub fn load_from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(namespace) = lookup("QJSBRIDGE_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(entry) = lookup("QJSBRIDGE_ASYNC_ENTRY") {
            self.async_entry = entry;
        }
        if let Some(filename) = lookup("QJSBRIDGE_DEFAULT_FILENAME") {
            self.default_filename = filename;
        }
        if let Some(print) = lookup("QJSBRIDGE_PRINT") {
            self.print = print.parse()?;
        }
        self.validate()
    }

    /// Reject names the bridge cannot install.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(BridgeError::invalid_argument("namespace must not be empty"));
        }
        if self.async_entry.is_empty() {
            return Err(BridgeError::invalid_argument(
                "async entry name must not be empty",
            ));
        }
        if self.namespace == self.async_entry {
            return Err(BridgeError::invalid_argument(
                "namespace and async entry must have different names",
            ));
        }
        Ok(())
    }
}
