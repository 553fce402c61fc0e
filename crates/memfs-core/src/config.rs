// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host configuration object
//!
//! The engine only stores and reads back these values; it never interprets
//! the default-filesystem or implementation-class keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FsError, FsResult};
use crate::types::DEFAULT_SCHEME;

/// Key holding the in-memory filesystem context id
pub const CONTEXT_KEY: &str = "memory.fs.context";

/// Key holding the default filesystem identity
pub const FS_DEFAULT_NAME_KEY: &str = "fs.default.name";

/// Key holding the implementation class used for host-side dispatch
pub const CONFIG_IMPL_CLASS_KEY: &str = "fs.file.impl";

/// Value stored under [`CONFIG_IMPL_CLASS_KEY`]
pub const IMPL_CLASS_NAME: &str = "memfs::MemoryFileSystem";

/// Identity of the default filesystem, `file:///`
pub fn default_fs_name() -> String {
    format!("{DEFAULT_SCHEME}:///")
}

/// Key that tells the host not to cache instances for `scheme`
pub fn disable_cache_key(scheme: &str) -> String {
    format!("fs.{scheme}.impl.disable.cache")
}

/// String key/value configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    entries: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat TOML table of string values
    pub fn from_toml_str(s: &str) -> FsResult<Self> {
        toml::from_str(s).map_err(|e| FsError::invalid_argument(format!("bad configuration: {e}")))
    }

    pub fn to_toml_string(&self) -> FsResult<String> {
        toml::to_string(self)
            .map_err(|e| FsError::invalid_argument(format!("unserialisable configuration: {e}")))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The context id, if this configuration has been set up
    pub fn context(&self) -> Option<&str> {
        self.get(CONTEXT_KEY)
    }

    /// The context id, or `IllegalState` when the configuration was never set up
    pub fn require_context(&self) -> FsResult<&str> {
        self.context().ok_or_else(|| {
            FsError::illegal_state(
                "The filesystem has not been properly configured! \
                 The configuration has no in-memory file system context.",
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
