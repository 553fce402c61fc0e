// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for the in-memory filesystem

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path::FsPath;

/// The permission used when none is specified
pub const DEFAULT_PERMISSION: u16 = 0o777;

/// The default user of the file system
pub const DEFAULT_USER: &str = "root";

/// The default group of files and directories, and the default user's only group
pub const DEFAULT_GROUP: &str = "root";

/// The scheme served by default engine instances
pub const DEFAULT_SCHEME: &str = "file";

/// Action gated by the permission engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsAction {
    Read,
    Write,
    Execute,
}

impl FsAction {
    fn bit(self) -> u16 {
        match self {
            FsAction::Read => 0o4,
            FsAction::Write => 0o2,
            FsAction::Execute => 0o1,
        }
    }
}

/// Which triple of the permission bits applies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionClass {
    Owner,
    Group,
    Other,
}

impl PermissionClass {
    fn shift(self) -> u16 {
        match self {
            PermissionClass::Owner => 6,
            PermissionClass::Group => 3,
            PermissionClass::Other => 0,
        }
    }
}

/// Owner/group/other x read/write/execute permission bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsPermission(u16);

impl FsPermission {
    pub fn new(mode: u16) -> Self {
        Self(mode & 0o777)
    }

    pub fn mode(&self) -> u16 {
        self.0
    }

    /// Whether the bits of `class` imply `action`
    pub fn allows(&self, class: PermissionClass, action: FsAction) -> bool {
        (self.0 >> class.shift()) & action.bit() != 0
    }

    /// `None` means "use the default", never "no permissions"
    pub fn or_default(permission: Option<FsPermission>) -> FsPermission {
        permission.unwrap_or_default()
    }
}

impl Default for FsPermission {
    fn default() -> Self {
        Self(DEFAULT_PERMISSION)
    }
}

impl From<u16> for FsPermission {
    fn from(mode: u16) -> Self {
        Self::new(mode)
    }
}

impl fmt::Display for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in [
            PermissionClass::Owner,
            PermissionClass::Group,
            PermissionClass::Other,
        ] {
            for (action, ch) in [
                (FsAction::Read, 'r'),
                (FsAction::Write, 'w'),
                (FsAction::Execute, 'x'),
            ] {
                let c = if self.allows(class, action) { ch } else { '-' };
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FsPermission({:o})", self.0)
    }
}

/// Status of a single path, as returned by `get_file_status` and `list_status`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStatus {
    pub path: FsPath,
    pub len: u64,
    pub is_dir: bool,
    pub permission: FsPermission,
    pub owner: String,
    pub group: String,
}

impl FileStatus {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }
}

/// File creation options
#[derive(Clone, Debug)]
pub struct CreateOptions {
    /// Permission of the new file and of any ancestor created on the way
    pub permission: Option<FsPermission>,
    /// Replace an existing file instead of failing
    pub overwrite: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            permission: None,
            overwrite: true,
        }
    }
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permission(mut self, permission: FsPermission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}
