// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory virtual filesystem
//!
//! Trees live in a caller-owned [`Registry`], keyed by context id and
//! filesystem identity. [`MemoryFileSystem`] instances are cheap views onto
//! one tree, each with its own working directory and acting user.

pub mod config;
pub mod copy;
pub mod error;
pub mod fs;
pub mod namespace;
pub mod path;
pub mod permission;
pub mod stream;
pub mod types;
pub mod vfs;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod test_permissions;

#[cfg(test)]
mod test_streams;

pub use config::{
    CONFIG_IMPL_CLASS_KEY, CONTEXT_KEY, Configuration, FS_DEFAULT_NAME_KEY, IMPL_CLASS_NAME,
};
pub use copy::{copy, create_file};
pub use error::{FsError, FsResult};
pub use fs::FileSystem;
pub use namespace::{Namespace, Node, NodeId, NodeKind, Registry};
pub use path::FsPath;
pub use permission::UserIdentity;
pub use stream::{InputStream, MemoryInputStream, MemoryOutputStream, OutputStream};
pub use types::{
    CreateOptions, DEFAULT_GROUP, DEFAULT_PERMISSION, DEFAULT_SCHEME, DEFAULT_USER, FileStatus,
    FsAction, FsPermission,
};
pub use vfs::MemoryFileSystem;
