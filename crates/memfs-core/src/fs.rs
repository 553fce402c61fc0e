// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host-facing filesystem contract

use std::collections::BTreeSet;

use url::Url;

use crate::error::FsResult;
use crate::path::FsPath;
use crate::stream::{InputStream, OutputStream};
use crate::types::{CreateOptions, FileStatus, FsPermission};

/// Operation set a host framework dispatches to.
///
/// Relative paths resolve against the instance's working directory.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// Identity of this filesystem, e.g. `file:///`
    fn uri(&self) -> Url;

    fn create(&self, path: &FsPath, options: &CreateOptions) -> FsResult<Box<dyn OutputStream>>;

    fn open(&self, path: &FsPath) -> FsResult<Box<dyn InputStream>>;

    fn append(&self, path: &FsPath) -> FsResult<Box<dyn OutputStream>>;

    fn delete(&self, path: &FsPath, recursive: bool) -> FsResult<bool>;

    fn rename(&self, src: &FsPath, dst: &FsPath) -> FsResult<bool>;

    fn mkdirs(&self, path: &FsPath, permission: Option<FsPermission>) -> FsResult<bool>;

    fn list_status(&self, path: &FsPath) -> FsResult<Vec<FileStatus>>;

    fn get_file_status(&self, path: &FsPath) -> FsResult<FileStatus>;

    fn exists(&self, path: &FsPath) -> FsResult<bool>;

    fn set_owner(&self, path: &FsPath, user: &str, group: &str) -> FsResult<()>;

    fn working_directory(&self) -> FsPath;

    fn set_working_directory(&mut self, path: &FsPath) -> FsResult<()>;

    /// Act as `user`; a non-empty `groups` replaces the memberships
    fn set_user(&mut self, user: &str, groups: &[String]) -> FsResult<()>;

    fn user(&self) -> String;

    fn user_groups(&self) -> BTreeSet<String>;
}
