// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory filesystem engine
//!
//! A [`MemoryFileSystem`] is a view onto one namespace of a [`Registry`]:
//! the context id comes from its configuration and the filesystem identity
//! from its URI. Instances sharing both see the same tree. The working
//! directory and the acting user are per instance.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, trace};
use url::Url;

use crate::config::Configuration;
use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::namespace::{Namespace, Node, NodeId, Registry};
use crate::path::FsPath;
use crate::permission::{UserIdentity, check_permission};
use crate::stream::{InputStream, MemoryInputStream, MemoryOutputStream, NodeRef, OutputStream};
use crate::types::{CreateOptions, DEFAULT_SCHEME, FileStatus, FsAction, FsPermission};

/// One engine instance
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    registry: Arc<Registry>,
    conf: Configuration,
    uri: Url,
    identity: UserIdentity,
    working_dir: FsPath,
}

fn fs_uri(scheme: &str) -> FsResult<Url> {
    Url::parse(&format!("{scheme}:///"))
        .map_err(|e| FsError::invalid_argument(format!("invalid scheme '{scheme}': {e}")))
}

impl MemoryFileSystem {
    /// Instance serving the default `file` scheme
    pub fn new(registry: Arc<Registry>, conf: Configuration) -> FsResult<Self> {
        Self::with_scheme(registry, conf, DEFAULT_SCHEME)
    }

    /// Instance serving `scheme`; each scheme owns a separate tree per context
    pub fn with_scheme(
        registry: Arc<Registry>,
        conf: Configuration,
        scheme: &str,
    ) -> FsResult<Self> {
        Ok(Self {
            registry,
            conf,
            uri: fs_uri(scheme)?,
            identity: UserIdentity::default(),
            working_dir: FsPath::root(),
        })
    }

    /// Configure `conf` for the in-memory filesystem, then build an instance on it
    pub fn get(registry: &Arc<Registry>, conf: &mut Configuration) -> FsResult<Self> {
        registry.configure(conf);
        Self::new(Arc::clone(registry), conf.clone())
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn conf(&self) -> &Configuration {
        &self.conf
    }

    pub fn set_conf(&mut self, conf: Configuration) {
        self.conf = conf;
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn with_namespace<R>(&self, f: impl FnOnce(&mut Namespace) -> FsResult<R>) -> FsResult<R> {
        let context = self.conf.require_context()?;
        self.registry.with_namespace(context, &self.uri, f)
    }

    fn node_ref(&self, ns: &Namespace, node: NodeId, path: &FsPath) -> FsResult<NodeRef> {
        Ok(NodeRef {
            registry: Arc::clone(&self.registry),
            context: self.conf.require_context()?.to_string(),
            fs: self.uri.clone(),
            epoch: ns.epoch(),
            node,
            path: path.clone(),
        })
    }

    /// Resolve `path` against the working directory
    pub fn make_absolute(&self, path: &FsPath) -> FsPath {
        self.working_dir.resolve(path)
    }

    /// Absolute form of `path`, rejecting paths of another filesystem
    fn qualify(&self, path: &FsPath) -> FsResult<FsPath> {
        self.check_scheme(path)?;
        Ok(self.make_absolute(path))
    }

    fn check_scheme(&self, path: &FsPath) -> FsResult<()> {
        match path.scheme() {
            Some(scheme) if scheme != self.uri.scheme() => Err(FsError::invalid_argument(format!(
                "Wrong file system: {scheme}, expected: {}",
                self.uri.scheme()
            ))),
            _ => Ok(()),
        }
    }

    /// Write access to the closest existing ancestor of `path`
    fn check_parent_write(&self, ns: &Namespace, path: &FsPath) -> FsResult<()> {
        let mut current = path.parent();
        while let Some(parent) = current {
            if let Some(node) = ns.get(&parent) {
                if !node.is_dir() {
                    return Err(FsError::NotADirectory(parent.to_string()));
                }
                return check_permission(node, &self.identity, FsAction::Write);
            }
            current = parent.parent();
        }
        Ok(())
    }

    /// Create `path` and every missing ancestor as directories owned by the acting user
    fn materialize_dirs(
        &self,
        ns: &mut Namespace,
        path: &FsPath,
        permission: FsPermission,
    ) -> FsResult<()> {
        let mut missing = Vec::new();
        let mut current = Some(path.clone());
        while let Some(p) = current {
            if ns.contains(&p) {
                break;
            }
            current = p.parent();
            missing.push(p);
        }
        for dir in missing.iter().rev() {
            ns.insert(dir, Node::directory(dir.name(), permission, &self.identity.user))?;
            trace!(path = %dir, "directory created");
        }
        Ok(())
    }

    fn status(ns: &Namespace, id: NodeId) -> FsResult<FileStatus> {
        let node = ns.node(id).ok_or_else(|| FsError::not_found(format!("node {}", id.as_u64())))?;
        let path = ns.path_of(id).ok_or_else(|| FsError::not_found(node.name()))?;
        Ok(FileStatus {
            path,
            len: node.len(),
            is_dir: node.is_dir(),
            permission: node.permission,
            owner: node.owner.clone(),
            group: node.group.clone(),
        })
    }

    /// Create (or overwrite) a file with default options and open it for writing
    pub fn create(&self, path: &FsPath) -> FsResult<MemoryOutputStream> {
        self.create_with(path, &CreateOptions::default())
    }

    pub fn create_with(
        &self,
        path: &FsPath,
        options: &CreateOptions,
    ) -> FsResult<MemoryOutputStream> {
        let path = self.qualify(path)?;
        let permission = FsPermission::or_default(options.permission);

        let node = self.with_namespace(|ns| {
            self.check_parent_write(ns, &path)?;
            if let Some(existing) = ns.get(&path) {
                if existing.is_dir() {
                    return Err(FsError::AlreadyExists(format!(
                        "Can't overwrite a directory with a file: {path}"
                    )));
                }
                if !options.overwrite {
                    return Err(FsError::AlreadyExists(format!("File already exists: {path}")));
                }
                if existing.is_open() {
                    return Err(FsError::already_open(&path));
                }
            }

            let parent = path.parent().ok_or_else(|| {
                FsError::invalid_argument(format!("cannot create a file at '{path}'"))
            })?;
            self.materialize_dirs(ns, &parent, permission)?;

            let mut file = Node::file(path.name(), permission, &self.identity.user);
            file.claim();
            let id = ns.insert(&path, file)?;
            self.node_ref(ns, id, &path)
        })?;

        debug!(%path, mode = %permission, overwrite = options.overwrite, "file created");
        Ok(MemoryOutputStream::new(node, Vec::new()))
    }

    /// Open a file for reading; the stream sees the content as of this call
    pub fn open(&self, path: &FsPath) -> FsResult<MemoryInputStream> {
        let path = self.qualify(path)?;

        let (node, snapshot) = self.with_namespace(|ns| {
            let id = ns.lookup(&path).ok_or_else(|| FsError::not_found(&path))?;
            let node = ns.node_mut(id).ok_or_else(|| FsError::not_found(&path))?;
            let snapshot = node
                .bytes()
                .ok_or_else(|| FsError::NotAFile(path.to_string()))?
                .to_vec();
            check_permission(node, &self.identity, FsAction::Read)?;
            if !node.claim() {
                return Err(FsError::already_open(&path));
            }
            Ok((self.node_ref(ns, id, &path)?, snapshot))
        })?;

        trace!(%path, len = snapshot.len(), "file opened for reading");
        Ok(MemoryInputStream::new(node, snapshot))
    }

    /// Open an existing file for writing at its end
    pub fn append(&self, path: &FsPath) -> FsResult<MemoryOutputStream> {
        let path = self.qualify(path)?;

        let (node, seed) = self.with_namespace(|ns| {
            let id = ns.lookup(&path).ok_or_else(|| FsError::not_found(&path))?;
            let node = ns.node_mut(id).ok_or_else(|| FsError::not_found(&path))?;
            let seed = node
                .bytes()
                .ok_or_else(|| FsError::NotAFile(path.to_string()))?
                .to_vec();
            check_permission(node, &self.identity, FsAction::Write)?;
            if !node.claim() {
                return Err(FsError::already_open(&path));
            }
            Ok((self.node_ref(ns, id, &path)?, seed))
        })?;

        debug!(%path, len = seed.len(), "file opened for append");
        Ok(MemoryOutputStream::new(node, seed))
    }

    /// Remove a file or directory.
    ///
    /// A non-recursive delete refuses directories that hold sub-directories;
    /// files directly inside are removed with the directory. A recursive
    /// delete that meets an open file stops there and leaves whatever it has
    /// already removed deleted.
    pub fn delete(&self, path: &FsPath, recursive: bool) -> FsResult<bool> {
        let path = self.qualify(path)?;

        self.with_namespace(|ns| {
            let id = ns.lookup(&path).ok_or_else(|| FsError::not_found(&path))?;
            if id == ns.root_id() {
                return Err(FsError::invalid_argument("cannot delete the root directory"));
            }
            let node = ns.node(id).ok_or_else(|| FsError::not_found(&path))?;
            check_permission(node, &self.identity, FsAction::Write)?;

            if node.is_dir() {
                if recursive {
                    self.delete_tree(ns, id)?;
                } else {
                    let (dirs, files) = ns.children(id);
                    if !dirs.is_empty() {
                        return Err(FsError::DirectoryNotEmpty(path.to_string()));
                    }
                    for file in files {
                        if ns.node(file).is_some_and(Node::is_open) {
                            let file_path = ns.path_of(file).unwrap_or_else(|| path.clone());
                            return Err(FsError::busy(file_path));
                        }
                    }
                    ns.remove_id(id);
                }
            } else {
                if node.is_open() {
                    return Err(FsError::busy(&path));
                }
                ns.remove_id(id);
            }
            Ok(())
        })?;

        debug!(%path, recursive, "deleted");
        Ok(true)
    }

    /// Depth first: sub-directories, then files, then the directory itself
    fn delete_tree(&self, ns: &mut Namespace, id: NodeId) -> FsResult<()> {
        let (dirs, files) = ns.children(id);
        for dir in dirs {
            if let Some(node) = ns.node(dir) {
                check_permission(node, &self.identity, FsAction::Write)?;
            }
            self.delete_tree(ns, dir)?;
        }
        for file in files {
            if ns.node(file).is_some_and(Node::is_open) {
                let file_path = ns.path_of(file).unwrap_or_else(FsPath::root);
                return Err(FsError::busy(file_path));
            }
            ns.remove_id(file);
        }
        ns.remove_id(id);
        Ok(())
    }

    /// Move `src` to `dst`, creating missing parents of `dst`. Directories
    /// move with their whole subtree; open streams follow the file.
    pub fn rename(&self, src: &FsPath, dst: &FsPath) -> FsResult<bool> {
        let src = self.qualify(src)?;
        let dst = self.qualify(dst)?;

        self.with_namespace(|ns| {
            if ns.contains(&dst) {
                return Err(FsError::AlreadyExists(format!(
                    "Rename failed, destination already exists: {dst}"
                )));
            }
            let id = ns.lookup(&src).ok_or_else(|| FsError::not_found(&src))?;
            if id == ns.root_id() {
                return Err(FsError::invalid_argument("cannot move the root directory"));
            }
            // Checked before any parent of `dst` is created.
            if dst.starts_with(&src) {
                return Err(FsError::invalid_argument("cannot move a directory beneath itself"));
            }
            let node = ns.node(id).ok_or_else(|| FsError::not_found(&src))?;
            check_permission(node, &self.identity, FsAction::Write)?;
            self.check_parent_write(ns, &dst)?;

            let parent = dst
                .parent()
                .ok_or_else(|| FsError::invalid_argument(format!("cannot rename onto '{dst}'")))?;
            self.materialize_dirs(ns, &parent, FsPermission::default())?;
            let parent_id = ns.lookup(&parent).ok_or_else(|| FsError::not_found(&parent))?;
            ns.move_node(id, parent_id, dst.name())
        })?;

        debug!(%src, %dst, "renamed");
        Ok(true)
    }

    /// Create a directory and any missing ancestors. Succeeds without
    /// change when anything already exists at `path`.
    pub fn mkdirs(&self, path: &FsPath, permission: Option<FsPermission>) -> FsResult<bool> {
        let path = self.qualify(path)?;
        let permission = FsPermission::or_default(permission);

        let created = self.with_namespace(|ns| {
            if ns.contains(&path) {
                return Ok(false);
            }
            self.check_parent_write(ns, &path)?;
            self.materialize_dirs(ns, &path, permission)?;
            Ok(true)
        })?;

        if created {
            debug!(%path, mode = %permission, "directories created");
        }
        Ok(true)
    }

    /// Status of `path` itself for a file, of each child for a directory
    /// (directories first, then files, each by name)
    pub fn list_status(&self, path: &FsPath) -> FsResult<Vec<FileStatus>> {
        let path = self.qualify(path)?;

        self.with_namespace(|ns| {
            let id = ns.lookup(&path).ok_or_else(|| FsError::not_found(&path))?;
            let node = ns.node(id).ok_or_else(|| FsError::not_found(&path))?;
            check_permission(node, &self.identity, FsAction::Read)?;
            if node.is_file() {
                return Ok(vec![Self::status(ns, id)?]);
            }
            let (dirs, files) = ns.children(id);
            dirs.into_iter()
                .chain(files)
                .map(|child| Self::status(ns, child))
                .collect()
        })
    }

    pub fn get_file_status(&self, path: &FsPath) -> FsResult<FileStatus> {
        let path = self.qualify(path)?;
        self.with_namespace(|ns| {
            let id = ns.lookup(&path).ok_or_else(|| FsError::not_found(&path))?;
            Self::status(ns, id)
        })
    }

    pub fn exists(&self, path: &FsPath) -> FsResult<bool> {
        let path = self.qualify(path)?;
        self.with_namespace(|ns| Ok(ns.contains(&path)))
    }

    /// Rewrite owner and group. Any user may do this.
    pub fn set_owner(&self, path: &FsPath, user: &str, group: &str) -> FsResult<()> {
        if user.is_empty() || group.is_empty() {
            return Err(FsError::invalid_argument("owner and group must not be empty"));
        }
        let path = self.qualify(path)?;

        self.with_namespace(|ns| {
            let node = ns.get_mut(&path).ok_or_else(|| FsError::not_found(&path))?;
            node.owner = user.to_string();
            node.group = group.to_string();
            Ok(())
        })?;

        debug!(%path, %user, %group, "owner changed");
        Ok(())
    }

    pub fn working_directory(&self) -> &FsPath {
        &self.working_dir
    }

    /// Change the base for relative paths; the target must be an existing directory
    pub fn set_working_directory(&mut self, path: &FsPath) -> FsResult<()> {
        let path = self.qualify(path)?;

        self.with_namespace(|ns| match ns.get(&path) {
            None => Err(FsError::invalid_argument(format!("'{path}' not found!"))),
            Some(node) if node.is_file() => {
                Err(FsError::invalid_argument(format!("'{path}' is not a directory!")))
            }
            Some(_) => Ok(()),
        })?;

        trace!(%path, "working directory changed");
        self.working_dir = path.without_scheme();
        Ok(())
    }

    /// Act as `user`. A non-empty `groups` replaces the memberships.
    pub fn set_user<I, S>(&mut self, user: &str, groups: I) -> FsResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity.switch(user, groups)?;
        debug!(user = %self.identity.user, groups = ?self.identity.groups, "acting user changed");
        Ok(())
    }

    pub fn user(&self) -> &str {
        &self.identity.user
    }

    pub fn user_groups(&self) -> &BTreeSet<String> {
        &self.identity.groups
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }
}

impl FileSystem for MemoryFileSystem {
    fn uri(&self) -> Url {
        self.uri.clone()
    }

    fn create(&self, path: &FsPath, options: &CreateOptions) -> FsResult<Box<dyn OutputStream>> {
        Ok(Box::new(self.create_with(path, options)?))
    }

    fn open(&self, path: &FsPath) -> FsResult<Box<dyn InputStream>> {
        Ok(Box::new(MemoryFileSystem::open(self, path)?))
    }

    fn append(&self, path: &FsPath) -> FsResult<Box<dyn OutputStream>> {
        Ok(Box::new(MemoryFileSystem::append(self, path)?))
    }

    fn delete(&self, path: &FsPath, recursive: bool) -> FsResult<bool> {
        MemoryFileSystem::delete(self, path, recursive)
    }

    fn rename(&self, src: &FsPath, dst: &FsPath) -> FsResult<bool> {
        MemoryFileSystem::rename(self, src, dst)
    }

    fn mkdirs(&self, path: &FsPath, permission: Option<FsPermission>) -> FsResult<bool> {
        MemoryFileSystem::mkdirs(self, path, permission)
    }

    fn list_status(&self, path: &FsPath) -> FsResult<Vec<FileStatus>> {
        MemoryFileSystem::list_status(self, path)
    }

    fn get_file_status(&self, path: &FsPath) -> FsResult<FileStatus> {
        MemoryFileSystem::get_file_status(self, path)
    }

    fn exists(&self, path: &FsPath) -> FsResult<bool> {
        MemoryFileSystem::exists(self, path)
    }

    fn set_owner(&self, path: &FsPath, user: &str, group: &str) -> FsResult<()> {
        MemoryFileSystem::set_owner(self, path, user, group)
    }

    fn working_directory(&self) -> FsPath {
        self.working_dir.clone()
    }

    fn set_working_directory(&mut self, path: &FsPath) -> FsResult<()> {
        MemoryFileSystem::set_working_directory(self, path)
    }

    fn set_user(&mut self, user: &str, groups: &[String]) -> FsResult<()> {
        MemoryFileSystem::set_user(self, user, groups)
    }

    fn user(&self) -> String {
        self.identity.user.clone()
    }

    fn user_groups(&self) -> BTreeSet<String> {
        self.identity.groups.clone()
    }
}
