// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node model and the namespace registry
//!
//! Each (context, filesystem identity) pair owns one [`Namespace`]: an arena
//! of nodes addressed by [`NodeId`], linked into a tree through the
//! directories' name -> id maps. A node's absolute path is derived from its
//! parent chain, so moving a directory carries its whole subtree with it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};
use url::Url;

use crate::config::{
    CONFIG_IMPL_CLASS_KEY, CONTEXT_KEY, Configuration, FS_DEFAULT_NAME_KEY, IMPL_CLASS_NAME,
    default_fs_name, disable_cache_key,
};
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::types::{DEFAULT_GROUP, DEFAULT_SCHEME, DEFAULT_USER, FsPermission};

/// Arena index of a node within one namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Type-specific payload of a node
#[derive(Clone, Debug)]
pub enum NodeKind {
    Directory {
        children: BTreeMap<String, NodeId>,
    },
    File {
        bytes: Vec<u8>,
        /// At most one live stream per file
        open: bool,
    },
}

/// A file or directory entry
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) name: String,
    pub kind: NodeKind,
    pub permission: FsPermission,
    pub owner: String,
    pub group: String,
}

impl Node {
    fn new(name: String, kind: NodeKind, permission: FsPermission, owner: String) -> Self {
        Self {
            parent: None,
            name,
            kind,
            permission,
            owner,
            group: DEFAULT_GROUP.to_string(),
        }
    }

    pub fn directory(
        name: impl Into<String>,
        permission: FsPermission,
        owner: impl Into<String>,
    ) -> Self {
        Self::new(
            name.into(),
            NodeKind::Directory {
                children: BTreeMap::new(),
            },
            permission,
            owner.into(),
        )
    }

    pub fn file(
        name: impl Into<String>,
        permission: FsPermission,
        owner: impl Into<String>,
    ) -> Self {
        Self::new(
            name.into(),
            NodeKind::File {
                bytes: Vec::new(),
                open: false,
            },
            permission,
            owner.into(),
        )
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn is_open(&self) -> bool {
        matches!(self.kind, NodeKind::File { open: true, .. })
    }

    /// Byte length; 0 for directories
    pub fn len(&self) -> u64 {
        match &self.kind {
            NodeKind::File { bytes, .. } => bytes.len() as u64,
            NodeKind::Directory { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File content; `None` for directories
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::File { bytes, .. } => Some(bytes),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Take the file's single stream slot. Fails for directories and for
    /// files that already have a live stream.
    pub(crate) fn claim(&mut self) -> bool {
        match &mut self.kind {
            NodeKind::File { open, .. } if !*open => {
                *open = true;
                true
            }
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// One isolated directory tree
#[derive(Debug)]
pub struct Namespace {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_node_id: u64,
    /// Distinguishes a tree from its replacement after a context reset
    epoch: u64,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// A tree holding only the root directory (0777, root:root)
    pub fn new() -> Self {
        Self::with_epoch(0)
    }

    fn with_epoch(epoch: u64) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node::directory("", FsPermission::default(), DEFAULT_USER),
        );
        Self {
            nodes,
            root,
            next_node_id: 1,
            epoch,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Walk `path` from the root. Any missing component, or a file where a
    /// directory is needed, yields `None`.
    pub fn lookup(&self, path: &FsPath) -> Option<NodeId> {
        if !path.is_absolute() {
            return None;
        }
        let mut current = self.root;
        for component in path.components() {
            match &self.nodes.get(&current)?.kind {
                NodeKind::Directory { children } => current = *children.get(component)?,
                NodeKind::File { .. } => return None,
            }
        }
        Some(current)
    }

    pub fn get(&self, path: &FsPath) -> Option<&Node> {
        self.lookup(path).and_then(|id| self.nodes.get(&id))
    }

    pub fn get_mut(&mut self, path: &FsPath) -> Option<&mut Node> {
        let id = self.lookup(path)?;
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, path: &FsPath) -> bool {
        self.lookup(path).is_some()
    }

    /// Link `node` at `path`. The parent must already be a directory. An
    /// existing entry with the same name is dropped along with its subtree,
    /// unless a file in it has a live stream.
    pub fn insert(&mut self, path: &FsPath, mut node: Node) -> FsResult<NodeId> {
        let parent_path = path
            .parent()
            .ok_or_else(|| FsError::invalid_argument(format!("cannot replace '{path}'")))?;
        let parent_id = self.lookup(&parent_path).ok_or_else(|| FsError::not_found(&parent_path))?;
        let name = path.name().to_string();

        if let Some(existing) = self.child(parent_id, &name) {
            if let Some(open) = self.find_open(existing) {
                let open_path = self.path_of(open).unwrap_or_else(|| path.clone());
                return Err(FsError::already_open(open_path));
            }
            self.remove_id(existing);
        }

        let id = self.allocate_node_id();
        node.parent = Some(parent_id);
        node.name = name.clone();
        self.link(parent_id, name, id, &parent_path)?;
        self.nodes.insert(id, node);
        trace!(%path, id = id.0, "node inserted");
        Ok(id)
    }

    fn link(
        &mut self,
        parent_id: NodeId,
        name: String,
        id: NodeId,
        parent_path: &FsPath,
    ) -> FsResult<()> {
        let parent = self.nodes.get_mut(&parent_id).ok_or_else(|| FsError::not_found(parent_path))?;
        match &mut parent.kind {
            NodeKind::Directory { children } => {
                children.insert(name, id);
                Ok(())
            }
            NodeKind::File { .. } => Err(FsError::NotADirectory(parent_path.to_string())),
        }
    }

    fn unlink(&mut self, parent_id: NodeId, name: &str) {
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.nodes.get_mut(&parent_id)
        {
            children.remove(name);
        }
    }

    fn child(&self, parent_id: NodeId, name: &str) -> Option<NodeId> {
        match &self.nodes.get(&parent_id)?.kind {
            NodeKind::Directory { children } => children.get(name).copied(),
            NodeKind::File { .. } => None,
        }
    }

    /// Unlink `path` and drop its subtree. The root is never removed.
    pub fn remove(&mut self, path: &FsPath) -> Option<Node> {
        let id = self.lookup(path)?;
        if id == self.root {
            return None;
        }
        self.remove_id(id)
    }

    pub(crate) fn remove_id(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        if let Some(parent_id) = node.parent {
            self.unlink(parent_id, &node.name);
        }
        if let NodeKind::Directory { children } = &node.kind {
            let mut stack: Vec<NodeId> = children.values().copied().collect();
            while let Some(next) = stack.pop() {
                if let Some(Node {
                    kind: NodeKind::Directory { children },
                    ..
                }) = self.nodes.remove(&next)
                {
                    stack.extend(children.values().copied());
                }
            }
        }
        Some(node)
    }

    /// First file at or below `id` that has a live stream
    fn find_open(&self, id: NodeId) -> Option<NodeId> {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(node) = self.nodes.get(&next) else {
                continue;
            };
            match &node.kind {
                NodeKind::File { open: true, .. } => return Some(next),
                NodeKind::File { .. } => {}
                NodeKind::Directory { children } => stack.extend(children.values().copied()),
            }
        }
        None
    }

    /// Re-parent `id` under `new_parent` as `new_name`
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, new_name: &str) -> FsResult<()> {
        if id == self.root {
            return Err(FsError::invalid_argument("cannot move the root directory"));
        }
        if self.is_ancestor(id, new_parent) {
            return Err(FsError::invalid_argument(
                "cannot move a directory beneath itself",
            ));
        }
        if self.child(new_parent, new_name).is_some() {
            return Err(FsError::AlreadyExists(format!(
                "Rename failed, destination already exists: {new_name}"
            )));
        }

        let new_parent_path = self.path_of(new_parent).unwrap_or_else(FsPath::root);
        let (old_parent, old_name) = {
            let node = self
                .nodes
                .get(&id)
                .ok_or_else(|| FsError::not_found(format!("node {}", id.0)))?;
            (node.parent, node.name.clone())
        };

        self.link(new_parent, new_name.to_string(), id, &new_parent_path)?;
        if let Some(old_parent) = old_parent {
            self.unlink(old_parent, &old_name);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(new_parent);
            node.name = new_name.to_string();
        }
        Ok(())
    }

    /// Whether `ancestor` is `id` itself or one of its parents
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.nodes.get(&cur).and_then(|n| n.parent);
        }
        false
    }

    /// Absolute path of a live node
    pub fn path_of(&self, id: NodeId) -> Option<FsPath> {
        let mut names = Vec::new();
        let mut current = self.nodes.get(&id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.nodes.get(&parent)?;
        }
        let mut path = FsPath::root();
        for name in names.iter().rev() {
            path = path.child(name);
        }
        Some(path)
    }

    /// Child ids split into (directories, files), each in name order
    pub fn children(&self, id: NodeId) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.nodes.get(&id)
        {
            for child in children.values() {
                match self.nodes.get(child) {
                    Some(node) if node.is_dir() => dirs.push(*child),
                    Some(_) => files.push(*child),
                    None => {}
                }
            }
        }
        (dirs, files)
    }
}

type ContextMap = HashMap<String, HashMap<Url, Namespace>>;

/// Caller-owned registry of contexts.
///
/// Engines configured with the same context id and filesystem identity
/// share one [`Namespace`]. All access goes through a single lock; sharing
/// one context between threads is not supported beyond that serialisation.
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<ContextMap>,
    next_context: AtomicU64,
    next_epoch: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContextMap> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point `conf` at the in-memory filesystem and give it a fresh context.
    /// A configuration that already carries a context is left untouched.
    pub fn configure(&self, conf: &mut Configuration) {
        if conf.context().is_some() {
            return;
        }
        let context = self.next_context.fetch_add(1, Ordering::Relaxed).to_string();
        conf.set(FS_DEFAULT_NAME_KEY, default_fs_name());
        conf.set(CONFIG_IMPL_CLASS_KEY, IMPL_CLASS_NAME);
        conf.set(disable_cache_key(DEFAULT_SCHEME), "true");
        conf.set(CONTEXT_KEY, context.clone());
        debug!(%context, "configured in-memory filesystem context");
    }

    /// Run `f` against the namespace of (`context`, `fs`), creating both lazily
    pub fn with_namespace<R>(
        &self,
        context: &str,
        fs: &Url,
        f: impl FnOnce(&mut Namespace) -> FsResult<R>,
    ) -> FsResult<R> {
        let mut state = self.lock();
        let next_epoch = &self.next_epoch;
        let namespace = state
            .entry(context.to_string())
            .or_default()
            .entry(fs.clone())
            .or_insert_with(|| {
                trace!(%context, %fs, "creating namespace");
                Namespace::with_epoch(next_epoch.fetch_add(1, Ordering::Relaxed) + 1)
            });
        f(namespace)
    }

    /// Run `f` against the namespace of (`context`, `fs`) only if it exists
    pub fn with_existing_namespace<R>(
        &self,
        context: &str,
        fs: &Url,
        f: impl FnOnce(&mut Namespace) -> R,
    ) -> Option<R> {
        let mut state = self.lock();
        state.get_mut(context)?.get_mut(fs).map(f)
    }

    /// Drop every tree of the context named by `conf`
    pub fn reset(&self, conf: &Configuration) -> FsResult<()> {
        let context = conf.context().ok_or_else(|| {
            FsError::illegal_state("The configuration has no in-memory file system context.")
        })?;
        self.reset_context(context);
        Ok(())
    }

    /// Drop a context by id; returns whether it existed
    pub fn reset_context(&self, context: &str) -> bool {
        let removed = self.lock().remove(context).is_some();
        debug!(%context, removed, "reset in-memory filesystem context");
        removed
    }

    pub fn has_context(&self, context: &str) -> bool {
        self.lock().contains_key(context)
    }

    /// Ids of contexts that currently hold state
    pub fn contexts(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of the node at `path`
    pub fn get(&self, context: &str, fs: &Url, path: &FsPath) -> FsResult<Option<Node>> {
        self.with_namespace(context, fs, |ns| Ok(ns.get(path).cloned()))
    }

    pub fn put(&self, context: &str, fs: &Url, path: &FsPath, node: Node) -> FsResult<NodeId> {
        self.with_namespace(context, fs, |ns| ns.insert(path, node))
    }

    pub fn contains(&self, context: &str, fs: &Url, path: &FsPath) -> FsResult<bool> {
        self.with_namespace(context, fs, |ns| Ok(ns.contains(path)))
    }

    pub fn remove(&self, context: &str, fs: &Url, path: &FsPath) -> FsResult<Option<Node>> {
        self.with_namespace(context, fs, |ns| Ok(ns.remove(path)))
    }
}
