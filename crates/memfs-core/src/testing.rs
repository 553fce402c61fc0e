// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only helpers shared by the engine's test modules

use std::io::{Read, Write};
use std::sync::Arc;

use crate::config::Configuration;
use crate::namespace::Registry;
use crate::path::FsPath;
use crate::stream::{InputStream, OutputStream};
use crate::vfs::MemoryFileSystem;

pub fn path(s: &str) -> FsPath {
    FsPath::parse(s).expect("valid test path")
}

/// A registry plus one configured engine on a fresh context
pub fn fresh_fs() -> (Arc<Registry>, MemoryFileSystem) {
    let registry = Arc::new(Registry::new());
    let mut conf = Configuration::new();
    let fs = MemoryFileSystem::get(&registry, &mut conf).expect("engine should build");
    (registry, fs)
}

/// Another engine on the same context as `fs`
pub fn sibling(fs: &MemoryFileSystem) -> MemoryFileSystem {
    MemoryFileSystem::new(Arc::clone(fs.registry()), fs.conf().clone())
        .expect("engine should build")
}

pub fn write(fs: &MemoryFileSystem, p: &str, content: &[u8]) {
    let mut out = fs.create(&path(p)).expect("create should succeed");
    out.write_all(content).expect("write should succeed");
    out.close().expect("close should succeed");
}

pub fn read(fs: &MemoryFileSystem, p: &str) -> Vec<u8> {
    let mut input = fs.open(&path(p)).expect("open should succeed");
    let mut buf = Vec::new();
    input.read_to_end(&mut buf).expect("read should succeed");
    input.close().expect("close should succeed");
    buf
}
