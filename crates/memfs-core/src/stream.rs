// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Read and write streams over file nodes
//!
//! Opening a stream sets the file's open flag; closing it clears the flag.
//! Dropping a stream without closing it leaves the file marked open.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use tracing::{trace, warn};
use url::Url;

use crate::error::{FsError, FsResult};
use crate::namespace::{NodeId, NodeKind, Registry};
use crate::path::FsPath;

/// Seekable input stream, as handed to host collaborators
pub trait InputStream: Read + Seek + Send {
    fn pos(&self) -> FsResult<u64>;

    /// Alternate replicas do not exist; always `false`
    fn seek_to_new_source(&mut self, target: u64) -> bool;

    fn close(&mut self) -> FsResult<()>;
}

/// Output stream, as handed to host collaborators
pub trait OutputStream: Write + Send {
    fn close(&mut self) -> FsResult<()>;
}

/// Where a stream's node lives
#[derive(Clone, Debug)]
pub(crate) struct NodeRef {
    pub registry: Arc<Registry>,
    pub context: String,
    pub fs: Url,
    pub epoch: u64,
    pub node: NodeId,
    pub path: FsPath,
}

impl NodeRef {
    /// Clear the open flag, optionally replacing the content first. A stream
    /// outliving a reset of its context changes nothing.
    fn release(&self, commit: Option<Vec<u8>>) {
        let released = self.registry.with_existing_namespace(&self.context, &self.fs, |ns| {
            if ns.epoch() != self.epoch {
                return false;
            }
            match ns.node_mut(self.node).map(|n| &mut n.kind) {
                Some(NodeKind::File { bytes, open }) => {
                    if let Some(content) = commit {
                        trace!(path = %self.path, len = content.len(), "committing stream buffer");
                        *bytes = content;
                    }
                    *open = false;
                }
                Some(NodeKind::Directory { .. }) | None => {
                    warn!(path = %self.path, "file vanished while the stream was open");
                }
            }
            true
        });
        if released != Some(true) {
            warn!(path = %self.path, "namespace was reset while the stream was open");
        }
    }
}

/// Reads a snapshot of the file taken when it was opened
#[derive(Debug)]
pub struct MemoryInputStream {
    node: NodeRef,
    cursor: Cursor<Vec<u8>>,
    closed: bool,
}

impl MemoryInputStream {
    pub(crate) fn new(node: NodeRef, snapshot: Vec<u8>) -> Self {
        Self {
            node,
            cursor: Cursor::new(snapshot),
            closed: false,
        }
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::StreamClosed(format!("File is closed: {}", self.node.path)));
        }
        Ok(())
    }

    pub fn path(&self) -> &FsPath {
        &self.node.path
    }

    /// Length of the snapshot
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move to an absolute position; positions past the end are allowed
    pub fn seek_to(&mut self, pos: u64) -> FsResult<()> {
        self.ensure_open()?;
        self.cursor.set_position(pos);
        Ok(())
    }

    /// Next byte, or `None` at end of stream
    pub fn read_byte(&mut self) -> FsResult<Option<u8>> {
        self.ensure_open()?;
        let mut byte = [0u8; 1];
        let n = self.cursor.read(&mut byte)?;
        Ok((n == 1).then_some(byte[0]))
    }

    /// Everything from the current position to the end
    pub fn read_remaining(&mut self) -> FsResult<Vec<u8>> {
        self.ensure_open()?;
        let mut out = Vec::new();
        self.cursor.read_to_end(&mut out)?;
        Ok(out)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl InputStream for MemoryInputStream {
    fn pos(&self) -> FsResult<u64> {
        self.ensure_open()?;
        Ok(self.cursor.position())
    }

    fn seek_to_new_source(&mut self, _target: u64) -> bool {
        false
    }

    /// A second close is a no-op, so it cannot release a later stream's claim
    fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.node.release(None);
        Ok(())
    }
}

impl Read for MemoryInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.ensure_open()?;
        self.cursor.seek(pos)
    }
}

/// Buffers writes and replaces the file content on close
#[derive(Debug)]
pub struct MemoryOutputStream {
    node: NodeRef,
    buffer: Option<Vec<u8>>,
}

impl MemoryOutputStream {
    /// `seed` is the existing content for appends, empty for fresh files
    pub(crate) fn new(node: NodeRef, seed: Vec<u8>) -> Self {
        Self {
            node,
            buffer: Some(seed),
        }
    }

    pub fn path(&self) -> &FsPath {
        &self.node.path
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> FsResult<()> {
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| FsError::StreamClosed(format!("File closed! {}", self.node.path)))?;
        buffer.extend_from_slice(data);
        Ok(())
    }

    /// Bytes the file will hold once closed
    pub fn buffered_len(&self) -> u64 {
        self.buffer.as_ref().map_or(0, |b| b.len() as u64)
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_none()
    }
}

impl OutputStream for MemoryOutputStream {
    fn close(&mut self) -> FsResult<()> {
        if let Some(content) = self.buffer.take() {
            self.node.release(Some(content));
        }
        Ok(())
    }
}

impl Write for MemoryOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
