// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Stream lifecycle: snapshots, seeking, closing and the open flag

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::FsError;
use crate::stream::{InputStream, OutputStream};
use crate::testing::{fresh_fs, path, read, sibling, write};

#[test]
fn test_seek_and_position() {
    let (_registry, fs) = fresh_fs();
    write(&fs, "/f", b"0123456789");

    let mut input = fs.open(&path("/f")).unwrap();
    assert_eq!(input.pos().unwrap(), 0);
    input.seek_to(4).unwrap();
    assert_eq!(input.read_byte().unwrap(), Some(b'4'));
    assert_eq!(input.pos().unwrap(), 5);

    let mut buf = [0u8; 3];
    input.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"567");

    input.seek(SeekFrom::End(-1)).unwrap();
    assert_eq!(input.read_remaining().unwrap(), b"9");
    assert!(!input.seek_to_new_source(0));
    input.close().unwrap();
}

#[test]
fn test_seek_past_end_reads_eof() {
    let (_registry, fs) = fresh_fs();
    write(&fs, "/f", b"abc");

    let mut input = fs.open(&path("/f")).unwrap();
    input.seek_to(100).unwrap();
    assert_eq!(input.read_byte().unwrap(), None);
    let mut buf = [0u8; 8];
    assert_eq!(input.read(&mut buf).unwrap(), 0);
    input.close().unwrap();
}

#[test]
fn test_operations_after_close_fail() {
    let (_registry, fs) = fresh_fs();
    write(&fs, "/f", b"abc");

    let mut input = fs.open(&path("/f")).unwrap();
    input.close().unwrap();
    assert!(input.is_closed());
    assert!(matches!(input.read_byte(), Err(FsError::StreamClosed(_))));
    assert!(matches!(input.pos(), Err(FsError::StreamClosed(_))));
    assert!(matches!(input.seek_to(0), Err(FsError::StreamClosed(_))));
    let mut buf = [0u8; 1];
    assert!(input.read(&mut buf).is_err());

    let mut out = fs.append(&path("/f")).unwrap();
    out.close().unwrap();
    assert!(matches!(out.write_bytes(b"x"), Err(FsError::StreamClosed(_))));
    assert!(out.write(b"x").is_err());
}

#[test]
fn test_close_is_idempotent_and_releases_once() {
    let (_registry, fs) = fresh_fs();
    write(&fs, "/f", b"abc");

    let mut first = fs.open(&path("/f")).unwrap();
    first.close().unwrap();
    let mut second = fs.open(&path("/f")).unwrap();

    // Closing the first stream again must not free the second stream's claim.
    first.close().unwrap();
    assert!(matches!(fs.open(&path("/f")), Err(FsError::ResourceBusy(_))));
    second.close().unwrap();

    let mut out = fs.append(&path("/f")).unwrap();
    out.write_all(b"def").unwrap();
    out.close().unwrap();
    out.close().unwrap();
    assert_eq!(read(&fs, "/f"), b"abcdef");
}

#[test]
fn test_content_is_committed_on_close_only() {
    let (_registry, fs) = fresh_fs();
    let mut out = fs.create(&path("/f")).unwrap();
    out.write_all(b"pending").unwrap();
    assert_eq!(out.buffered_len(), 7);
    assert_eq!(fs.get_file_status(&path("/f")).unwrap().len, 0);

    out.close().unwrap();
    assert_eq!(fs.get_file_status(&path("/f")).unwrap().len, 7);
}

#[test]
fn test_read_stream_is_a_snapshot() {
    let (registry, fs) = fresh_fs();
    write(&fs, "/f", b"before");

    let mut input = fs.open(&path("/f")).unwrap();
    registry.reset(fs.conf()).unwrap();
    write(&fs, "/f", b"after");

    let mut content = Vec::new();
    input.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"before");

    // The stale stream closes quietly and leaves the new tree alone.
    input.close().unwrap();
    assert_eq!(read(&fs, "/f"), b"after");
}

#[test]
fn test_stale_write_stream_does_not_touch_new_tree() {
    let (registry, fs) = fresh_fs();
    let mut out = fs.create(&path("/f")).unwrap();
    out.write_all(b"lost").unwrap();

    registry.reset(fs.conf()).unwrap();
    write(&fs, "/f", b"kept");

    out.close().unwrap();
    assert_eq!(read(&fs, "/f"), b"kept");
}

#[test]
fn test_stale_close_does_not_recreate_reset_context() {
    let (registry, fs) = fresh_fs();
    let context = fs.conf().context().unwrap().to_string();
    write(&fs, "/g", b"g");
    let mut input = fs.open(&path("/g")).unwrap();
    let mut out = fs.create(&path("/f")).unwrap();

    registry.reset(fs.conf()).unwrap();
    assert!(!registry.has_context(&context));

    out.close().unwrap();
    input.close().unwrap();
    assert!(!registry.has_context(&context));
}

#[test]
fn test_write_stream_follows_rename() {
    let (_registry, fs) = fresh_fs();
    let mut out = fs.create(&path("/draft")).unwrap();
    out.write_all(b"text").unwrap();
    fs.rename(&path("/draft"), &path("/final/doc")).unwrap();
    out.close().unwrap();

    assert_eq!(read(&fs, "/final/doc"), b"text");
}

#[test]
fn test_dropped_stream_keeps_file_open() {
    let (_registry, fs) = fresh_fs();
    write(&fs, "/f", b"abc");
    drop(fs.open(&path("/f")).unwrap());
    assert!(matches!(fs.open(&path("/f")), Err(FsError::ResourceBusy(_))));
}

#[test]
fn test_open_flag_is_shared_across_instances() {
    let (_registry, fs) = fresh_fs();
    write(&fs, "/f", b"abc");
    let other = sibling(&fs);

    let mut input = fs.open(&path("/f")).unwrap();
    let err = other.open(&path("/f")).unwrap_err();
    assert_eq!(err.to_string(), "File already open: /f");
    input.close().unwrap();
    assert_eq!(read(&other, "/f"), b"abc");
}
