// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Permission checks as seen through the engine's operations
//!
//! Owner, group and other bits are evaluated other-first: the first class
//! whose bits grant the action decides who gets it.

use std::io::Write;

use crate::error::FsError;
use crate::stream::OutputStream;
use crate::testing::{fresh_fs, path, read, sibling, write};
use crate::types::{CreateOptions, FsPermission};
use crate::vfs::MemoryFileSystem;

/// `/shared/data` owned by u1:g1 with mode 0640
fn fixture() -> MemoryFileSystem {
    let (_registry, fs) = fresh_fs();
    fs.mkdirs(&path("/shared"), None).unwrap();
    let mut out = fs
        .create_with(
            &path("/shared/data"),
            &CreateOptions::new().permission(FsPermission::new(0o640)),
        )
        .unwrap();
    out.write_all(b"payload").unwrap();
    out.close().unwrap();
    fs.set_owner(&path("/shared/data"), "u1", "g1").unwrap();
    fs
}

fn acting_as(fs: &MemoryFileSystem, user: &str, groups: &[&str]) -> MemoryFileSystem {
    let mut other = sibling(fs);
    other.set_user(user, groups.iter().copied()).unwrap();
    other
}

fn can_read(fs: &MemoryFileSystem) -> bool {
    match fs.open(&path("/shared/data")) {
        Ok(mut input) => {
            crate::stream::InputStream::close(&mut input).unwrap();
            true
        }
        Err(FsError::PermissionDenied) => false,
        Err(e) => panic!("unexpected error: {e}"),
    }
}

fn can_write(fs: &MemoryFileSystem) -> bool {
    match fs.append(&path("/shared/data")) {
        Ok(mut out) => {
            out.close().unwrap();
            true
        }
        Err(FsError::PermissionDenied) => false,
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn test_owner_reads_and_writes() {
    let fs = fixture();
    let owner = acting_as(&fs, "u1", &["g1"]);
    assert!(can_read(&owner));
    assert!(can_write(&owner));
}

#[test]
fn test_group_member_reads_only() {
    let fs = fixture();
    let member = acting_as(&fs, "u2", &["g1"]);
    assert!(can_read(&member));
    assert!(!can_write(&member));
}

#[test]
fn test_outsider_has_no_access() {
    let fs = fixture();
    let outsider = acting_as(&fs, "u3", &["g3"]);
    assert!(!can_read(&outsider));
    assert!(!can_write(&outsider));
    assert!(matches!(
        outsider.delete(&path("/shared/data"), false),
        Err(FsError::PermissionDenied)
    ));
}

#[test]
fn test_owner_outside_group_cannot_read() {
    // Group bits grant read, so only group membership counts for reads.
    let fs = fixture();
    let owner = acting_as(&fs, "u1", &["elsewhere"]);
    assert!(!can_read(&owner));
    assert!(can_write(&owner));
}

#[test]
fn test_denial_message_is_generic() {
    let fs = fixture();
    let outsider = acting_as(&fs, "u3", &["g3"]);
    let err = outsider.open(&path("/shared/data")).unwrap_err();
    assert_eq!(err.to_string(), "Permission denied!");
}

#[test]
fn test_parent_directory_write_gates_new_entries() {
    let (_registry, fs) = fresh_fs();
    fs.mkdirs(&path("/locked"), Some(FsPermission::new(0o755))).unwrap();
    write(&fs, "/open.txt", b"x");

    let guest = acting_as(&fs, "guest", &["guests"]);
    assert!(matches!(guest.create(&path("/locked/f")), Err(FsError::PermissionDenied)));
    assert!(matches!(
        guest.mkdirs(&path("/locked/a/b"), None),
        Err(FsError::PermissionDenied)
    ));
    assert!(matches!(
        guest.rename(&path("/open.txt"), &path("/locked/moved.txt")),
        Err(FsError::PermissionDenied)
    ));
    assert!(!fs.exists(&path("/locked/a")).unwrap());

    // Existing paths short-circuit mkdirs before any permission check.
    assert!(guest.mkdirs(&path("/locked"), None).unwrap());
}

#[test]
fn test_list_status_requires_read() {
    let (_registry, fs) = fresh_fs();
    fs.mkdirs(&path("/private"), Some(FsPermission::new(0o700))).unwrap();
    write(&fs, "/private/key", b"k");

    let guest = acting_as(&fs, "guest", &["guests"]);
    assert!(matches!(guest.list_status(&path("/private")), Err(FsError::PermissionDenied)));
    // Status lookups are not permission checked.
    assert_eq!(guest.get_file_status(&path("/private/key")).unwrap().len, 1);
}

#[test]
fn test_recursive_delete_checks_each_directory() {
    let (_registry, fs) = fresh_fs();
    fs.mkdirs(&path("/t/inner"), Some(FsPermission::new(0o700))).unwrap();
    fs.set_owner(&path("/t"), "guest", "guests").unwrap();

    let guest = acting_as(&fs, "guest", &["guests"]);
    assert!(matches!(guest.delete(&path("/t"), true), Err(FsError::PermissionDenied)));
    assert!(fs.exists(&path("/t/inner")).unwrap());
}

#[test]
fn test_root_has_no_superuser_bypass() {
    let fs = fixture();
    assert!(!can_read(&fs));
    fs.set_owner(&path("/shared/data"), "u1", "root").unwrap();
    assert!(can_read(&fs));
    assert_eq!(read(&fs, "/shared/data"), b"payload");
}
