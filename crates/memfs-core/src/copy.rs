// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Moving content between filesystem instances

use std::io::{self, Write};

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::path::FsPath;
use crate::types::{CreateOptions, FileStatus};

/// Copy `src_path` from `src` into the directory `dst_parent` of `dst`.
///
/// The copy lands at `dst_parent/<name of src_path>`, or at `dst_parent`
/// itself when copying a root. Directories are copied recursively with their
/// permissions; an existing target file is never overwritten.
pub fn copy(
    src: &dyn FileSystem,
    src_path: &FsPath,
    dst: &dyn FileSystem,
    dst_parent: &FsPath,
) -> FsResult<()> {
    let status = src.get_file_status(src_path)?;
    let target = if status.path.is_root() {
        dst_parent.clone()
    } else {
        dst_parent.child(status.name())
    };
    debug!(src = %status.path, dst = %target, from = %src.uri(), to = %dst.uri(), "copying");
    copy_entry(src, &status, dst, &target)
}

fn copy_entry(
    src: &dyn FileSystem,
    status: &FileStatus,
    dst: &dyn FileSystem,
    target: &FsPath,
) -> FsResult<()> {
    if status.is_dir {
        // Listed before the target exists, so copying a tree into itself terminates.
        let children = src.list_status(&status.path)?;
        dst.mkdirs(target, Some(status.permission))?;
        for child in &children {
            copy_entry(src, child, dst, &target.child(child.name()))?;
        }
        return Ok(());
    }

    if dst.exists(target)? {
        return Err(FsError::AlreadyExists(format!("Target {target} already exists")));
    }

    let mut input = src.open(&status.path)?;
    let options = CreateOptions::new().permission(status.permission).overwrite(false);
    let mut output = match dst.create(target, &options) {
        Ok(output) => output,
        Err(e) => {
            input.close()?;
            return Err(e);
        }
    };

    let copied = io::copy(&mut input, &mut output);
    let closed_in = input.close();
    let closed_out = output.close();
    copied?;
    closed_in?;
    closed_out
}

/// Create `path` on `fs` holding exactly `contents`
pub fn create_file(fs: &dyn FileSystem, path: &FsPath, contents: &str) -> FsResult<()> {
    let mut out = fs.create(path, &CreateOptions::default())?;
    let written = out.write_all(contents.as_bytes());
    let closed = out.close();
    written?;
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::fs::MockFileSystem;
    use crate::namespace::Registry;
    use crate::stream::OutputStream;
    use crate::types::FsPermission;
    use crate::vfs::MemoryFileSystem;
    use mockall::predicate::eq;
    use std::io::Read;
    use std::sync::Arc;

    fn p(s: &str) -> FsPath {
        FsPath::parse(s).expect("valid path")
    }

    fn memory_fs(registry: &Arc<Registry>) -> MemoryFileSystem {
        let mut conf = Configuration::new();
        MemoryFileSystem::get(registry, &mut conf).expect("engine should build")
    }

    fn contents(fs: &MemoryFileSystem, path: &str) -> String {
        let mut input = fs.open(&p(path)).expect("open");
        let mut s = String::new();
        input.read_to_string(&mut s).expect("read");
        crate::stream::InputStream::close(&mut input).expect("close");
        s
    }

    #[test]
    fn create_file_writes_contents() {
        let registry = Arc::new(Registry::new());
        let fs = memory_fs(&registry);
        create_file(&fs, &p("/dir/a.txt"), "hello").unwrap();
        assert_eq!(contents(&fs, "/dir/a.txt"), "hello");
    }

    #[test]
    fn copies_tree_across_contexts() {
        let registry = Arc::new(Registry::new());
        let src = memory_fs(&registry);
        let dst = memory_fs(&registry);

        src.mkdirs(&p("/proj/empty"), Some(FsPermission::new(0o750))).unwrap();
        create_file(&src, &p("/proj/src/main.rs"), "fn main() {}").unwrap();
        create_file(&src, &p("/proj/README"), "readme").unwrap();
        dst.mkdirs(&p("/backup"), None).unwrap();

        copy(&src, &p("/proj"), &dst, &p("/backup")).unwrap();

        assert_eq!(contents(&dst, "/backup/proj/src/main.rs"), "fn main() {}");
        assert_eq!(contents(&dst, "/backup/proj/README"), "readme");
        let empty = dst.get_file_status(&p("/backup/proj/empty")).unwrap();
        assert!(empty.is_dir);
        assert_eq!(empty.permission.mode(), 0o750);
        // The source keeps its content and its streams are released.
        assert_eq!(contents(&src, "/proj/README"), "readme");
    }

    #[test]
    fn copy_refuses_existing_target_file() {
        let registry = Arc::new(Registry::new());
        let src = memory_fs(&registry);
        let dst = memory_fs(&registry);
        create_file(&src, &p("/f"), "new").unwrap();
        create_file(&dst, &p("/out/f"), "old").unwrap();

        let err = copy(&src, &p("/f"), &dst, &p("/out")).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
        assert_eq!(contents(&dst, "/out/f"), "old");
        assert!(src.open(&p("/f")).is_ok());
    }

    #[test]
    fn copy_drives_host_filesystem_through_trait() {
        let registry = Arc::new(Registry::new());
        let src = memory_fs(&registry);
        create_file(&src, &p("/report.csv"), "a,b\n1,2\n").unwrap();

        // Bytes written to the host land in a second in-memory instance.
        let sink = memory_fs(&registry);
        let sink_for_mock = sink.clone();

        let mut host = MockFileSystem::new();
        host.expect_uri().returning(|| url::Url::parse("hdfs:///").unwrap());
        host.expect_exists()
            .with(eq(p("/landing/report.csv")))
            .times(1)
            .returning(|_| Ok(false));
        host.expect_create()
            .withf(|path, options| path == &p("/landing/report.csv") && !options.overwrite)
            .times(1)
            .returning(move |_, _| {
                let out: Box<dyn OutputStream> = Box::new(sink_for_mock.create(&p("/landed"))?);
                Ok(out)
            });

        copy(&src, &p("/report.csv"), &host, &p("/landing")).unwrap();
        assert_eq!(contents(&sink, "/landed"), "a,b\n1,2\n");
    }
}
