// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Line-oriented command scripts run against one engine instance

use std::io::{Read, Write};

use anyhow::{Context, Result, anyhow, bail};
use memfs_core::{
    FileStatus, FsPath, FsPermission, InputStream, MemoryFileSystem, MemoryOutputStream,
    OutputStream,
};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptCommand {
    Mkdir { path: String, mode: Option<u16> },
    Write { path: String, text: String },
    Append { path: String, text: String },
    Cat { path: String },
    Ls { path: String },
    Stat { path: String },
    Rm { path: String, recursive: bool },
    Mv { src: String, dst: String },
    Chown { path: String, user: String, group: String },
    Cd { path: String },
    Pwd,
    Su { user: String, groups: Vec<String> },
}

/// Counts for a finished run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub executed: usize,
    pub failed: usize,
}

fn parse_mode(raw: &str) -> Result<u16> {
    let mode =
        u16::from_str_radix(raw, 8).with_context(|| format!("invalid octal mode '{raw}'"))?;
    if mode > 0o777 {
        bail!("mode '{raw}' is out of range");
    }
    Ok(mode)
}

/// Join text words with single spaces, expanding `\n` and `\t`
fn join_text(words: &[&str]) -> String {
    words.join(" ").replace("\\n", "\n").replace("\\t", "\t")
}

/// Parse one script line; blank lines and `#` comments yield `None`
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    let (name, args) = words.split_first().ok_or_else(|| anyhow!("empty command"))?;
    let command = match (*name, args) {
        ("mkdir", [path]) => ScriptCommand::Mkdir {
            path: path.to_string(),
            mode: None,
        },
        ("mkdir", [path, mode]) => ScriptCommand::Mkdir {
            path: path.to_string(),
            mode: Some(parse_mode(mode)?),
        },
        ("write", [path, text @ ..]) => ScriptCommand::Write {
            path: path.to_string(),
            text: join_text(text),
        },
        ("append", [path, text @ ..]) => ScriptCommand::Append {
            path: path.to_string(),
            text: join_text(text),
        },
        ("cat", [path]) => ScriptCommand::Cat {
            path: path.to_string(),
        },
        ("ls", [path]) => ScriptCommand::Ls {
            path: path.to_string(),
        },
        ("stat", [path]) => ScriptCommand::Stat {
            path: path.to_string(),
        },
        ("rm", [path]) => ScriptCommand::Rm {
            path: path.to_string(),
            recursive: false,
        },
        ("rm", ["-r", path]) => ScriptCommand::Rm {
            path: path.to_string(),
            recursive: true,
        },
        ("mv", [src, dst]) => ScriptCommand::Mv {
            src: src.to_string(),
            dst: dst.to_string(),
        },
        ("chown", [path, user, group]) => ScriptCommand::Chown {
            path: path.to_string(),
            user: user.to_string(),
            group: group.to_string(),
        },
        ("cd", [path]) => ScriptCommand::Cd {
            path: path.to_string(),
        },
        ("pwd", []) => ScriptCommand::Pwd,
        ("su", [user, groups @ ..]) => ScriptCommand::Su {
            user: user.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        },
        (
            "mkdir" | "write" | "append" | "cat" | "ls" | "stat" | "rm" | "mv" | "chown" | "cd"
            | "pwd" | "su",
            _,
        ) => bail!("wrong arguments for '{name}'"),
        _ => bail!("unknown command '{name}'"),
    };
    Ok(Some(command))
}

/// `drwxr-xr-x root root 0 /path`
pub fn format_status(status: &FileStatus) -> String {
    format!(
        "{}{} {} {} {} {}",
        if status.is_dir { 'd' } else { '-' },
        status.permission,
        status.owner,
        status.group,
        status.len,
        status.path
    )
}

fn path(raw: &str) -> Result<FsPath> {
    Ok(FsPath::parse(raw)?)
}

fn write_and_close(mut stream: MemoryOutputStream, text: &str) -> Result<()> {
    let written = stream.write_all(text.as_bytes());
    stream.close()?;
    Ok(written?)
}

pub fn execute<W: Write>(
    fs: &mut MemoryFileSystem,
    command: &ScriptCommand,
    out: &mut W,
) -> Result<()> {
    debug!(?command, "executing");
    match command {
        ScriptCommand::Mkdir { path: p, mode } => {
            fs.mkdirs(&path(p)?, mode.map(FsPermission::new))?;
        }
        ScriptCommand::Write { path: p, text } => {
            write_and_close(fs.create(&path(p)?)?, text)?;
        }
        ScriptCommand::Append { path: p, text } => {
            write_and_close(fs.append(&path(p)?)?, text)?;
        }
        ScriptCommand::Cat { path: p } => {
            let mut input = fs.open(&path(p)?)?;
            let mut content = Vec::new();
            let read = input.read_to_end(&mut content);
            input.close()?;
            read?;
            out.write_all(&content)?;
            if !content.ends_with(b"\n") {
                writeln!(out)?;
            }
        }
        ScriptCommand::Ls { path: p } => {
            for status in fs.list_status(&path(p)?)? {
                writeln!(out, "{}", format_status(&status))?;
            }
        }
        ScriptCommand::Stat { path: p } => {
            writeln!(out, "{}", format_status(&fs.get_file_status(&path(p)?)?))?;
        }
        ScriptCommand::Rm { path: p, recursive } => {
            fs.delete(&path(p)?, *recursive)?;
        }
        ScriptCommand::Mv { src, dst } => {
            fs.rename(&path(src)?, &path(dst)?)?;
        }
        ScriptCommand::Chown { path: p, user, group } => {
            fs.set_owner(&path(p)?, user, group)?;
        }
        ScriptCommand::Cd { path: p } => {
            fs.set_working_directory(&path(p)?)?;
        }
        ScriptCommand::Pwd => {
            writeln!(out, "{}", fs.working_directory())?;
        }
        ScriptCommand::Su { user, groups } => {
            fs.set_user(user, groups.iter().map(String::as_str))?;
        }
    }
    Ok(())
}

/// Run every line of `script`. Failures go to `err` as `line N: message`;
/// with `fail_fast` the first one ends the run.
pub fn run_script<W: Write, E: Write>(
    fs: &mut MemoryFileSystem,
    script: &str,
    out: &mut W,
    err: &mut E,
    fail_fast: bool,
) -> Result<Outcome> {
    let mut outcome = Outcome::default();
    for (index, line) in script.lines().enumerate() {
        let line_no = index + 1;
        let result = parse_line(line).and_then(|command| match command {
            Some(command) => {
                outcome.executed += 1;
                execute(fs, &command, out)
            }
            None => Ok(()),
        });

        if let Err(e) = result {
            outcome.failed += 1;
            writeln!(err, "line {line_no}: {}: {e:#}", line.trim())?;
            if fail_fast {
                break;
            }
        }
    }
    Ok(outcome)
}
