// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

mod script;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use memfs_core::{Configuration, MemoryFileSystem, Registry};
use memfs_logging::CliLoggingArgs;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "memfs",
    author,
    version,
    about = "Run a command script against an in-memory filesystem"
)]
struct Cli {
    /// Script file; reads stdin when omitted or `-`
    script: Option<PathBuf>,

    /// TOML file with the host configuration keys
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Act as this user from the first line on
    #[arg(long, env = "MEMFS_USER")]
    user: Option<String>,

    /// Group membership for --user (repeatable)
    #[arg(long = "group", value_name = "GROUP", requires = "user")]
    groups: Vec<String>,

    /// Stop at the first failing line
    #[arg(long)]
    fail_fast: bool,

    #[command(flatten)]
    logging: CliLoggingArgs,
}

fn load_configuration(path: Option<&PathBuf>) -> Result<Configuration> {
    let Some(path) = path else {
        return Ok(Configuration::new());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    Configuration::from_toml_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn read_script(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).context("failed to read script from stdin")?;
            Ok(text)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let mut conf = load_configuration(cli.config.as_ref())?;
    let registry = Arc::new(Registry::new());
    let mut fs = MemoryFileSystem::get(&registry, &mut conf)?;
    if let Some(user) = &cli.user {
        fs.set_user(user, &cli.groups)?;
    }
    let script = read_script(cli.script.as_ref())?;

    let stdout = io::stdout();
    let stderr = io::stderr();
    let outcome = script::run_script(
        &mut fs,
        &script,
        &mut stdout.lock(),
        &mut stderr.lock(),
        cli.fail_fast,
    )?;
    info!(executed = outcome.executed, failed = outcome.failed, "script finished");
    Ok(outcome.failed == 0)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.logging.init("memfs-cli") {
        eprintln!("memfs: failed to initialise logging: {e:#}");
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("memfs: {e:#}");
            ExitCode::from(2)
        }
    }
}
