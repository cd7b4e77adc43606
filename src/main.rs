// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! qjsbridge - developer CLI for the QuickJS embedding bridge
//!
//! Compiles sources into bytecode blobs, runs sources and blobs, inspects
//! blob headers and hosts an interactive REPL. Async host calls made by
//! script are served by the built-in `echo` and `sleep` handlers.

mod display;
mod handlers;
mod repl;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use handlers::Unknown;
use owo_colors::OwoColorize;
use qjsbridge_core::{
    Bridge, BridgeConfig, BridgeError, CompiledUnit, PromiseStatus, UnitKind, VERSION, ValueHandle,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "qjsbridge",
    about = "Compile, run and inspect QuickJS bytecode through the embedding bridge",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Bridge configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a source file or inline code
    Eval {
        /// Source file to evaluate
        file: Option<PathBuf>,

        /// Evaluate code from the command line
        #[arg(short = 'e', long = "eval", conflicts_with = "file")]
        code: Option<String>,

        /// Treat the source as a module
        #[arg(long)]
        module: bool,
    },

    /// Compile a source file into a bytecode blob
    Compile {
        /// Source file to compile
        file: PathBuf,

        /// Where to write the blob
        #[arg(short, long)]
        output: PathBuf,

        /// Compile as a module
        #[arg(long)]
        module: bool,

        /// Unit name; defaults to the file path
        #[arg(long)]
        name: Option<String>,
    },

    /// Run a bytecode blob
    Run {
        /// Blob to run
        blob: PathBuf,

        /// Function to call afterwards: a module export, or a global for scripts
        #[arg(long)]
        call: Option<String>,

        /// Module blob the run may import by name (repeatable)
        #[arg(long = "register", value_name = "BLOB")]
        register: Vec<PathBuf>,
    },

    /// Print a blob's header
    Inspect {
        /// Blob to inspect
        blob: PathBuf,
    },

    /// Start the interactive REPL
    Repl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<BridgeError>() {
                Some(bridge_err) => display::print_error(bridge_err),
                None => eprintln!("{}: {err:#}", "Error".red().bold()),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "qjsbridge=debug,qjsbridge_core=debug"
    } else {
        "qjsbridge=warn,qjsbridge_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Eval { file, code, module } => eval_command(config, file, code, module),
        Command::Compile {
            file,
            output,
            module,
            name,
        } => compile_command(config, &file, &output, module, name),
        Command::Run {
            blob,
            call,
            register,
        } => run_command(config, &blob, call.as_deref(), &register),
        Command::Inspect { blob } => inspect_command(&blob),
        Command::Repl => {
            let mut repl = repl::Repl::new(config)?;
            repl.run()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    let mut config = match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn eval_command(
    config: BridgeConfig,
    file: Option<PathBuf>,
    code: Option<String>,
    module: bool,
) -> anyhow::Result<ExitCode> {
    let (filename, source) = match (file, code) {
        (Some(path), _) => (path.display().to_string(), read_source(&path)?),
        (None, Some(code)) => (config.default_filename.clone(), code),
        (None, None) => bail!("nothing to evaluate: pass a file or -e <code>"),
    };

    let mut bridge = Bridge::new(config)?;
    let result = bridge.eval_source(&filename, &source, module)?;
    finish(&mut bridge, result)
}

fn compile_command(
    config: BridgeConfig,
    file: &Path,
    output: &Path,
    module: bool,
    name: Option<String>,
) -> anyhow::Result<ExitCode> {
    let source = read_source(file)?;
    let name = name.unwrap_or_else(|| file.display().to_string());

    let bridge = Bridge::new(config)?;
    let unit = bridge.compile(&name, &source, module)?;
    let blob = unit.serialize();
    fs::write(output, &blob).with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "{} {} ({}, {} bytes) -> {}",
        "Compiled".green().bold(),
        unit.name().cyan(),
        unit.kind(),
        blob.len(),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_command(
    config: BridgeConfig,
    path: &Path,
    call: Option<&str>,
    register: &[PathBuf],
) -> anyhow::Result<ExitCode> {
    let blob = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let header = CompiledUnit::inspect(&blob).map_err(BridgeError::from)?;

    let mut bridge = Bridge::new(config)?;
    for module in register {
        let bytes =
            fs::read(module).with_context(|| format!("failed to read {}", module.display()))?;
        let name = bridge.register_module(&bytes)?;
        tracing::debug!(event = "cli.register", name = %name, path = %module.display());
    }

    let (target, result) = match header.kind {
        UnitKind::Module => {
            let namespace = bridge.load_bytecode(&blob)?;
            (namespace, namespace)
        }
        UnitKind::Script => {
            let result = bridge.eval_bytecode(&blob)?;
            (bridge.global_object()?, result)
        }
    };

    let result = match call {
        Some(function) => {
            handlers::serve(&mut bridge, Unknown::Reject)?;
            bridge.call_function(target, function)?
        }
        None if header.kind == UnitKind::Module => {
            handlers::serve(&mut bridge, Unknown::Reject)?;
            return report_job_failures(&mut bridge);
        }
        None => result,
    };
    finish(&mut bridge, result)
}

fn inspect_command(path: &Path) -> anyhow::Result<ExitCode> {
    let blob = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let header = CompiledUnit::inspect(&blob).map_err(BridgeError::from)?;

    println!("{:10} {}", "name".white().bold(), header.name.cyan());
    println!("{:10} {}", "kind".white().bold(), header.kind);
    println!("{:10} {}", "engine".white().bold(), header.engine_tag);
    println!("{:10} {} bytes", "payload".white().bold(), header.payload_len);
    println!("{:10} {}", "sha256".white().bold(), hex::encode(header.digest).dimmed());
    Ok(ExitCode::SUCCESS)
}

/// Serve async requests, settle a promise result and print the value.
fn finish(bridge: &mut Bridge, result: ValueHandle) -> anyhow::Result<ExitCode> {
    handlers::serve(bridge, Unknown::Reject)?;

    let value = match bridge.promise_state(result) {
        Ok(PromiseStatus::Pending) => bail!("promise never settled"),
        Ok(_) => bridge.await_promise(result)?,
        Err(BridgeError::TypeError(_)) => result,
        Err(err) => return Err(err.into()),
    };

    if !display::is_silent(bridge, value)? {
        println!("{}", display::format_value(bridge, value)?);
    }
    report_job_failures(bridge)
}

fn report_job_failures(bridge: &mut Bridge) -> anyhow::Result<ExitCode> {
    let failures = bridge.take_job_failures();
    for failure in &failures {
        eprintln!("{}: {}", "Job failed".yellow().bold(), failure);
    }
    Ok(if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_repl() {
        let cli = Cli::try_parse_from(["qjsbridge", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_eval_flags() {
        let cli = Cli::try_parse_from(["qjsbridge", "eval", "-e", "1+1"]).unwrap();
        match cli.command {
            Some(Command::Eval { file, code, module }) => {
                assert!(file.is_none());
                assert_eq!(code.as_deref(), Some("1+1"));
                assert!(!module);
            }
            _ => panic!("expected eval"),
        }
        assert!(Cli::try_parse_from(["qjsbridge", "eval", "a.js", "-e", "1"]).is_err());
    }

    #[test]
    fn test_run_registers_modules() {
        let cli = Cli::try_parse_from([
            "qjsbridge", "run", "main.qjsb", "--register", "a.qjsb", "--register", "b.qjsb",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Run { blob, register, .. }) => {
                assert_eq!(blob, PathBuf::from("main.qjsb"));
                assert_eq!(register, vec![PathBuf::from("a.qjsb"), PathBuf::from("b.qjsb")]);
            }
            _ => panic!("expected run"),
        }
    }
}
