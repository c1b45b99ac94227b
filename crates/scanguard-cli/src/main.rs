//! `scanguard` – lidar collision guard command line.
//!
//! Subcommands:
//!
//! - `run` (default) – connect to rosbridge, consume `/scan` and
//!   `/sliding_window/set`, publish `/collision` until Ctrl-C.
//! - `replay <file>` – push a recorded newline-delimited rosbridge capture
//!   through the pipeline and print the `/collision` frames to stdout.
//! - `init-config` – write the default `~/.scanguard/config.toml`.
//! - `help` – usage.

mod config;
mod replay;

use colored::Colorize;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;

use scanguard_middleware::{EventBus, RosbridgeClient};
use scanguard_runtime::{AvoidanceNode, Pipeline, SharedPipeline, init_tracing};
use scanguard_types::ScanError;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Parsed command line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run,
    Replay(String),
    InitConfig,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args.first().map(String::as_str) {
        None | Some("run") => Ok(Command::Run),
        Some("replay") => args
            .get(1)
            .map(|path| Command::Replay(path.clone()))
            .ok_or_else(|| "replay needs a capture file".to_string()),
        Some("init-config") => Ok(Command::InitConfig),
        Some("help" | "-h" | "--help") => Ok(Command::Help),
        Some(other) => Err(format!("unknown command `{other}`")),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    // Must be created before the Tokio runtime (synchronous span export).
    let _guard = init_tracing("scanguard");

    let result = match command {
        Command::Help => {
            print_usage();
            Ok(())
        }
        Command::InitConfig => init_config(),
        Command::Replay(path) => replay_file(&path),
        Command::Run => run_live(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "scanguard exited with an error");
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn init_config() -> Result<(), ScanError> {
    let path = config::save(&config::Config::default())?;
    println!(
        "  {} Default config written to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

fn replay_file(path: &str) -> Result<(), ScanError> {
    let cfg = config::load()?;
    let file = File::open(path).map_err(|e| ScanError::Config(format!("cannot open {path}: {e}")))?;
    let mut pipeline = Pipeline::new(cfg.thresholds);

    let stdout = std::io::stdout();
    let summary = replay::replay(BufReader::new(file), stdout.lock(), &cfg.topics(), &mut pipeline)?;
    info!(
        lines = summary.lines,
        scans = summary.scans,
        tunings = summary.tunings,
        rejected_tunings = summary.rejected_tunings,
        cycles = summary.cycles,
        skipped = summary.skipped,
        final_window = %pipeline.window_size(),
        "replay finished"
    );
    Ok(())
}

fn run_live() -> Result<(), ScanError> {
    print_banner();
    let cfg = config::load()?;
    println!("  rosbridge : {}", cfg.rosbridge_url.bold());
    println!(
        "  topics    : {} + {} → {}",
        cfg.scan_topic.cyan(),
        cfg.tuning_topic.cyan(),
        cfg.collision_topic.cyan()
    );
    println!();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = tokio::runtime::Runtime::new().map_err(|e| ScanError::Transport(format!("tokio runtime: {e}")))?;
    runtime.block_on(async move {
        let bus = Arc::new(EventBus::default());
        let pipeline = SharedPipeline::new(Pipeline::new(cfg.thresholds));
        let node = AvoidanceNode::new(Arc::clone(&bus), pipeline.clone());
        let client = RosbridgeClient::new(Arc::clone(&bus), cfg.rosbridge_url.clone(), cfg.topics());

        let node_task = tokio::spawn(node.run(shutdown_rx.clone()));
        let client_result = client.run(shutdown_rx).await;

        // The client is gone; stop the node whatever the reason.
        node_task.abort();
        match node_task.await {
            Ok(result) => result?,
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(ScanError::Channel(format!("avoidance node task failed: {e}"))),
        }

        info!(
            cycles = pipeline.cycles()?,
            window = %pipeline.window_size()?,
            "scanguard stopped"
        );
        client_result
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner / usage
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║              SCANGUARD               ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "ScanGuard".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Lidar sector collision guard");
    println!();
}

fn print_usage() {
    println!("{}", "Usage:".bold());
    println!("  scanguard [run]           connect to rosbridge and guard until Ctrl-C");
    println!("  scanguard replay <file>   replay a rosbridge capture, print /collision frames");
    println!("  scanguard init-config     write ~/.scanguard/config.toml with defaults");
    println!("  scanguard help            show this message");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_run() {
        assert_eq!(parse_args(&[]), Ok(Command::Run));
        assert_eq!(parse_args(&args(&["run"])), Ok(Command::Run));
    }

    #[test]
    fn replay_requires_a_path() {
        assert_eq!(
            parse_args(&args(&["replay", "scan.ndjson"])),
            Ok(Command::Replay("scan.ndjson".to_string()))
        );
        assert!(parse_args(&args(&["replay"])).is_err());
    }

    #[test]
    fn help_aliases() {
        for flag in ["help", "-h", "--help"] {
            assert_eq!(parse_args(&args(&[flag])), Ok(Command::Help));
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_args(&args(&["fly"])).unwrap_err().contains("fly"));
    }
}
