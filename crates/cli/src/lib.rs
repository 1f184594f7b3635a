// Copyright 2025 Benchdash Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for benchdash.
//!
//! Reads benchmark artifacts from a report directory and launches benchmark
//! runs in the foreground through the same supervisor the dashboard service
//! uses.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use benchdash_core::{RunConfig, RunState, RunSupervisor, SupervisorConfig};
use benchdash_reports::{markdown, ReportStore, DEFAULT_HISTORY_LIMIT};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Default report directory, relative to the working directory.
pub const DEFAULT_REPORTS_DIR: &str = "../benchmarks";

/// Default orchestration root, relative to the working directory.
pub const DEFAULT_WORKSPACE_DIR: &str = "..";

/// benchdash CLI.
#[derive(Parser, Debug)]
#[command(name = "benchdash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output, including the benchmark's own output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Report directory argument shared by the read-only commands.
#[derive(Args, Debug, Clone)]
pub struct DirArgs {
    /// Directory holding benchmark artifacts.
    #[arg(short, long, env = "BENCHDASH_REPORTS_DIR", default_value = DEFAULT_REPORTS_DIR)]
    pub dir: PathBuf,
}

/// Output format for `summary`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON: records, count and aggregate metrics.
    Json,
    /// Markdown report.
    Markdown,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print all records with their aggregate metrics.
    Summary {
        #[command(flatten)]
        dir: DirArgs,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// List runs, newest first.
    Runs {
        #[command(flatten)]
        dir: DirArgs,
    },

    /// List raw artifact files, newest first.
    Files {
        #[command(flatten)]
        dir: DirArgs,
    },

    /// Show the latest records as a compact history.
    History {
        #[command(flatten)]
        dir: DirArgs,

        /// Number of entries.
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Show the newest record and the newest run summary.
    Latest {
        #[command(flatten)]
        dir: DirArgs,
    },

    /// Launch a benchmark run and wait for it to finish.
    ///
    /// Ctrl-C stops the run gracefully. Exits non-zero unless the run
    /// completes successfully.
    Run(RunArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Orchestration root the benchmark runs in.
    #[arg(short, long, env = "BENCHDASH_WORKSPACE", default_value = DEFAULT_WORKSPACE_DIR)]
    pub workspace: PathBuf,

    /// Scenario name; unknown names are passed through.
    #[arg(short, long, default_value = "single-client")]
    pub scenario: String,

    /// Number of clients.
    #[arg(long, default_value_t = 1)]
    pub num_clients: u32,

    /// Number of rounds.
    #[arg(long, default_value_t = 1)]
    pub rounds: u32,

    /// Delay between client launches, ms.
    #[arg(long, default_value_t = 0)]
    pub client_delay_ms: u64,

    /// Maximum concurrently running clients.
    #[arg(long, default_value_t = 1)]
    pub max_concurrent: u32,

    /// Server URL handed to the benchmark.
    #[arg(long)]
    pub server_url: Option<String>,
}

impl RunArgs {
    /// Build a validated [`RunConfig`].
    pub fn to_run_config(&self) -> Result<RunConfig> {
        let mut builder = RunConfig::builder()
            .scenario(&self.scenario)
            .num_clients(self.num_clients)
            .num_rounds(self.rounds)
            .client_delay_ms(self.client_delay_ms)
            .max_concurrent(self.max_concurrent);
        if let Some(url) = &self.server_url {
            builder = builder.server_url(url);
        }
        Ok(builder.build()?)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the CLI with the process arguments.
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the command fails or the
/// launched benchmark does not complete successfully.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Summary { dir, format } => {
            let store = ReportStore::new(dir.dir);
            println!("{}", render_summary(&store, format)?);
            Ok(())
        }
        Commands::Runs { dir } => print_runs(&ReportStore::new(dir.dir)),
        Commands::Files { dir } => print_files(&ReportStore::new(dir.dir)),
        Commands::History { dir, limit } => print_history(&ReportStore::new(dir.dir), limit),
        Commands::Latest { dir } => {
            println!("{}", render_latest(&ReportStore::new(dir.dir))?);
            Ok(())
        }
        Commands::Run(args) => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(run_benchmark(args))
        }
    }
}

/// Render all records of `store` in `format`.
pub fn render_summary(store: &ReportStore, format: OutputFormat) -> Result<String> {
    let listing = store
        .list_records()
        .with_context(|| format!("Failed to read reports from {}", store.dir().display()))?;

    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&listing)?),
        OutputFormat::Markdown => Ok(markdown::generate_summary(&listing.benchmarks)),
    }
}

/// Render the newest record and run summary of `store`.
///
/// # Errors
///
/// Fails when the report directory cannot be read or holds neither records
/// nor summaries.
pub fn render_latest(store: &ReportStore) -> Result<String> {
    let latest = store
        .latest()
        .with_context(|| format!("Failed to read reports from {}", store.dir().display()))?;
    if latest.is_empty() {
        bail!("No benchmark data found in {}", store.dir().display());
    }

    let mut out = String::new();
    if let Some(record) = &latest.record {
        out.push_str(&format!(
            "{} {} ({})\n",
            "Latest".green().bold(),
            record.session_id,
            record.filename
        ));
        out.push_str(&format!("  Scenario:        {}\n", record.scenario));
        out.push_str(&format!(
            "  Proof time:      {:.2} ms\n",
            record.zkp_metrics.proof_generation_time_ms
        ));
        out.push_str(&format!(
            "  Verify time:     {:.2} ms\n",
            record.zkp_metrics.proof_verification_time_ms
        ));
        out.push_str(&format!(
            "  Training time:   {:.2} ms\n",
            record.training_metrics.training_time_ms
        ));
        out.push_str(&format!(
            "  Final loss:      {:.4}\n",
            record.training_metrics.final_loss
        ));
        out.push_str(&format!(
            "  Proof size:      {} B\n",
            record.zkp_metrics.proof_size_bytes
        ));
    }
    if let (Some(file), Some(text)) = (&latest.summary_file, &latest.summary) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("{} {}\n", "Summary".green().bold(), file.name));
        out.push_str(text.trim_end());
    }
    Ok(out.trim_end().to_string())
}

fn print_runs(store: &ReportStore) -> Result<()> {
    let runs = store.list_runs()?;
    if runs.is_empty() {
        println!("No runs found in {}", store.dir().display());
        return Ok(());
    }

    println!(
        "{:<38} {:<26} {:<20} {:>7} {:>7}",
        "RUN ID".bold(),
        "SCENARIO".bold(),
        "STARTED".bold(),
        "CLIENTS".bold(),
        "RECORDS".bold()
    );
    for run in &runs {
        let started = run
            .start_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<26} {:<20} {:>7} {:>7}",
            run.run_id,
            run.scenario.cyan(),
            started,
            run.num_clients,
            run.record_count
        );
    }
    println!("\n{} runs", runs.len());
    Ok(())
}

fn print_files(store: &ReportStore) -> Result<()> {
    let files = store.list_files()?;
    for file in &files {
        println!(
            "{:<48} {:>10} {}",
            file.name,
            file.size,
            file.modified.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("\n{} files in {}", files.len(), store.dir().display());
    Ok(())
}

fn print_history(store: &ReportStore, limit: usize) -> Result<()> {
    let history = store.history(limit)?;

    println!(
        "{:<38} {:<20} {:>10} {:>14} {:>14} {:>10}",
        "SESSION".bold(),
        "STARTED".bold(),
        "FINAL LOSS".bold(),
        "TRAINING (ms)".bold(),
        "ZKP (ms)".bold(),
        "PROOF (B)".bold()
    );
    for entry in &history {
        let started = entry
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<20} {:>10.4} {:>14.2} {:>14.2} {:>10}",
            entry.session_id,
            started,
            entry.final_loss,
            entry.training_time,
            entry.total_zkp_time,
            entry.proof_size
        );
    }
    Ok(())
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_benchmark(args: RunArgs) -> Result<()> {
    let config = args.to_run_config()?;
    let supervisor = RunSupervisor::new(SupervisorConfig::new(&args.workspace));
    let mut transitions = supervisor.subscribe();

    let accepted = supervisor.start(config).await?;
    println!("{} {}", "Running".green().bold(), accepted.command.join(" "));

    let pb = spinner();
    pb.set_message("Benchmark running...");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    loop {
        tokio::select! {
            transition = transitions.recv() => match transition {
                Ok(t) if t.run_id == accepted.run_id => {
                    pb.set_message(t.message);
                    if t.to == RunState::Idle {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    if !supervisor.status().await.running {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !stopping => {
                stopping = true;
                pb.set_message("Stopping benchmark...");
                let supervisor = supervisor.clone();
                tokio::spawn(async move {
                    if let Err(e) = supervisor.stop().await {
                        tracing::warn!(error = %e, "Stop request failed");
                    }
                });
            }
        }
    }

    let outcome = supervisor
        .status()
        .await
        .last_outcome
        .filter(|outcome| outcome.run_id == accepted.run_id)
        .context("Run finished without an outcome")?;

    if outcome.is_success() {
        pb.finish_with_message(format!("{}  {}", "done".green().bold(), outcome.message));
    } else {
        pb.finish_with_message(format!("{}  {}", "fail".red().bold(), outcome.message));
        if !outcome.stderr.is_empty() {
            eprintln!("{}", outcome.stderr.trim_end());
        }
    }
    println!(
        "Duration: {:.1}s",
        Duration::from_millis(outcome.duration_ms).as_secs_f64()
    );

    if !outcome.is_success() {
        bail!("{}", outcome.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_to_config() {
        let cli = Cli::try_parse_from([
            "benchdash",
            "run",
            "--scenario",
            "multi-client-concurrent",
            "--num-clients",
            "4",
            "--rounds",
            "3",
            "--client-delay-ms",
            "250",
            "--max-concurrent",
            "2",
            "--server-url",
            "http://localhost:8080",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_run_config().unwrap();
        assert_eq!(config.scenario, "multi-client-concurrent");
        assert_eq!(config.num_clients, 4);
        assert_eq!(config.num_rounds, 3);
        assert_eq!(config.client_delay_ms, 250);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.server_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_invalid_run_args_rejected() {
        let cli = Cli::try_parse_from(["benchdash", "run", "--num-clients", "0"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.to_run_config().is_err());
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["benchdash", "history", "--dir", "/tmp/reports"]).unwrap();
        match cli.command {
            Commands::History { dir, limit } => {
                assert_eq!(limit, DEFAULT_HISTORY_LIMIT);
                assert_eq!(dir.dir, PathBuf::from("/tmp/reports"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_render_latest() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("benchmark_single_1.json"),
            r#"{"session_id": "s1", "zkp_metrics": {"proof_generation_time_ms": 42}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("benchmark_summary_1.txt"), "Total clients: 1\n").unwrap();

        let rendered = render_latest(&ReportStore::new(dir.path())).unwrap();
        assert!(rendered.starts_with("Latest s1 (benchmark_single_1.json)"));
        assert!(rendered.contains("Proof time:      42.00 ms"));
        assert!(rendered.contains("Summary benchmark_summary_1.txt"));
        assert!(rendered.ends_with("Total clients: 1"));

        let empty = TempDir::new().unwrap();
        assert!(render_latest(&ReportStore::new(empty.path())).is_err());

        let cli = Cli::try_parse_from(["benchdash", "latest", "--dir", "/tmp/reports"]).unwrap();
        assert!(matches!(cli.command, Commands::Latest { .. }));
    }

    #[test]
    fn test_render_summary_formats() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("benchmark_single_1.json"),
            r#"{"session_id": "s1", "zkp_metrics": {"proof_generation_time_ms": 42}}"#,
        )
        .unwrap();
        let store = ReportStore::new(dir.path());

        let json: serde_json::Value =
            serde_json::from_str(&render_summary(&store, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["metrics"]["avg_proof_time"], 42.0);
        assert_eq!(json["benchmarks"][0]["scenario"], "single-client");

        let markdown = render_summary(&store, OutputFormat::Markdown).unwrap();
        assert!(markdown.starts_with("# Benchmark Summary"));
        assert!(markdown.contains("| s1 |"));
    }
}
