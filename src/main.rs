// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::Level;

use segcat::config::{Config, RunConfig};
use segcat::error::ConcatError;
use segcat::fetch::HttpFetcher;
use segcat::logging::{self, LogLevel};
use segcat::pipeline::{Pipeline, PipelineOptions, RunContext, RunSummary, SegmentProgress};
use segcat::uri::BaseMode;
use segcat::utils::format_bytes;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process exit codes.
mod exit_codes {
    /// Every segment was appended
    pub const SUCCESS: i32 = 0;
    /// Missing inputs, unopenable output, or a failed run
    pub const ERROR: i32 = 1;
    /// Interrupted by SIGINT/SIGTERM
    pub const INTERRUPTED: i32 = 130;
}

use exit_codes::*;

/// segcat - download every segment listed in a manifest into one file.
#[derive(Parser)]
#[command(name = "segcat")]
#[command(version = VERSION)]
#[command(about = "Fetch a segment manifest and concatenate its segments, in order, into one file.")]
#[command(long_about = "segcat - sequential segment concatenation\n\n\
    Basic use:           segcat --url http://host/path/index.m3u8 --output out.ts\n\
    Host-relative list:  segcat -u http://host/path/index.m3u8 -o out.ts --base authority\n\
    Quiet logs:          segcat -u ... -o ... --level warn\n\n\
    Lines starting with '#' are comments. Every other line is fetched in order\n\
    and appended to the output without any framing.")]
struct Cli {
    /// Manifest address
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// Output file (created or truncated)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// How relative entries are resolved: directory, authority or auto
    #[arg(short = 'b', long, value_parser = clap::value_parser!(BaseMode))]
    base: Option<BaseMode>,

    /// Log level: debug, info, warn, error or fatal
    #[arg(short = 'l', long, value_parser = clap::value_parser!(LogLevel))]
    level: Option<LogLevel>,

    /// Per-fetch timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Config file (default: ~/.segcat/config.json when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Treat a corrupt gzip manifest as empty instead of failing
    #[arg(long)]
    lenient_decode: bool,

    /// Fetch blank manifest lines too (resolves to the bare base address)
    #[arg(long)]
    keep_empty: bool,

    /// Never show the progress bar
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Cli {
    /// Command line values as a config layer; unset flags stay `None`.
    fn as_config(&self) -> Config {
        Config {
            url: self.url.clone(),
            output: self.output.clone(),
            base_mode: self.base,
            log_level: self.level,
            timeout_secs: self.timeout,
            strict_decode: self.lenient_decode.then_some(false),
            skip_empty_entries: self.keep_empty.then_some(false),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    logging::init(config.log_level);
    tracing::debug!("segcat {} starting with {:?}", VERSION, config);

    let show_progress = !cli.quiet
        && io::stderr().is_terminal()
        && config.log_level.max_level() < Level::INFO;

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} Failed to create Tokio runtime: {}", "[✗]".red(), e);
            std::process::exit(ERROR);
        }
    };

    match runtime.block_on(run(&config, show_progress)) {
        Ok(summary) => {
            println!("{} {}", "[OK]".green(), summary.describe());
            std::process::exit(SUCCESS);
        }
        Err(e) => match e.downcast_ref::<ConcatError>() {
            Some(err) => exit_with(err),
            None => {
                eprintln!("{} {:#}", "[✗]".red(), e);
                std::process::exit(ERROR);
            }
        },
    }
}

fn load_config(cli: &Cli) -> Result<RunConfig, ConcatError> {
    let file = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    }
    .map_err(|e| ConcatError::Config(format!("{:#}", e)))?;

    file.merge(cli.as_config()).into_run_config()
}

async fn run(config: &RunConfig, show_progress: bool) -> Result<RunSummary> {
    let ctx = RunContext::from_config(config)?;
    let fetcher = HttpFetcher::with_timeout(config.fetch_timeout)?;
    let mut pipeline = Pipeline::new(fetcher, PipelineOptions::from(config));

    let bar = show_progress.then(progress_bar);
    let result = pipeline
        .run_until(ctx, shutdown_signal(), |p: &SegmentProgress| {
            if let Some(bar) = &bar {
                bar.set_length(p.total as u64);
                bar.set_position(p.index as u64 + 1);
                bar.set_message(format_bytes(p.total_bytes));
            }
        })
        .await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} segments, {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn exit_with(err: &ConcatError) -> ! {
    eprintln!("{}", err.report().red());
    let code = match err {
        ConcatError::Cancelled => INTERRUPTED,
        _ => ERROR,
    };
    std::process::exit(code);
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C only on non-Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            _ => {
                tracing::warn!("failed to install signal handlers, Ctrl+C will not stop cleanly");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping"),
            _ = sigint.recv() => tracing::info!("Received SIGINT (Ctrl+C), stopping"),
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("failed to install Ctrl+C handler");
            return std::future::pending().await;
        }
        tracing::info!("Received Ctrl+C, stopping");
    }
}
