// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ghrd: autoscaling daemon for GitHub Actions runners on Hetzner Cloud.
//!
//! Watches the repository's queued jobs, provisions one ephemeral server
//! per job, and deletes servers when their job is done. Three loops do
//! the work: scale-up, scale-down, and the API rate-limit watch.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;

use clap::Parser;
use ghr_config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

/// Autoscaling GitHub Actions runners on Hetzner Cloud.
#[derive(Parser, Debug)]
#[command(name = "ghrd", version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Also write logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn default_config_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".ghr/config.yaml"),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // Quiet the HTTP stack unless RUST_LOG asks for it.
    let base = "hyper=warn,reqwest=warn,rustls=warn";
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) => EnvFilter::new(format!("{base},{env}")),
        Err(_) => EnvFilter::new(format!("{base},info")),
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            // Keep the writer alive for the lifetime of the process.
            std::mem::forget(guard);
            registry
                .with(fmt::layer().with_target(true).with_ansi(false).with_writer(non_blocking))
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = init_logging(args.log_file.as_ref()) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, config = %args.config.display(), "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let terminate_timeout = config.terminate_timeout;

    info!(
        repository = %config.github_repository,
        max_runners = config.max_runners,
        workers = config.workers,
        recycle = config.recycle,
        "ghrd starting"
    );

    let started = match lifecycle::startup(config).await {
        Ok(started) => started,
        Err(err) => {
            error!(%err, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            error!(%err, "failed to install SIGTERM handler");
            started.terminate.set();
            lifecycle::shutdown(started, terminate_timeout).await;
            return ExitCode::FAILURE;
        }
    };

    // Clean stop on SIGTERM; interrupt and fatal loop errors exit 1.
    let exit = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            ExitCode::FAILURE
        }
        _ = sigterm.recv() => {
            info!("termination requested, shutting down");
            ExitCode::SUCCESS
        }
        _ = started.terminate.wait() => {
            error!("a control loop failed, shutting down");
            ExitCode::FAILURE
        }
    };

    started.terminate.set();
    lifecycle::shutdown(started, terminate_timeout).await;
    info!("ghrd stopped");
    exit
}
