use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use stampede::config::{Granularity, RunnerSettings};
use stampede::events::EventBus;
use stampede::runner::{ParallelController, RunMode};
use stampede::summary::print_summary;

/// Parallel runner for behavior-style test suites.
///
/// Runs feature files (or single scenarios) across isolated worker
/// environments and remembers failures for `--rerun`.
#[derive(Parser, Debug)]
#[command(name = "stampede", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "stampede.toml")]
    config: PathBuf,

    /// Re-run only the failures recorded by the previous run.
    #[arg(long)]
    rerun: bool,

    /// Override the features directory from the configuration.
    #[arg(long)]
    features: Option<PathBuf>,

    /// Cap the number of concurrent workers.
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Override the rerun cache location.
    #[arg(long)]
    rerun_cache: Option<PathBuf>,

    /// Dispatch one scenario per worker instead of one feature file.
    #[arg(long)]
    scenarios: bool,

    /// Suppress the end-of-run summary.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let mut settings = RunnerSettings::load(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;

    if let Some(features) = cli.features {
        settings.features_dir = features;
    }
    if cli.max_concurrency.is_some() {
        settings.max_concurrency = cli.max_concurrency;
    }
    if let Some(cache) = cli.rerun_cache {
        settings.rerun_cache = Some(cache);
    }
    if cli.scenarios {
        settings.granularity = Granularity::Scenario;
    }

    let base_dir = std::env::current_dir().context("resolving working directory")?;
    let config = settings.into_runner_config(base_dir)?;

    let mut events = EventBus::new();
    events.on_worker_created(|event| {
        debug!(spec = %event.spec(), slot = event.slot_index, "worker created");
        Ok(())
    });
    events.on_worker_finished(|event| {
        if !event.success {
            warn!(spec = %event.spec, code = ?event.exit_code, "specification failed");
        }
        Ok(())
    });

    let controller = ParallelController::from_config(config, events);

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; letting in-flight workers finish");
            stop.stop();
        }
    });

    let mode = if cli.rerun { RunMode::Rerun } else { RunMode::Full };
    let summary = controller.run(mode).await?;
    print_summary(&summary, cli.quiet);

    Ok(summary.exit_code() as u8)
}
