use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use multiconvert_core::{
    build_engines, load_config, metrics, validate_config, Config, ConversionOrchestrator,
    ConversionRouter, QualityTier, RunEvent, RunOptions, RunState,
};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "multiconvert.toml";

#[derive(Parser)]
#[command(name = "multiconvert")]
#[command(about = "Convert files between formats, falling back across conversion engines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print Prometheus metrics when done
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files to another format
    Convert {
        /// Files to convert
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Target format (pdf, docx, mp3, png, ...)
        #[arg(short, long)]
        to: String,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Quality tier (low, medium, high, maximum)
        #[arg(short, long)]
        quality: Option<QualityTier>,
    },

    /// Show every engine and whether it is available
    Engines {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported conversions
    Formats {
        /// Only show conversions from this format
        #[arg(long)]
        from: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;

    let engines = build_engines(&config.engines).context("Failed to set up engines")?;
    info!("Registered {} engine(s)", engines.len());
    let router = Arc::new(ConversionRouter::new(engines));

    let outcome = match cli.command {
        Commands::Convert {
            files,
            to,
            out,
            quality,
        } => convert(&config, router, files, to, out, quality).await,
        Commands::Engines { json } => print_engines(&router, json).await,
        Commands::Formats { from } => {
            print_formats(&router, from.as_deref());
            Ok(())
        }
    };

    if cli.metrics {
        let registry = metrics::registry().context("Failed to register metrics")?;
        print!(
            "{}",
            metrics::render(&registry).context("Failed to render metrics")?
        );
    }

    outcome
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(Config::default());
            }
            default
        }
    };

    info!("Loading configuration from {:?}", path);
    load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
}

async fn convert(
    config: &Config,
    router: Arc<ConversionRouter>,
    files: Vec<PathBuf>,
    target_format: String,
    out: Option<PathBuf>,
    quality: Option<QualityTier>,
) -> Result<()> {
    let output_dir = out
        .or_else(|| config.orchestrator.default_output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let quality = quality.unwrap_or(config.orchestrator.default_quality);

    let orchestrator = ConversionOrchestrator::new(config.orchestrator.clone(), router);
    let mut events = orchestrator.subscribe();

    let started = orchestrator
        .start(
            files,
            RunOptions {
                output_dir,
                target_format,
                quality,
            },
        )
        .await
        .context("Failed to start conversion run")?;
    info!(
        "Queued {} job(s), skipped {} file(s)",
        started.accepted,
        started.skipped.len()
    );

    let mut last_percent = 0;
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RunEvent::JobStarted { index, input_path, .. }) => {
                    info!("[{}] {}", index + 1, input_path.display());
                }
                Ok(RunEvent::Progress { overall_percent, message, .. }) => {
                    if overall_percent > last_percent {
                        last_percent = overall_percent;
                        info!("{:>3}% {}", overall_percent, message);
                    }
                }
                Ok(RunEvent::JobFinished { index, status, message, .. }) => {
                    info!("[{}] {}: {}", index + 1, status, message);
                }
                Ok(RunEvent::RunFinished { .. }) => break,
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} progress event(s)", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = signal::ctrl_c(), if !interrupted => {
                warn!("Interrupted, stopping after the current job");
                interrupted = orchestrator.stop();
            }
        }
    }

    let summary = orchestrator.wait().await?;
    let status = orchestrator.status().await;

    for file in &status.skipped {
        println!(
            "{:<10} {}  {}",
            "skipped",
            file.path.display(),
            file.reason
        );
    }
    for job in &status.jobs {
        println!(
            "{:<10} {} -> {}  {}",
            job.status.as_str(),
            job.input_path.display(),
            job.output_path.display(),
            job.message.as_deref().unwrap_or("")
        );
    }
    println!("{}: {}", status.state, summary);

    if summary.failed > 0 {
        bail!("{} of {} job(s) failed", summary.failed, summary.total);
    }
    if status.state != RunState::Completed {
        bail!("run ended {}", status.state);
    }
    Ok(())
}

async fn print_engines(router: &ConversionRouter, json: bool) -> Result<()> {
    let statuses = router.engines_status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    for status in statuses {
        println!(
            "{:<12} {:<12} {:>3}  {:<13} {}",
            status.name,
            status.kind.to_string(),
            status.priority,
            if status.available {
                "available"
            } else {
                "unavailable"
            },
            status.description
        );
        if let Some(location) = status.location {
            println!("{:<12} location: {}", "", location);
        }
        if let Some(version) = status.version {
            println!("{:<12} version: {}", "", version);
        }
    }
    Ok(())
}

fn print_formats(router: &ConversionRouter, from: Option<&str>) {
    let matrix = router.matrix();
    let mut printed = 0;

    for (input, output) in matrix.pairs() {
        if from.is_some_and(|f| !f.trim_start_matches('.').eq_ignore_ascii_case(&input)) {
            continue;
        }
        let strategy = router.strategy(&input, &output);
        let engines: Vec<&str> = strategy.engines.iter().map(|e| e.engine.as_str()).collect();
        println!("{:>5} -> {:<5} {}", input, output, engines.join(", "));
        printed += 1;
    }

    if printed == 0 {
        match from {
            Some(format) => println!("No engine converts from {}", format),
            None => println!("No engines are enabled"),
        }
    }
}
