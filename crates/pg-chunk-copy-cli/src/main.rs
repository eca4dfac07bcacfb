//! pg-chunk-copy CLI - adaptive chunked relation copy for PostgreSQL.

use clap::{Parser, Subcommand};
use pg_chunk_copy::{
    Config, CopyError, JsonLineSink, PgSourceReader, PgTargetWriter, ProgressSink, RunStatus,
    SourceReader, TracingSink, TransferOrchestrator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-chunk-copy")]
#[command(about = "Adaptive chunked relation copy for PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Print progress events as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transfer
    Run {
        /// Probe and plan without copying any rows
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare source and target row counts
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CopyError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_token = setup_signal_handler();

    match cli.command {
        Commands::Run { dry_run } => {
            let reader = PgSourceReader::connect(&config.source).await?;
            let writer = PgTargetWriter::connect(&config.target).await?;

            let sink: Box<dyn ProgressSink> = if cli.progress {
                Box::new(JsonLineSink)
            } else {
                Box::new(TracingSink)
            };

            let orchestrator = TransferOrchestrator::new(reader, writer, sink);
            let summary = orchestrator.run(Some(cancel_token), dry_run).await?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                let headline = match (dry_run, summary.status) {
                    (true, _) => "Dry run completed!",
                    (_, RunStatus::Cancelled) => "Transfer cancelled.",
                    _ => "Transfer completed!",
                };
                println!("\n{}", headline);
                println!("  Run ID: {}", summary.run_id);
                println!("  Duration: {:.2}s", summary.duration_seconds);
                println!(
                    "  Pages: {}/{}",
                    summary.pages_copied, summary.pages_planned
                );
                println!("  Rows: {}/{}", summary.rows_copied, summary.total_rows);
                println!("  Throughput: {} rows/sec", summary.rows_per_second);
            }

            if summary.status == RunStatus::Cancelled {
                // Conventional exit code for SIGINT-driven termination.
                return Ok(ExitCode::from(130));
            }
        }

        Commands::Validate => {
            let reader = PgSourceReader::connect(&config.source).await?;
            let writer = PgTargetWriter::connect(&config.target).await?;

            let source_count = reader.count().await.map_err(CopyError::probe)?;
            let target_count = writer.count().await.map_err(CopyError::probe)?;

            if source_count == target_count {
                println!("Validation passed: {} rows on both sides", source_count);
            } else {
                println!(
                    "Validation FAILED: source={} target={}",
                    source_count, target_count
                );
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::HealthCheck => {
            let mut healthy = true;

            let start = Instant::now();
            match PgSourceReader::connect(&config.source).await {
                Ok(_) => println!("  Source: OK ({}ms)", start.elapsed().as_millis()),
                Err(e) => {
                    healthy = false;
                    println!("  Source: FAILED - {}", e);
                }
            }

            let start = Instant::now();
            match PgTargetWriter::connect(&config.target).await {
                Ok(_) => println!("  Target: OK ({}ms)", start.elapsed().as_millis()),
                Err(e) => {
                    healthy = false;
                    println!("  Target: FAILED - {}", e);
                }
            }

            println!(
                "\n  Overall: {}",
                if healthy { "HEALTHY" } else { "UNHEALTHY" }
            );

            if !healthy {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown. The returned token is checked
/// between pages; the page in flight finishes its write before the run stops.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    // SIGINT handler (Ctrl-C)
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing the current page before exiting...");
        token_int.cancel();
    });

    // SIGTERM handler (Kubernetes etc.)
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing the current page before exiting...");
        token_term.cancel();
    });

    cancel_token
}

/// Signal handler for Windows (only Ctrl-C).
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Finishing the current page before exiting...");
        token.cancel();
    });

    cancel_token
}
