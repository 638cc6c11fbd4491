//! `run` command implementation.

use anyhow::{Context, Result};
use chrono::Utc;
use config_loader::{ConfigLoader, LoadedConfig};
use contracts::{BatchingPolicy, QueueConfig};
use observability::{TimeCollector, Timer};
use tracing::{info, warn, Level};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config_dir = %args.config_dir.display(), "Loading configuration");

    let loaded = ConfigLoader::load_from_dir(&args.config_dir).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config_dir.display()
        )
    })?;

    let pipeline_config = build_pipeline_config(args, &loaded)?;

    info!(
        events_file = %pipeline_config.events_file.display(),
        book = %pipeline_config.book,
        scope = %pipeline_config.scope,
        client = ?loaded.settings.delivery.client,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&pipeline_config, &loaded);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let client = dispatcher::create_client(&loaded.settings.delivery)
        .await
        .context("Failed to create delivery client")?;

    let mut pipeline = Pipeline::new(pipeline_config, client);
    let mut global = TimeCollector::new(Level::INFO);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(stats) => {
                    global.put(stats.duration);
                    global.report("Global time (record/sec)", stats.records_sent);
                    info!(
                        records = stats.records_sent,
                        batches = stats.batches_sent,
                        duration_secs = stats.duration.as_secs_f64(),
                        records_per_sec = format!("{:.2}", stats.records_per_sec()),
                        "Pipeline completed successfully"
                    );

                    // Print detailed statistics
                    stats.print_summary();
                }
                Err(failure) => {
                    failure.stats.print_summary();
                    return Err(failure).context("Pipeline execution failed");
                }
            }
        }
        signal = shutdown_signal => {
            warn!(signal, "Received shutdown signal, stopping pipeline...");
            return Err(CliError::interrupted(signal).into());
        }
    }

    info!("Event uploader finished");
    Ok(())
}

/// Resolve CLI arguments against the loaded configuration
fn build_pipeline_config(args: &RunArgs, loaded: &LoadedConfig) -> Result<PipelineConfig> {
    let book = args
        .book
        .clone()
        .or_else(|| loaded.box_config.book_name.clone())
        .ok_or_else(|| CliError::missing_option("book", "bookName"))?;
    let scope = args
        .scope
        .clone()
        .or_else(|| loaded.box_config.box_name.clone())
        .ok_or_else(|| CliError::missing_option("scope", "boxName"))?;

    let policy = BatchingPolicy::new(args.batch_count, args.batch_size)?;

    let defaults = loaded.settings.queues;
    let queues = QueueConfig {
        read_buffer_size: args.read_buffer_size.unwrap_or(defaults.read_buffer_size),
        batch_buffer_size: args.batch_buffer_size.unwrap_or(defaults.batch_buffer_size),
    };

    let root_label = args
        .root_label
        .clone()
        .unwrap_or_else(|| format!("Root event {}", Utc::now().to_rfc3339()));

    Ok(PipelineConfig {
        events_file: args.events_file.clone(),
        book,
        scope,
        root_label,
        policy,
        queues,
    })
}

/// Wait for Ctrl+C or SIGTERM, returning the signal name
async fn setup_shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &PipelineConfig, loaded: &LoadedConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Input:");
    println!("  Events file: {}", config.events_file.display());
    println!("\nRun root:");
    println!("  Book: {}", config.book);
    println!("  Scope: {}", config.scope);
    println!("  Label: {}", config.root_label);
    println!("\nBatching:");
    println!("  Max records: {}", config.policy.max_count());
    println!("  Max size (bytes): {}", config.policy.max_size_bytes());
    println!("\nQueues:");
    println!("  Records: {}", config.queues.read_buffer_size);
    println!("  Batches: {}", config.queues.batch_buffer_size);
    println!("\nDelivery:");
    println!(
        "  {} ({:?})",
        loaded.settings.delivery.name, loaded.settings.delivery.client
    );
    if let Some(ref path) = loaded.settings_path {
        println!("  Settings file: {}", path.display());
    }
    println!();
}
