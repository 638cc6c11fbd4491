//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, LoadedConfig};
use contracts::ClientType;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    book_name: Option<String>,
    box_name: Option<String>,
    client_name: String,
    client: ClientType,
    read_buffer_size: usize,
    batch_buffer_size: usize,
    settings_file: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config_dir = %args.config_dir.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_dir = args.config_dir.display().to_string();

    if !args.config_dir.is_dir() {
        return ValidationResult {
            valid: false,
            config_dir,
            error: Some(format!("Directory not found: {}", args.config_dir.display())),
            warnings: None,
            summary: None,
        };
    }

    match ConfigLoader::load_from_dir(&args.config_dir) {
        Ok(loaded) => {
            let warnings = collect_warnings(&loaded);
            ValidationResult {
                valid: true,
                config_dir,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    book_name: loaded.box_config.book_name.clone(),
                    box_name: loaded.box_config.box_name.clone(),
                    client_name: loaded.settings.delivery.name.clone(),
                    client: loaded.settings.delivery.client,
                    read_buffer_size: loaded.settings.queues.read_buffer_size,
                    batch_buffer_size: loaded.settings.queues.batch_buffer_size,
                    settings_file: loaded
                        .settings_path
                        .as_ref()
                        .map(|path| path.display().to_string()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_dir,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(loaded: &LoadedConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if loaded.box_config.book_name.is_none() {
        warnings.push("bookName is not set - runs must pass --book".to_string());
    }
    if loaded.box_config.box_name.is_none() {
        warnings.push("boxName is not set - runs must pass --scope".to_string());
    }
    if loaded.settings_path.is_none() {
        warnings.push("No uploader settings file - batches are only logged".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_dir);

        if let Some(ref summary) = result.summary {
            println!(
                "\n  Book: {}",
                summary.book_name.as_deref().unwrap_or("<unset>")
            );
            println!(
                "  Scope: {}",
                summary.box_name.as_deref().unwrap_or("<unset>")
            );
            println!("  Client: {} ({:?})", summary.client_name, summary.client);
            println!(
                "  Queues: records={}, batches={}",
                summary.read_buffer_size, summary.batch_buffer_size
            );
            if let Some(ref file) = summary.settings_file {
                println!("  Settings file: {}", file);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_dir);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
