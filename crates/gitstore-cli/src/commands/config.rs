//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use gitstore_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store_root": config.store_root,
                    "server_host": config.server_host,
                    "authority": config.server_host.authority(),
                    "system_name": config.system_name,
                    "lock_attempts": config.lock_attempts,
                    "lock_backoff_ms": config.lock_backoff_ms,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.store_root.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  store_root:      {}", config.store_root.display());
            println!(
                "  server_host:     {}://{}:{}",
                config.server_host.scheme, config.server_host.host, config.server_host.port
            );
            println!("  system_name:     {}", config.system_name);
            println!("  lock_attempts:   {}", config.lock_attempts);
            println!("  lock_backoff_ms: {}", config.lock_backoff_ms);
            println!(
                "  log_file:        {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Commit identities end in: @{}", config.server_host.authority());
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Update one configuration key from its string form
fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "store_root" => {
            config.store_root = value.into();
        }
        "host" => {
            config.server_host.host = value.to_string();
        }
        "port" => {
            config.server_host.port = value
                .parse()
                .context("Invalid value for port. Use a number from 0 to 65535.")?;
        }
        "scheme" => {
            config.server_host.scheme = value.to_string();
        }
        "system_name" => {
            if value.is_empty() {
                bail!("system_name cannot be empty");
            }
            config.system_name = value.to_string();
        }
        "lock_attempts" => {
            config.lock_attempts = value
                .parse()
                .context("Invalid value for lock_attempts. Use a positive number.")?;
        }
        "lock_backoff_ms" => {
            config.lock_backoff_ms = value
                .parse()
                .context("Invalid value for lock_backoff_ms. Use a number of milliseconds.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: store_root, host, port, scheme, system_name, \
                 lock_attempts, lock_backoff_ms, log_file",
                key
            );
        }
    }
    Ok(())
}
