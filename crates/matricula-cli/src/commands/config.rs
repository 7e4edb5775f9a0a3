//! Config command - View and manage Matricula configuration
//!
//! Provides the `matricula config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use matricula_core::config::Config;
use matricula_core::ports::NotificationPriority;
use tracing::info;

use crate::context::LoadedConfig;
use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "transitions.max_conflict_retries")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(loaded, format),
            ConfigCommand::Set { key, value } => self.execute_set(loaded, key, value, format),
            ConfigCommand::Validate => self.execute_validate(loaded, format),
            ConfigCommand::Path => self.execute_path(loaded, format),
        }
    }

    fn execute_show(&self, loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        info!(config_path = %loaded.path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(&loaded.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            let source = if loaded.from_file {
                loaded.path.display().to_string()
            } else {
                "defaults".to_string()
            };
            formatter.success(&format!("Configuration ({})", source));
            formatter.info("");

            let yaml = serde_yaml::to_string(&loaded.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_set(
        &self,
        loaded: &LoadedConfig,
        key: &str,
        value: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = loaded.config.clone();

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if !format.is_json() {
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<36} - {}", name, help));
                }
            }
            return Err(e.context(format!("Failed to set '{}'", key)));
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::bail!("Invalid value for '{}': {}", key, messages.join("; "));
        }

        config
            .save(&loaded.path)
            .with_context(|| format!("Failed to write {}", loaded.path.display()))?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": loaded.path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", loaded.path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        if !loaded.from_file {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": loaded.path.display().to_string(),
                    "errors": [],
                    "note": "Configuration file not found. Using defaults.",
                }));
            } else {
                formatter.info(&format!(
                    "Configuration file not found at {}",
                    loaded.path.display()
                ));
                formatter.info("Using default configuration. Run 'matricula config set <key> <value>' to create one.");
            }
            return Ok(());
        }

        info!(config_path = %loaded.path.display(), "Validating configuration");
        let errors = loaded.config.validate();

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": loaded.path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", loaded.path.display()));
        } else {
            formatter.info(&format!("File: {}", loaded.path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration has {} error{}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            );
        }
        Ok(())
    }

    fn execute_path(&self, loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "config_path": loaded.path.display().to_string(),
                "exists": loaded.from_file,
            }));
        } else {
            println!("{}", loaded.path.display());
        }
        Ok(())
    }
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("database.path", "SQLite database file"),
    ("database.max_connections", "Pooled connections"),
    ("database.busy_timeout_secs", "Seconds to wait on a locked database"),
    ("transitions.max_conflict_retries", "Retries after a version conflict"),
    ("transitions.durable_reconciliation", "true|false"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.format", "pretty|json"),
    ("alerts.enabled", "true|false"),
    ("alerts.min_priority", "low|normal|high|critical"),
];

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- database ---
        "database.path" => {
            config.database.path = PathBuf::from(value);
        }
        "database.max_connections" => {
            config.database.max_connections = value
                .parse::<u32>()
                .context("Expected a positive integer")?;
        }
        "database.busy_timeout_secs" => {
            config.database.busy_timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }

        // --- transitions ---
        "transitions.max_conflict_retries" => {
            config.transitions.max_conflict_retries = value
                .parse::<u32>()
                .context("Expected a positive integer")?;
        }
        "transitions.durable_reconciliation" => {
            config.transitions.durable_reconciliation = value
                .parse::<bool>()
                .context("Expected true or false")?;
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }
        "logging.format" => {
            config.logging.format = value.to_string();
        }

        // --- alerts ---
        "alerts.enabled" => {
            config.alerts.enabled = value.parse::<bool>().context("Expected true or false")?;
        }
        "alerts.min_priority" => {
            config.alerts.min_priority = value.parse::<NotificationPriority>()?;
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
