//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    capability::BackendId,
    config::PipelineConfig,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a [`PipelineConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or defaults) and apply `--format` / `--quality`
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let mut config = match &cli.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(format) = cli.format {
            config.conversion.encoding_format = format.mime_type().to_string();
        }
        if let Some(quality) = cli.quality {
            config.conversion.quality = Some(quality);
        }
        if let Some(backend) = &cli.backend {
            config.default_backend = backend.parse().context("Invalid backend")?;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// The backend to plan for
    pub(crate) fn backend(cli: &Cli, config: &PipelineConfig) -> Result<BackendId> {
        match &cli.backend {
            Some(backend) => backend.parse::<BackendId>().context("Invalid backend"),
            None => Ok(config.default_backend),
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(backend) = &cli.backend {
            backend
                .parse::<BackendId>()
                .context("Invalid backend")?;
        }

        if let Some(quality) = cli.quality {
            if !(0.0..=1.0).contains(&quality) {
                anyhow::bail!("Quality must be between 0.0 and 1.0, got {}", quality);
            }
        }

        if let Some(config) = &cli.config {
            if !config.is_file() {
                anyhow::bail!("Config file not found: {}", config.display());
            }
        }

        Ok(())
    }
}
