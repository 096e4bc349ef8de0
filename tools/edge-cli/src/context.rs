//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use edge_sdk::edge_core::Environment;
use edge_sdk::edge_executor::PipelineConfig;

use crate::config::CliConfig;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Where the config was loaded from, if anywhere.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let (config, config_path) = if let Some(path) = config_path {
            (CliConfig::load(path)?, Some(PathBuf::from(path)))
        } else {
            // Try to find config in current directory or parent directories
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            match Self::find_config(&cwd)? {
                Some((config, path)) => (config, Some(path)),
                None => (CliConfig::default(), None),
            }
        };

        if let Some(path) = &config_path {
            output.debug(&format!("Using config {}", path.display()));
        }

        Ok(Self {
            config,
            config_path,
            output,
        })
    }

    /// Find config file in directory tree.
    ///
    /// A config that exists but fails to parse is an error, not a miss.
    fn find_config(start: &Path) -> Result<Option<(CliConfig, PathBuf)>> {
        let config_names = ["edge.toml", ".edge.toml", "edge.json"];

        let mut current = start.to_path_buf();
        loop {
            for name in &config_names {
                let config_path = current.join(name);
                if config_path.exists() {
                    let config = CliConfig::load(&config_path.to_string_lossy())?;
                    return Ok(Some((config, config_path)));
                }
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Build the effective pipeline config: defaults, then environment
    /// variables, then the config file, then `env_override`.
    pub fn pipeline_config(&self, env_override: Option<&str>) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env().context("Invalid EDGE_* environment")?;
        self.config.apply(&mut config)?;

        if let Some(env) = env_override {
            config.environment = env
                .parse::<Environment>()
                .with_context(|| format!("Invalid --env value: {}", env))?;
        }

        Ok(config)
    }
}
