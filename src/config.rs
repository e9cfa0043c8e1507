//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.codeswarm.toml` files.

use crate::agent::AgentKind;
use crate::models::Language;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".codeswarm.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Agent scheduling settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Request limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Visualization trace settings.
    #[serde(default)]
    pub visualization: VisualizationConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Agent scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-agent time limit in seconds.
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_seconds: u64,

    /// Identifiers of the agents to schedule.
    #[serde(default = "default_enabled_agents")]
    pub enabled_agents: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agent_timeout_seconds: default_agent_timeout(),
            enabled_agents: default_enabled_agents(),
        }
    }
}

impl OrchestratorConfig {
    /// Whether the agent with identifier `id` should be scheduled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled_agents.iter().any(|enabled| enabled == id)
    }
}

fn default_agent_timeout() -> u64 {
    30
}

fn default_enabled_agents() -> Vec<String> {
    AgentKind::ALL.iter().map(|kind| kind.id().to_string()).collect()
}

/// Request limits enforced before any agent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum code size in bytes.
    #[serde(default = "default_max_code_size")]
    pub max_code_size: usize,

    /// Languages accepted by the validator.
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<Language>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_code_size: default_max_code_size(),
            supported_languages: default_supported_languages(),
        }
    }
}

fn default_max_code_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_supported_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Visualization trace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Maximum number of frames in a sorting trace.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    crate::agent::visualizer::DEFAULT_MAX_STEPS
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.orchestrator.agent_timeout_seconds > 0,
            "orchestrator.agent_timeout_seconds must be greater than 0"
        );
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.codeswarm.toml` from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.orchestrator.agent_timeout_seconds = timeout;
        }

        if let Some(ref disabled) = args.disable {
            self.orchestrator
                .enabled_agents
                .retain(|id| !disabled.contains(id));
        }

        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
