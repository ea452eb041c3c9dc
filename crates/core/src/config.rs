//! Configuration management for Grounded.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config files (.grounded/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with most state stored in `.grounded/`.
//! Pipeline policy (top-k, confidence threshold, timeouts) is resolved here once
//! and handed to the query pipeline as an immutable value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Providers with a working completion adapter.
pub const KNOWN_PROVIDERS: [&str; 1] = ["ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .grounded/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider used for answer generation
    pub provider: String,

    /// Model identifier used for answer generation
    pub model: String,

    /// Provider endpoint override
    pub endpoint: Option<String>,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Grounding pipeline policy
    pub pipeline: PipelineSettings,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,
}

/// Grounding pipeline settings from config.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Maximum number of chunks returned by retrieval
    pub top_k: usize,

    /// Minimum grounding confidence for an answer to be released
    pub confidence_threshold: f32,

    /// Chunks scoring below this similarity are not treated as evidence
    pub min_relevance_score: f32,

    /// Upper bound on a single generation call
    pub generation_timeout_secs: u64,

    /// Upper bound on a whole query (None = unbounded)
    pub query_deadline_secs: Option<u64>,

    /// Upper bound on the final audit write
    pub audit_timeout_ms: u64,

    /// Sampling temperature for answer generation
    pub temperature: f32,

    /// Maximum tokens to generate per answer
    pub max_tokens: u32,

    /// Prompt definition used for answer generation
    pub prompt_id: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            confidence_threshold: 0.7,
            min_relevance_score: 0.2,
            generation_timeout_secs: 60,
            query_deadline_secs: Some(120),
            audit_timeout_ms: 2000,
            temperature: 0.1,
            max_tokens: 512,
            prompt_id: "rag.grounded_answer".to_string(),
        }
    }
}

impl PipelineSettings {
    /// Check that every setting is inside its valid range.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::Config("pipeline.topK must be at least 1".to_string()));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "pipeline.confidenceThreshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.min_relevance_score) {
            return Err(AppError::Config(format!(
                "pipeline.minRelevanceScore must be within [0, 1], got {}",
                self.min_relevance_score
            )));
        }

        if self.generation_timeout_secs == 0 || self.audit_timeout_ms == 0 {
            return Err(AppError::Config(
                "pipeline timeouts must be greater than zero".to_string(),
            ));
        }

        if self.query_deadline_secs == Some(0) {
            return Err(AppError::Config(
                "pipeline.queryDeadlineSecs must be greater than zero".to_string(),
            ));
        }

        if self.prompt_id.trim().is_empty() {
            return Err(AppError::Config("pipeline.promptId cannot be empty".to_string()));
        }

        Ok(())
    }
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub model: String,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key: None,
            log_level: None,
            log_format: LogFormat::default(),
            verbose: false,
            no_color: false,
            pipeline: PipelineSettings::default(),
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `GROUNDED_WORKSPACE`: Override workspace path
    /// - `GROUNDED_CONFIG`: Path to config file
    /// - `GROUNDED_PROVIDER`: LLM provider
    /// - `GROUNDED_MODEL`: Model identifier
    /// - `GROUNDED_ENDPOINT`: Provider endpoint
    /// - `GROUNDED_API_KEY`: API key
    /// - `GROUNDED_TOP_K`: Retrieval top-k
    /// - `GROUNDED_CONFIDENCE_THRESHOLD`: Grounding confidence threshold
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use grounded_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration, preferring explicit workspace and config file
    /// paths (from command-line flags) over their environment variables.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("GROUNDED_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file
            .or_else(|| std::env::var("GROUNDED_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".grounded/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env()?;

        Ok(config)
    }

    /// Apply environment variable overrides on top of file settings.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(provider) = std::env::var("GROUNDED_PROVIDER") {
            self.provider = provider;
        }

        if let Ok(model) = std::env::var("GROUNDED_MODEL") {
            self.model = model;
        }

        if let Ok(endpoint) = std::env::var("GROUNDED_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }

        if let Ok(top_k) = std::env::var("GROUNDED_TOP_K") {
            self.pipeline.top_k = top_k.parse().map_err(|_| {
                AppError::Config(format!("GROUNDED_TOP_K is not a number: {}", top_k))
            })?;
        }

        if let Ok(threshold) = std::env::var("GROUNDED_CONFIDENCE_THRESHOLD") {
            self.pipeline.confidence_threshold = threshold.parse().map_err(|_| {
                AppError::Config(format!(
                    "GROUNDED_CONFIDENCE_THRESHOLD is not a number: {}",
                    threshold
                ))
            })?;
        }

        self.api_key = std::env::var("GROUNDED_API_KEY").ok();
        self.log_level = std::env::var("RUST_LOG").ok().or(self.log_level.take());

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model.clone();
                if provider_config.endpoint.is_some() {
                    result.endpoint = provider_config.endpoint.clone();
                }
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and files.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .grounded directory.
    pub fn grounded_dir(&self) -> PathBuf {
        self.workspace.join(".grounded")
    }

    /// Path of the SQLite database holding finalized interactions.
    pub fn interactions_db_path(&self) -> PathBuf {
        self.grounded_dir().join("interactions.sqlite")
    }

    /// Ensure the .grounded directory exists.
    pub fn ensure_grounded_dir(&self) -> AppResult<()> {
        let grounded_dir = self.grounded_dir();
        if !grounded_dir.exists() {
            std::fs::create_dir_all(&grounded_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .grounded directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration of a provider, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Request timeout declared for the active provider.
    pub fn provider_timeout_secs(&self) -> Option<u64> {
        self.get_provider_config(&self.provider)
            .and_then(|pc| pc.timeout)
    }

    /// Validate configuration for the active provider and pipeline.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier cannot be empty".to_string()));
        }

        self.pipeline.validate()
    }
}
