//! Application configuration for InsightFlow.
//!
//! User config lives at `~/.insightflow/insightflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InsightFlowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "insightflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".insightflow";

/// Env var overriding `[server] port`.
const PORT_ENV: &str = "PORT";

// ---------------------------------------------------------------------------
// Config structs (matching insightflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chart output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Long-term memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Narrative text generation settings.
    #[serde(default)]
    pub text_generation: TextGenerationConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory rendered charts are written to.
    #[serde(default = "default_chart_dir")]
    pub chart_dir: String,

    /// Whether the monthly revenue chart is rendered at all.
    #[serde(default = "default_true")]
    pub charts_enabled: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            chart_dir: default_chart_dir(),
            charts_enabled: true,
        }
    }
}

fn default_chart_dir() -> String {
    "insightflow_output".into()
}
fn default_true() -> bool {
    true
}

/// `[memory]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path of the JSON file backing long-term memory.
    #[serde(default = "default_memory_path")]
    pub path: String,

    /// Store a `last_run` summary in long-term memory after each run.
    #[serde(default)]
    pub record_runs: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
            record_runs: false,
        }
    }
}

fn default_memory_path() -> String {
    "memory_bank.json".into()
}

/// What the narrative stage emits when the generator has no credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Truncate the prompt and prefix it with a fallback notice.
    #[default]
    PromptEcho,
    /// Emit the deterministic executive summary template.
    Template,
}

/// `[text_generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerationConfig {
    /// Delegate narratives to the text generator instead of the template.
    #[serde(default)]
    pub enabled: bool,

    /// Env vars checked in order for a provider credential (never store the key itself).
    #[serde(default = "default_api_key_envs")]
    pub api_key_envs: Vec<String>,

    /// Provider model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Prompt characters kept by the prompt-echo fallback.
    #[serde(default = "default_fallback_max_chars")]
    pub fallback_max_chars: usize,

    /// Fallback used when no credential is available.
    #[serde(default)]
    pub fallback: FallbackMode,
}

impl Default for TextGenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_envs: default_api_key_envs(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            fallback_max_chars: default_fallback_max_chars(),
            fallback: FallbackMode::default(),
        }
    }
}

fn default_api_key_envs() -> Vec<String> {
    vec!["GEMINI_API_KEY".into(), "OPENAI_API_KEY".into()]
}
fn default_model() -> String {
    "gemini".into()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_fallback_max_chars() -> usize {
    800
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port. The `PORT` env var takes precedence, see [`ServerConfig::resolved_port`].
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Port from the `PORT` env var when it parses, otherwise the configured one.
    pub fn resolved_port(&self) -> u16 {
        self.resolved_port_with(env_lookup)
    }

    /// [`ServerConfig::resolved_port`] over an arbitrary variable lookup.
    pub fn resolved_port_with(&self, lookup: impl Fn(&str) -> Option<String>) -> u16 {
        lookup(PORT_ENV)
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

// ---------------------------------------------------------------------------
// Pipeline options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline options, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Where charts are written.
    pub chart_dir: PathBuf,
    /// Whether charts are rendered.
    pub charts_enabled: bool,
    /// Fallback used when the text generator has no credential.
    pub fallback: FallbackMode,
    /// Prompt characters kept by the prompt-echo fallback.
    pub fallback_max_chars: usize,
    /// Store a `last_run` summary in long-term memory.
    pub record_runs: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            chart_dir: PathBuf::from(&config.output.chart_dir),
            charts_enabled: config.output.charts_enabled,
            fallback: config.text_generation.fallback,
            fallback_max_chars: config.text_generation.fallback_max_chars,
            record_runs: config.memory.record_runs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.insightflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InsightFlowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.insightflow/insightflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| InsightFlowError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        InsightFlowError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InsightFlowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InsightFlowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InsightFlowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a variable from the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// First non-empty credential among the configured env vars, read through `lookup`
/// (pass [`env_lookup`] for the process environment).
pub fn find_api_key_with(
    config: &TextGenerationConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    config
        .api_key_envs
        .iter()
        .filter_map(|name| lookup(name))
        .find(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("chart_dir"));
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("prompt_echo"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.text_generation.fallback_max_chars, 800);
        assert_eq!(parsed.memory.path, "memory_bank.json");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[output]
chart_dir = "/tmp/charts"

[text_generation]
enabled = true
fallback = "template"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.output.chart_dir, "/tmp/charts");
        assert!(config.output.charts_enabled);
        assert!(config.text_generation.enabled);
        assert_eq!(config.text_generation.fallback, FallbackMode::Template);
        assert_eq!(config.text_generation.api_key_envs.len(), 2);
    }

    #[test]
    fn pipeline_options_from_app_config() {
        let mut app = AppConfig::default();
        app.memory.record_runs = true;
        let opts = PipelineOptions::from(&app);
        assert_eq!(opts.chart_dir, PathBuf::from("insightflow_output"));
        assert!(opts.charts_enabled);
        assert!(opts.record_runs);
        assert_eq!(opts.fallback, FallbackMode::PromptEcho);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn api_key_lookup_skips_unset_vars() {
        let config = TextGenerationConfig::default();
        assert!(find_api_key_with(&config, vars(&[])).is_none());
    }

    #[test]
    fn api_key_lookup_takes_first_non_empty() {
        let config = TextGenerationConfig::default();
        let key = find_api_key_with(
            &config,
            vars(&[("GEMINI_API_KEY", ""), ("OPENAI_API_KEY", "sk-test")]),
        );
        assert_eq!(key.as_deref(), Some("sk-test"));

        let key = find_api_key_with(
            &config,
            vars(&[("GEMINI_API_KEY", "g-key"), ("OPENAI_API_KEY", "sk-test")]),
        );
        assert_eq!(key.as_deref(), Some("g-key"));
    }

    #[test]
    fn port_env_overrides_config() {
        let server = ServerConfig::default();
        assert_eq!(server.resolved_port_with(vars(&[])), 8080);
        assert_eq!(server.resolved_port_with(vars(&[("PORT", "9000")])), 9000);
        assert_eq!(server.resolved_port_with(vars(&[("PORT", "not-a-port")])), 8080);
    }
}
