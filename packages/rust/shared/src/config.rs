//! Application configuration for PageDigest.
//!
//! User config lives at `~/.pagedigest/pagedigest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PageDigestError, Result};
use crate::types::{FailurePolicy, SummaryRequest, Tokenizer};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagedigest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagedigest";

/// Instruction prepended to every chunk.
pub const DEFAULT_CHUNK_PROMPT: &str = "You are reading one section of a web page. \
List every distinct fact it contains as a short standalone sentence, one fact per line. \
Here is the section:";

/// Instruction appended after every chunk.
pub const DEFAULT_CHUNK_SUFFIX: &str = "Remember to ignore any navigation links or other text \
that isn't relevant to the main content of the page. Include relevant URLs in your summaries \
wherever possible.";

/// Instruction for the final summarization request.
pub const DEFAULT_SUMMARY_PROMPT: &str =
    "Please sort these facts in order of importance, with the most important fact first";

// ---------------------------------------------------------------------------
// Config structs (matching pagedigest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-chunk extraction settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Final summary settings.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Window scheduling and retry settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Page fetching settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_provider_timeout() -> u64 {
    120
}

/// `[chunking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk, measured with `tokenizer`.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Token counting scheme for budgets.
    #[serde(default)]
    pub tokenizer: Tokenizer,

    /// Text placed before each chunk.
    #[serde(default = "default_chunk_prompt")]
    pub chunk_prompt: String,

    /// Text placed after each chunk.
    #[serde(default = "default_chunk_suffix")]
    pub chunk_suffix: String,

    /// Model used for per-chunk extraction.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_chunk_temperature")]
    pub temperature: f32,

    #[serde(default = "default_chunk_presence_penalty")]
    pub presence_penalty: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            tokenizer: Tokenizer::default(),
            chunk_prompt: default_chunk_prompt(),
            chunk_suffix: default_chunk_suffix(),
            model: default_model(),
            max_tokens: default_chunk_max_tokens(),
            temperature: default_chunk_temperature(),
            presence_penalty: default_chunk_presence_penalty(),
        }
    }
}

fn default_token_budget() -> usize {
    12_952
}
fn default_chunk_prompt() -> String {
    DEFAULT_CHUNK_PROMPT.into()
}
fn default_chunk_suffix() -> String {
    DEFAULT_CHUNK_SUFFIX.into()
}
fn default_model() -> String {
    "gpt-4-turbo-preview".into()
}
fn default_chunk_max_tokens() -> u32 {
    2048
}
fn default_chunk_temperature() -> f32 {
    0.5
}
fn default_chunk_presence_penalty() -> f32 {
    -0.1
}

/// `[summary]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Model used for the final summary.
    #[serde(default = "default_model")]
    pub model: String,

    /// Final prompt template. `{url}` and `{facts}` are substituted.
    #[serde(default = "default_summary_prompt")]
    pub prompt: String,

    #[serde(default = "default_summary_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_summary_temperature")]
    pub temperature: f32,

    #[serde(default = "default_summary_top_p")]
    pub top_p: f32,

    #[serde(default = "default_summary_frequency_penalty")]
    pub frequency_penalty: f32,

    /// Pause between the last chunk window and the final request.
    #[serde(default = "default_pre_summary_delay")]
    pub pre_summary_delay_ms: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            prompt: default_summary_prompt(),
            max_tokens: default_summary_max_tokens(),
            temperature: default_summary_temperature(),
            top_p: default_summary_top_p(),
            frequency_penalty: default_summary_frequency_penalty(),
            pre_summary_delay_ms: default_pre_summary_delay(),
        }
    }
}

fn default_summary_prompt() -> String {
    DEFAULT_SUMMARY_PROMPT.into()
}
fn default_summary_max_tokens() -> u32 {
    4096
}
fn default_summary_temperature() -> f32 {
    1.3
}
fn default_summary_top_p() -> f32 {
    0.88
}
fn default_summary_frequency_penalty() -> f32 {
    0.1
}
fn default_pre_summary_delay() -> u64 {
    1000
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum in-flight chunk requests per window.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay each request waits before it is issued.
    #[serde(default = "default_inter_request_delay")]
    pub inter_request_delay_ms: u64,

    /// Abort on the first failed chunk, or skip it.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Attempts per chunk request (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            inter_request_delay_ms: default_inter_request_delay(),
            failure_policy: FailurePolicy::default(),
            max_attempts: default_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}
fn default_inter_request_delay() -> u64 {
    2000
}
fn default_max_attempts() -> u32 {
    1
}
fn default_retry_initial_delay() -> u64 {
    500
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_retry_max_delay() -> u64 {
    8000
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with page requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("PageDigest/", env!("CARGO_PKG_VERSION")).into()
}

// ---------------------------------------------------------------------------
// Derived request settings
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Model parameters for per-chunk extraction requests.
    pub fn chunk_request(&self) -> SummaryRequest {
        SummaryRequest {
            model: self.chunking.model.clone(),
            max_tokens: self.chunking.max_tokens,
            temperature: self.chunking.temperature,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: Some(self.chunking.presence_penalty),
            prompt: self.chunking.chunk_prompt.clone(),
        }
    }

    /// Model parameters for the final summarization request.
    pub fn summary_request(&self) -> SummaryRequest {
        SummaryRequest {
            model: self.summary.model.clone(),
            max_tokens: self.summary.max_tokens,
            temperature: self.summary.temperature,
            top_p: Some(self.summary.top_p),
            frequency_penalty: Some(self.summary.frequency_penalty),
            presence_penalty: None,
            prompt: self.summary.prompt.clone(),
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.token_budget == 0 {
            return Err(PageDigestError::validation(
                "chunking.token_budget must be greater than zero",
            ));
        }
        if self.dispatch.concurrency == 0 {
            return Err(PageDigestError::validation(
                "dispatch.concurrency must be greater than zero",
            ));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(PageDigestError::validation(
                "dispatch.max_attempts must be at least 1",
            ));
        }
        let multiplier = self.dispatch.retry_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(PageDigestError::validation(
                "dispatch.retry_multiplier must be a finite number >= 1.0",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagedigest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PageDigestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagedigest/pagedigest.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| PageDigestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PageDigestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PageDigestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PageDigestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PageDigestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.provider.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(PageDigestError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("token_budget"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("failure_policy = \"abort\""));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.token_budget, 12_952);
        assert_eq!(config.chunking.tokenizer, Tokenizer::Cl100k);
        assert_eq!(config.dispatch.concurrency, 2);
        assert_eq!(config.dispatch.inter_request_delay_ms, 2000);
        assert_eq!(config.dispatch.max_attempts, 1);
        assert_eq!(config.summary.max_tokens, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[dispatch]
concurrency = 4
failure_policy = "skip"

[chunking]
tokenizer = "heuristic"

[summary]
model = "gpt-4o"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.dispatch.concurrency, 4);
        assert_eq!(config.dispatch.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.dispatch.inter_request_delay_ms, 2000);
        assert_eq!(config.summary.model, "gpt-4o");
        assert_eq!(config.chunking.tokenizer, Tokenizer::Heuristic);
        assert_eq!(config.summary.max_tokens, 4096);
        assert_eq!(config.chunking.token_budget, 12_952);
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join(format!("pd-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pagedigest.toml");
        std::fs::write(&path, "[chunking]\ntoken_budget = 500\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.chunking.token_budget, 500);

        std::fs::write(&path, "[chunking\nbroken").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn request_builders_carry_sampling_params() {
        let config = AppConfig::default();
        let chunk = config.chunk_request();
        assert_eq!(chunk.max_tokens, 2048);
        assert_eq!(chunk.presence_penalty, Some(-0.1));
        assert!(chunk.top_p.is_none());

        let summary = config.summary_request();
        assert_eq!(summary.top_p, Some(0.88));
        assert_eq!(summary.frequency_penalty, Some(0.1));
        assert_eq!(summary.prompt, DEFAULT_SUMMARY_PROMPT);
    }

    #[test]
    fn validate_rejects_non_finite_multiplier() {
        let config: AppConfig =
            toml::from_str("[dispatch]\nretry_multiplier = nan\n").expect("parse");
        assert!(config.dispatch.retry_multiplier.is_nan());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry_multiplier"));

        let mut config = AppConfig::default();
        config.dispatch.retry_multiplier = f64::INFINITY;
        assert!(config.validate().is_err());

        config.dispatch.retry_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budget_and_concurrency() {
        let mut config = AppConfig::default();
        config.chunking.token_budget = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dispatch.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.provider.api_key_env = "PD_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
