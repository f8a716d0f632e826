//! Configuration types.

use serde::{Deserialize, Serialize};

/// AI provider kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Claude,
    Gemini,
}

/// Configuration for the streaming LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Provider to use (claude or gemini).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model to generate with.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable name for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    16384
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Where generated files land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Project directory that generated paths are relative to.
    pub project_dir: String,
    /// Conventional root prefixed onto paths not already under it.
    pub source_root: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            project_dir: ".".to_string(),
            source_root: "src".to_string(),
        }
    }
}

/// How partial file content is reported while a file block is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    /// Emit only newly appended content (`file_content_delta`).
    #[default]
    Delta,
    /// Re-emit the whole partial content (`file_streaming`).
    Snapshot,
}

/// Stream parser tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Partial message/plan text must exceed this many characters before
    /// the first streaming event is emitted.
    pub min_partial_len: usize,
    /// File streaming event style.
    pub streaming: StreamingMode,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_partial_len: 10,
            streaming: StreamingMode::Delta,
        }
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Seconds a generation record is kept after its last update.
    pub retention_secs: u64,
    /// Seconds between eviction sweeps.
    pub sweep_interval_secs: u64,
    /// Whether to enable permissive CORS.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            retention_secs: 3600,
            sweep_interval_secs: 60,
            cors_permissive: true,
        }
    }
}

/// One remote operation exposed to `<action>` blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityConfig {
    /// Module name as written in `module="..."`.
    pub module: String,
    /// Operation name as written in `action="..."`.
    pub action: String,
    /// Expected number of positional arguments, if fixed.
    #[serde(default)]
    pub arity: Option<usize>,
}

/// Remote data-layer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Base URL of the data-layer HTTP endpoint.
    pub endpoint: Option<String>,
    /// Environment variable holding a bearer token for the endpoint.
    pub token_env: Option<String>,
    /// Operations that may be invoked.
    pub capabilities: Vec<CapabilityConfig>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub output: OutputConfig,
    pub parser: ParserConfig,
    pub server: ServerConfig,
    pub actions: ActionsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_config_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, ProviderKind::Claude);
        assert_eq!(config.max_tokens, 16384);
        assert_eq!(config.base_url, "https://api.anthropic.com");
        assert_eq!(config.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_ai_config_deserialize_gemini() {
        let toml = r#"
            provider = "gemini"
            model = "gemini-2.5-flash"
            base_url = "https://generativelanguage.googleapis.com/v1beta"
            api_key_env = "GEMINI_API_KEY"
        "#;
        let config: AiConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.max_tokens, 16384);
    }

    #[test]
    fn test_parser_config_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.min_partial_len, 10);
        assert_eq!(config.streaming, StreamingMode::Delta);
    }

    #[test]
    fn test_app_config_full() {
        let toml = r#"
            [output]
            project_dir = "/tmp/project"
            source_root = "app"

            [parser]
            min_partial_len = 0
            streaming = "snapshot"

            [server]
            port = 8080
            retention_secs = 60

            [actions]
            endpoint = "https://data.example.com/api"
            token_env = "DATA_TOKEN"

            [[actions.capabilities]]
            module = "tasks"
            action = "create"
            arity = 1

            [[actions.capabilities]]
            module = "tasks"
            action = "list"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.output.source_root, "app");
        assert_eq!(config.parser.streaming, StreamingMode::Snapshot);
        assert_eq!(config.parser.min_partial_len, 0);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.sweep_interval_secs, 60);
        assert_eq!(config.actions.capabilities.len(), 2);
        assert_eq!(config.actions.capabilities[0].arity, Some(1));
        assert_eq!(config.actions.capabilities[1].arity, None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.output.source_root, "src");
        assert_eq!(config.ai.provider, ProviderKind::Claude);
        assert!(config.actions.endpoint.is_none());
    }
}
