use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimaConfig {
    pub identity: IdentityConfig,
    pub llm: LlmConfig,
    pub autonomy: AutonomyConfig,
    pub proactive: ProactiveConfig,
    pub safety: SafetyConfig,
}

impl AnimaConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. Env var overrides are applied after parsing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: AnimaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults
    /// with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ANIMA_DATA_DIR") {
            self.identity.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ANIMA_WORKSPACE_DIR") {
            self.identity.workspace_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("OLLAMA_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("ANIMA_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("ANIMA_REQUIRE_LLM") {
            self.llm.require_llm = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.identity.data_dir.join(file)
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// The agent's name, used in prompts and greetings.
    pub persona: String,
    /// Directory for persisted state files and the SQLite database.
    pub data_dir: PathBuf,
    /// The agent's working directory for autonomous artifacts
    /// (Research/, Projects/, ...). Also where safe commands run.
    pub workspace_dir: PathBuf,
    /// Lexemes that wake the agent from sleep mode.
    pub wake_words: Vec<String>,
    /// Lexemes that send the agent to sleep mode.
    pub sleep_words: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            persona: "Anima".to_string(),
            data_dir: PathBuf::from("data"),
            workspace_dir: PathBuf::from("workspace"),
            wake_words: vec![
                "wake".to_string(),
                "wake up".to_string(),
                "hey".to_string(),
                "hello".to_string(),
            ],
            sleep_words: vec!["bye".to_string(), "sleep".to_string(), "rest".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Chat temperature; background summarization uses lower values.
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// When true, an unreachable LLM at startup is fatal (exit code 2).
    pub require_llm: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3".to_string(),
            temperature: 0.8,
            max_tokens: 500,
            timeout_secs: 30,
            require_llm: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutonomyConfig {
    pub enabled: bool,
    /// Seconds between autonomous cycles.
    pub cycle_secs: u64,
    /// A cycle is skipped while the last user input is younger than this.
    pub idle_threshold_secs: u64,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle_secs: 300,
            idle_threshold_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProactiveConfig {
    pub enabled: bool,
    /// Sliding interval bounds for proactive thoughts, in seconds.
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: 180,
            max_interval_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Shell command timeout in seconds.
    pub command_timeout_secs: u64,
    /// Hostnames whose presence in a command marks it as a paid API call.
    pub paid_api_hosts: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            paid_api_hosts: vec![
                "openai.com".to_string(),
                "api.anthropic.com".to_string(),
                "cloud.google.com".to_string(),
                "api.aws.amazon.com".to_string(),
                "azure.microsoft.com".to_string(),
                "stripe.com".to_string(),
                "paypal.com".to_string(),
            ],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AnimaConfig::default();
        assert_eq!(cfg.identity.persona, "Anima");
        assert_eq!(cfg.llm.temperature, 0.8);
        assert_eq!(cfg.autonomy.cycle_secs, 300);
        assert_eq!(cfg.proactive.min_interval_secs, 180);
        assert!(!cfg.llm.require_llm);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[identity]
persona = "Iris"

[llm]
model = "qwen2.5"
"#;
        let cfg: AnimaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.identity.persona, "Iris");
        assert_eq!(cfg.llm.model, "qwen2.5");
        // Defaults for unspecified fields
        assert_eq!(cfg.llm.max_tokens, 500);
        assert_eq!(cfg.safety.command_timeout_secs, 30);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[identity]
persona = "Echo"
data_dir = "/var/lib/anima"
workspace_dir = "/home/user/Documents/Echo"
wake_words = ["echo", "wake"]
sleep_words = ["goodnight"]

[llm]
base_url = "http://127.0.0.1:11434/v1"
model = "mistral"
temperature = 0.6
max_tokens = 800
timeout_secs = 60
require_llm = true

[autonomy]
enabled = false
cycle_secs = 600
idle_threshold_secs = 300

[proactive]
min_interval_secs = 120
max_interval_secs = 900

[safety]
command_timeout_secs = 15
paid_api_hosts = ["example.com"]
"#;
        let cfg: AnimaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.identity.persona, "Echo");
        assert!(cfg.llm.require_llm);
        assert!(!cfg.autonomy.enabled);
        assert_eq!(cfg.autonomy.idle_threshold_secs, 300);
        assert_eq!(cfg.safety.paid_api_hosts, vec!["example.com".to_string()]);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = AnimaConfig::load_or_default("/nonexistent/anima.toml");
        assert_eq!(cfg.identity.persona, "Anima");
    }

    #[test]
    fn test_data_path_join() {
        let cfg = AnimaConfig::default();
        assert_eq!(
            cfg.data_path("temporal_state.json"),
            PathBuf::from("data/temporal_state.json")
        );
    }
}
