//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path in `CHATGATE_CONFIG`), then applies the `CHATGATE_LOG_LEVEL`
//! override.  Secrets (`LLM_API_KEY`, `TELEGRAM_BOT_TOKEN`) are only ever
//! read from the environment.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::memory::{DEFAULT_HISTORY_CAP, DEFAULT_REPOSITORY_CAP};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
}

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
    pub telegram: TelegramConfig,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Memory layer policy (`[memory]`).
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Turns retained per user in the bounded store.
    pub history_cap: usize,
    /// Entries retained per scope and user in the long-term repository.
    pub repository_cap: usize,
    /// Attach recent history to forwarded requests.
    pub inject_context: bool,
    /// Record text replies as `assistant` turns after the chain returns.
    pub record_replies: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            repository_cap: DEFAULT_REPOSITORY_CAP,
            inject_context: false,
            record_replies: false,
        }
    }
}

/// Security layer policy (`[security]`).
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// User ids allowed through.  Empty means everyone.
    pub allowed_users: Vec<String>,
}

/// Capability settings (`[capabilities]`).
#[derive(Debug, Clone)]
pub struct CapabilitiesConfig {
    /// System prompt sent ahead of every completion.
    pub system_prompt: String,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self { system_prompt: default_system_prompt() }
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    /// Append logs here instead of stderr (already expanded, no `~`).
    pub log_file: Option<PathBuf>,
    pub comms: CommsConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var; `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub memory: MemoryConfig,
    pub security: SecurityConfig,
    pub capabilities: CapabilitiesConfig,
}

impl Config {
    /// Returns `true` if the PTY channel should be loaded.
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    /// Returns `true` if the Telegram channel should be loaded.
    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    supervisor: RawSupervisor,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    memory: RawMemory,
    #[serde(default)]
    security: RawSecurity,
    #[serde(default)]
    capabilities: RawCapabilities,
}

#[derive(Deserialize)]
struct RawSupervisor {
    bot_name: String,
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    pty: RawPty,
    #[serde(default)]
    telegram: RawTelegram,
}

#[derive(Deserialize)]
struct RawPty {
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize, Default)]
struct RawTelegram {
    /// Telegram must be explicitly enabled.
    #[serde(default)]
    enabled: bool,
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawMemory {
    #[serde(default = "default_history_cap")]
    history_cap: usize,
    #[serde(default = "default_repository_cap")]
    repository_cap: usize,
    #[serde(default)]
    inject_context: bool,
    #[serde(default)]
    record_replies: bool,
}

impl Default for RawMemory {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            repository_cap: default_repository_cap(),
            inject_context: false,
            record_replies: false,
        }
    }
}

#[derive(Deserialize, Default)]
struct RawSecurity {
    #[serde(default)]
    allowed_users: Vec<String>,
}

#[derive(Deserialize)]
struct RawCapabilities {
    #[serde(default = "default_system_prompt")]
    system_prompt: String,
}

impl Default for RawCapabilities {
    fn default() -> Self {
        Self { system_prompt: default_system_prompt() }
    }
}

fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_history_cap() -> usize { DEFAULT_HISTORY_CAP }
fn default_repository_cap() -> usize { DEFAULT_REPOSITORY_CAP }

fn default_system_prompt() -> String {
    "You are a helpful assistant reachable over chat. Keep answers short and \
     use Markdown sparingly."
        .to_string()
}

fn default_true() -> bool {
    true
}

/// Load config from `CHATGATE_CONFIG` (or `config/default.toml`), then apply
/// env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("CHATGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let log_level_override = env::var("CHATGATE_LOG_LEVEL").ok();
    load_from(Path::new(&path), log_level_override.as_deref())
}

/// Internal loader; accepts an explicit path and optional override.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if parsed.memory.history_cap == 0 {
        return Err(AppError::Config(format!(
            "memory.history_cap must be at least 1 in {}",
            path.display()
        )));
    }
    if parsed.memory.repository_cap == 0 {
        return Err(AppError::Config(format!(
            "memory.repository_cap must be at least 1 in {}",
            path.display()
        )));
    }

    let s = parsed.supervisor;

    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    crate::logger::parse_level(&log_level)
        .map_err(|e| AppError::Config(format!("{e} in {}", path.display())))?;

    Ok(Config {
        bot_name: s.bot_name,
        log_level,
        log_file: s.log_file.as_deref().map(expand_home),
        comms: CommsConfig {
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
            telegram: TelegramConfig { enabled: parsed.comms.telegram.enabled },
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        memory: MemoryConfig {
            history_cap: parsed.memory.history_cap,
            repository_cap: parsed.memory.repository_cap,
            inject_context: parsed.memory.inject_context,
            record_replies: parsed.memory.record_replies,
        },
        security: SecurityConfig { allowed_users: parsed.security.allowed_users },
        capabilities: CapabilitiesConfig { system_prompt: parsed.capabilities.system_prompt },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests: dummy LLM, no API keys, console only.
    pub fn test_default() -> Self {
        Self {
            bot_name: "test".into(),
            log_level: "info".into(),
            log_file: None,
            comms: CommsConfig {
                pty: PtyConfig { enabled: true },
                telegram: TelegramConfig { enabled: false },
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            memory: MemoryConfig::default(),
            security: SecurityConfig::default(),
            capabilities: CapabilitiesConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.memory.history_cap, 20);
        assert_eq!(cfg.memory.repository_cap, 1000);
        assert!(!cfg.memory.inject_context);
        assert!(!cfg.memory.record_replies);
        assert!(cfg.security.allowed_users.is_empty());
        assert!(cfg.comms_pty_should_load());
        assert!(!cfg.comms_telegram_should_load());
        assert!(!cfg.capabilities.system_prompt.is_empty());
    }

    #[test]
    fn memory_and_security_sections_parse() {
        let f = write_toml(&format!(
            "{MINIMAL_TOML}
[memory]
history_cap = 5
repository_cap = 50
inject_context = true
record_replies = true

[security]
allowed_users = [\"alice\", \"bob\"]
"
        ));
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.memory.history_cap, 5);
        assert_eq!(cfg.memory.repository_cap, 50);
        assert!(cfg.memory.inject_context);
        assert!(cfg.memory.record_replies);
        assert_eq!(cfg.security.allowed_users, ["alice", "bob"]);
    }

    #[test]
    fn zero_history_cap_rejected() {
        let f = write_toml(&format!("{MINIMAL_TOML}\n[memory]\nhistory_cap = 0\n"));
        let err = load_from(f.path(), None).unwrap_err();
        assert!(err.to_string().contains("history_cap"));
    }

    #[test]
    fn zero_repository_cap_rejected() {
        let f = write_toml(&format!("{MINIMAL_TOML}\n[memory]\nrepository_cap = 0\n"));
        let err = load_from(f.path(), None).unwrap_err();
        assert!(err.to_string().contains("repository_cap"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.chatgate");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".chatgate"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_log_level_override() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("debug")).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn invalid_log_level_rejected() {
        let f = write_toml(MINIMAL_TOML);
        let err = load_from(f.path(), Some("chatty")).unwrap_err();
        assert!(err.to_string().contains("unrecognised log level"));
    }
}
