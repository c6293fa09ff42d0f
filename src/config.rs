use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

/// Optional AI relay backend; the `ai` command exists only when this is set
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub group: GroupConfig,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Phone numbers (or JIDs) allowed to run admin commands anywhere
    #[serde(default)]
    pub owners: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Where the protocol bridge accepts outbound calls
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Address the inbound webhook binds to
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_id")]
    pub id: String,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    #[serde(default)]
    pub save_media: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_true")]
    pub auto_view: bool,
    #[serde(default)]
    pub auto_react: bool,
    #[serde(default = "default_react_emoji")]
    pub react_emoji: String,
    /// Chat that receives a copy of every status seen
    #[serde(default)]
    pub forward_to: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    #[serde(default)]
    pub welcome: bool,
    /// `{user}` and `{group}` are substituted
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_system_prompt() -> String {
    "You are a friendly assistant inside a WhatsApp group chat. \
     Keep answers short and use plain text."
        .to_string()
}

fn default_bot_name() -> String {
    "WaBot".to_string()
}

fn default_prefix() -> String {
    ".".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_session_id() -> String {
    "default".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_true() -> bool {
    true
}

fn default_react_emoji() -> String {
    "💚".to_string()
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_sweep_cron() -> String {
    "0 */10 * * * *".to_string()
}

fn default_welcome_text() -> String {
    "👋 Welcome to {group}, {user}!".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            prefix: default_prefix(),
            owners: Vec::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: default_session_id(),
            media_dir: default_media_dir(),
            save_media: false,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            auto_view: true,
            auto_react: false,
            react_emoji: default_react_emoji(),
            forward_to: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            welcome: false,
            welcome_text: default_welcome_text(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl GroupConfig {
    pub fn render_welcome(&self, users: &str, group: &str) -> String {
        self.welcome_text
            .replace("{user}", users)
            .replace("{group}", group)
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if config.session.save_media {
            let dir = config.session.media_dir.join(&config.session.id);
            if !dir.exists() {
                std::fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create media directory: {}", dir.display())
                })?;
            }
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bot.prefix.is_empty() || self.bot.prefix.chars().any(char::is_whitespace) {
            bail!("[bot] prefix must be non-empty and contain no whitespace");
        }
        if self.cache.ttl_secs == 0 {
            bail!("[cache] ttl_secs must be greater than zero");
        }
        if self.bridge.base_url.is_empty() {
            bail!("[bridge] base_url is required");
        }
        if let Some(llm) = &self.llm {
            if llm.model.is_empty() {
                bail!("[llm] model is required");
            }
        }
        Ok(())
    }
}
