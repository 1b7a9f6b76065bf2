//! Configuration schema for toolrelay.toml.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolrelayConfig {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub mailbox: MailboxConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Openai,
    Gemini,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Openai => write!(f, "openai"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: Provider,

    /// API base URL. Empty selects the provider's public endpoint.
    pub api_url: String,

    /// API key. Takes precedence over `api_key_env`.
    pub api_key: String,

    /// Environment variable consulted when `api_key` is empty.
    pub api_key_env: String,

    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,

    /// Per-call model timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            api_url: String::new(),
            api_key: String::new(),
            api_key_env: String::new(),
            model: "gpt-4o-mini".into(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: 10,
        }
    }
}

impl ModelConfig {
    /// The effective API base URL for the configured provider.
    pub fn base_url(&self) -> &str {
        if !self.api_url.is_empty() {
            return self.api_url.trim_end_matches('/');
        }
        match self.provider {
            Provider::Openai => "https://api.openai.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        let var = if self.api_key_env.is_empty() {
            match self.provider {
                Provider::Openai => "OPENAI_API_KEY",
                Provider::Gemini => "GEMINI_API_KEY",
            }
        } else {
            self.api_key_env.as_str()
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model invocations per run.
    pub max_iterations: u32,

    /// Extra instructions prepended to the system preamble.
    pub instructions: String,

    /// Query used by `toolrelay run` when none is given.
    pub default_query: String,

    /// Tools described to the model. Empty means all.
    pub tool_filter: Vec<String>,

    /// Tools that accept a call with no arguments (or one blank argument)
    /// as "use all defaults".
    pub default_friendly_tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            instructions: String::new(),
            default_query: "Show me my 3 most recent unread emails".into(),
            tool_filter: Vec::new(),
            default_friendly_tools: vec!["show_unread_emails".into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    #[default]
    InProcess,
    Stdio,
}

/// Where the tool server runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mode: ServerMode,

    /// Executable spawned in `stdio` mode.
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// JSON mailbox file backing the mail tools.
    pub path: String,

    /// Address used as the sender of outgoing mail.
    pub address: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            path: "~/.toolrelay/mailbox.json".into(),
            address: "me@localhost".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub db_path: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: "~/.toolrelay/journal.db".into(),
        }
    }
}

impl ToolrelayConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }

    pub fn resolved_mailbox_path(&self) -> String {
        self.resolve_path(&self.mailbox.path)
    }

    pub fn resolved_db_path(&self) -> String {
        self.resolve_path(&self.journal.db_path)
    }
}
