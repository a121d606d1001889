use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::jobs::JobDefaults;

pub const DEFAULT_WEBUI_URL: &str = "http://127.0.0.1:7860";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CHAT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CHAT_MAX_TOKENS: u32 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// WebUI base URL without a trailing slash.
    pub webui_url: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            webui_url: DEFAULT_WEBUI_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl BackendConfig {
    pub fn with_webui_url(mut self, url: &str) -> Self {
        self.webui_url = normalize_base_url(url).unwrap_or(self.webui_url);
        self
    }
}

#[derive(Clone, PartialEq)]
pub struct ChatConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_CHAT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: DEFAULT_CHAT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Startup configuration threaded into the backend and chat clients.
///
/// Built once from the environment; nothing reads the environment after that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtelierConfig {
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub jobs: JobDefaults,
}

impl AtelierConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let first_non_empty = |keys: &[&str]| keys.iter().find_map(|key| non_empty(*key));

        let mut backend = BackendConfig::default();
        if let Some(url) = non_empty("ATELIER_WEBUI_URL") {
            backend = backend.with_webui_url(&url);
        }
        if let Some(secs) = non_empty("ATELIER_TIMEOUT_SECS").and_then(|raw| raw.parse::<u64>().ok())
        {
            backend.timeout = Duration::from_secs(secs.max(1));
        }

        let mut chat = ChatConfig {
            api_key: non_empty("OPENAI_API_KEY"),
            ..ChatConfig::default()
        };
        if let Some(base) = first_non_empty(&["OPENAI_API_BASE", "OPENAI_BASE_URL"])
            .and_then(|raw| normalize_base_url(&raw))
        {
            chat.api_base = base;
        }
        if let Some(model) = non_empty("ATELIER_CHAT_MODEL") {
            chat.model = model;
        }

        let job_defaults_path = non_empty("ATELIER_JOB_DEFAULTS").map(PathBuf::from);
        let jobs = JobDefaults::load(job_defaults_path.as_deref());

        Self {
            backend,
            chat,
            jobs,
        }
    }
}

fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
