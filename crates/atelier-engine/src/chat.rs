use anyhow::{anyhow, bail, Context, Result};
use atelier_contracts::chat::ChatTurn;
use atelier_contracts::config::ChatConfig;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::http::response_json_or_error;

/// A chat-completion service: an ordered message list in, one free-text reply out.
pub trait ChatCompletion {
    fn complete(&self, messages: &[ChatTurn]) -> Result<String>;
}

/// OpenAI-compatible `chat/completions` client.
pub struct OpenAiChat {
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    http: HttpClient,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build chat HTTP client")?;
        Ok(Self {
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

impl ChatCompletion for OpenAiChat {
    fn complete(&self, messages: &[ChatTurn]) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OPENAI_API_KEY not set");
        };
        let endpoint = self.endpoint();
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .with_context(|| format!("chat request failed ({endpoint})"))?;
        let body = response_json_or_error("Chat", response)?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow!("chat response has no message content"))
    }
}
