use anyhow::{anyhow, Context, Result};
use atelier_contracts::config::BackendConfig;
use atelier_contracts::jobs::GenerationJob;
use image::DynamicImage;
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use super::GenerationBackend;
use crate::codec::decode_image_base64;
use crate::http::response_json_or_error;

pub const IMG2IMG_PATH: &str = "/sdapi/v1/img2img";

/// Stable Diffusion WebUI `img2img` endpoint. One blocking POST per job, no retries.
pub struct WebUiBackend {
    endpoint: String,
    http: HttpClient,
}

impl WebUiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build WebUI HTTP client")?;
        Ok(Self {
            endpoint: format!("{}{IMG2IMG_PATH}", config.webui_url),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GenerationBackend for WebUiBackend {
    fn name(&self) -> &str {
        "webui"
    }

    fn submit(&self, job: &GenerationJob) -> Result<DynamicImage> {
        let payload = job.to_payload();
        tracing::debug!(
            endpoint = %self.endpoint,
            body_bytes = serde_json::to_vec(&payload).map(|bytes| bytes.len()).unwrap_or(0),
            "posting img2img payload"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .with_context(|| format!("WebUI request failed ({})", self.endpoint))?;
        let body = response_json_or_error("WebUI", response)?;
        let first = body
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("WebUI response has no images"))?;
        decode_image_base64(first).context("WebUI returned an undecodable image")
    }
}
