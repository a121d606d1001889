mod dryrun;
mod webui;

use anyhow::Result;
use atelier_contracts::jobs::GenerationJob;
use image::DynamicImage;

use crate::http::error_chain_text;

pub use dryrun::DryrunBackend;
pub use webui::{WebUiBackend, IMG2IMG_PATH};

/// Something that turns a generation job into an image.
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;
    fn submit(&self, job: &GenerationJob) -> Result<DynamicImage>;
}

/// Submits jobs and collapses every backend failure into an absent image.
pub struct BackendClient {
    backend: Box<dyn GenerationBackend>,
}

impl BackendClient {
    pub fn new<B: GenerationBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn submit(&self, job: &GenerationJob) -> Option<DynamicImage> {
        let (width, height) = job.dimensions();
        tracing::info!(
            backend = self.backend.name(),
            mode = job.mode().as_str(),
            width,
            height,
            "submitting generation job"
        );
        match self.backend.submit(job) {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    mode = job.mode().as_str(),
                    error = %error_chain_text(&err, 1024),
                    "generation failed; no image produced"
                );
                None
            }
        }
    }
}
