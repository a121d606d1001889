use anyhow::Result;
use atelier_contracts::jobs::GenerationJob;
use image::{DynamicImage, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use super::GenerationBackend;

/// Offline backend: a solid fill whose color is derived from the prompt and mode.
pub struct DryrunBackend;

impl GenerationBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn submit(&self, job: &GenerationJob) -> Result<DynamicImage> {
        let (width, height) = job.dimensions();
        let (r, g, b) = color_from_prompt(job.prompts().positive(), job.mode().as_str());
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([r, g, b]),
        )))
    }
}

fn color_from_prompt(prompt: &str, mode: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(mode.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
