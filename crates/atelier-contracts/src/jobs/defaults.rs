use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CANONICAL_WIDTH: u32 = 1024;
pub const CANONICAL_HEIGHT: u32 = 1024;
pub const DEFAULT_SAMPLER: &str = "Euler a";
pub const DEFAULT_CONTROL_MODEL: &str = "kohya_controllllite_xl_canny [2ed264be]";

/// Numeric and identifier defaults for sketch-guided jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchDefaults {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler_name: String,
    pub denoising_strength: f64,
    pub control_model: String,
    pub control_module: String,
    pub control_weight: f64,
    pub control_mode: String,
}

impl Default for SketchDefaults {
    fn default() -> Self {
        Self {
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            steps: 28,
            cfg_scale: 7.0,
            sampler_name: DEFAULT_SAMPLER.to_string(),
            denoising_strength: 0.85,
            control_model: DEFAULT_CONTROL_MODEL.to_string(),
            control_module: "none".to_string(),
            control_weight: 1.2,
            control_mode: "ControlNet is more important".to_string(),
        }
    }
}

/// Numeric defaults for masked inpainting jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InpaintDefaults {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler_name: String,
    pub denoising_strength: f64,
    pub mask_blur: u32,
    /// WebUI fill policy for the masked area; 1 keeps the original content as the starting point.
    pub inpainting_fill: u8,
    pub inpaint_full_res: bool,
}

impl Default for InpaintDefaults {
    fn default() -> Self {
        Self {
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            steps: 35,
            cfg_scale: 7.0,
            sampler_name: DEFAULT_SAMPLER.to_string(),
            denoising_strength: 0.75,
            mask_blur: 4,
            inpainting_fill: 1,
            inpaint_full_res: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDefaults {
    pub sketch: SketchDefaults,
    pub inpaint: InpaintDefaults,
}

impl JobDefaults {
    /// Parses an override document. Missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("job defaults override is not valid JSON")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Loads the override file when one is configured, falling back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::from_path(path) {
            Ok(defaults) => defaults,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ignoring job defaults override");
                Self::default()
            }
        }
    }
}
