mod builder;
mod defaults;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::prompts::PromptPair;

pub use builder::{build_inpaint_job, build_sketch_job};
pub use defaults::{
    InpaintDefaults, JobDefaults, SketchDefaults, CANONICAL_HEIGHT, CANONICAL_WIDTH,
    DEFAULT_CONTROL_MODEL, DEFAULT_SAMPLER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    Sketch,
    Inpaint,
}

impl JobMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sketch => "sketch",
            Self::Inpaint => "inpaint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler_name: String,
    pub denoising_strength: f64,
}

/// One ControlNet unit conditioning the sampler on an edge map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlUnit {
    /// Base64 PNG of the edge map.
    pub image: String,
    pub module: String,
    pub model: String,
    pub weight: f64,
    pub control_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchJob {
    pub width: u32,
    pub height: u32,
    pub prompts: PromptPair,
    /// Base64 PNG of the color draft.
    pub init_image: String,
    pub sampling: SamplingParams,
    pub control: ControlUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintJob {
    pub width: u32,
    pub height: u32,
    pub prompts: PromptPair,
    pub init_image: String,
    /// Base64 PNG of the grayscale mask; white marks the region to regenerate.
    pub mask: String,
    pub sampling: SamplingParams,
    pub mask_blur: u32,
    pub inpainting_fill: u8,
    pub inpaint_full_res: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenerationJob {
    Sketch(SketchJob),
    Inpaint(InpaintJob),
}

impl GenerationJob {
    pub fn mode(&self) -> JobMode {
        match self {
            Self::Sketch(_) => JobMode::Sketch,
            Self::Inpaint(_) => JobMode::Inpaint,
        }
    }

    pub fn prompts(&self) -> &PromptPair {
        match self {
            Self::Sketch(job) => &job.prompts,
            Self::Inpaint(job) => &job.prompts,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Sketch(job) => (job.width, job.height),
            Self::Inpaint(job) => (job.width, job.height),
        }
    }

    /// Renders the img2img request body the WebUI API accepts.
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Sketch(job) => json!({
                "prompt": job.prompts.positive(),
                "negative_prompt": job.prompts.negative(),
                "init_images": [job.init_image],
                "steps": job.sampling.steps,
                "width": job.width,
                "height": job.height,
                "cfg_scale": job.sampling.cfg_scale,
                "sampler_name": job.sampling.sampler_name,
                "denoising_strength": job.sampling.denoising_strength,
                "alwayson_scripts": {
                    "controlnet": {
                        "args": [{
                            "image": job.control.image,
                            "module": job.control.module,
                            "model": job.control.model,
                            "weight": job.control.weight,
                            "control_mode": job.control.control_mode,
                        }]
                    }
                }
            }),
            Self::Inpaint(job) => json!({
                "prompt": job.prompts.positive(),
                "negative_prompt": job.prompts.negative(),
                "init_images": [job.init_image],
                "mask": job.mask,
                "steps": job.sampling.steps,
                "width": job.width,
                "height": job.height,
                "cfg_scale": job.sampling.cfg_scale,
                "sampler_name": job.sampling.sampler_name,
                "mask_blur": job.mask_blur,
                "inpainting_fill": job.inpainting_fill,
                "inpaint_full_res": job.inpaint_full_res,
                "denoising_strength": job.sampling.denoising_strength,
            }),
        }
    }

    /// Sha256 over the payload with raster assets replaced by their lengths.
    ///
    /// Identifies a job in the journal without copying megabytes of base64 into it.
    pub fn digest(&self) -> String {
        let mut payload = self.to_payload();
        elide_assets(&mut payload);
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

fn elide_assets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if matches!(key.as_str(), "image" | "mask") {
                    if let Some(text) = entry.as_str() {
                        *entry = Value::String(format!("<{} bytes>", text.len()));
                    }
                    continue;
                }
                if key == "init_images" {
                    if let Some(rows) = entry.as_array_mut() {
                        for row in rows.iter_mut() {
                            if let Some(text) = row.as_str() {
                                *row = Value::String(format!("<{} bytes>", text.len()));
                            }
                        }
                    }
                    continue;
                }
                elide_assets(entry);
            }
        }
        Value::Array(rows) => {
            for row in rows {
                elide_assets(row);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{build_inpaint_job, build_sketch_job, GenerationJob, JobDefaults, JobMode};
    use crate::prompts::normalize;

    fn sketch_job() -> GenerationJob {
        let defaults = JobDefaults::default();
        GenerationJob::Sketch(build_sketch_job(
            "COLOR".to_string(),
            "EDGES".to_string(),
            normalize("1girl, armor", ""),
            &defaults.sketch,
        ))
    }

    fn inpaint_job() -> GenerationJob {
        let defaults = JobDefaults::default();
        GenerationJob::Inpaint(build_inpaint_job(
            "BASE".to_string(),
            "MASK".to_string(),
            normalize("red eyes", "glasses"),
            &defaults.inpaint,
        ))
    }

    #[test]
    fn sketch_payload_carries_controlnet_unit() {
        let payload = sketch_job().to_payload();
        assert_eq!(payload["init_images"][0], "COLOR");
        assert_eq!(payload["width"], 1024);
        assert_eq!(payload["height"], 1024);
        assert_eq!(payload["steps"], 28);
        assert_eq!(payload["sampler_name"], "Euler a");
        assert_eq!(payload["denoising_strength"], 0.85);
        assert!(payload.get("mask").is_none());
        let unit = &payload["alwayson_scripts"]["controlnet"]["args"][0];
        assert_eq!(unit["image"], "EDGES");
        assert_eq!(unit["module"], "none");
        assert_eq!(unit["model"], "kohya_controllllite_xl_canny [2ed264be]");
        assert_eq!(unit["weight"], 1.2);
        assert_eq!(unit["control_mode"], "ControlNet is more important");
    }

    #[test]
    fn inpaint_payload_carries_mask_fields_only() {
        let job = inpaint_job();
        assert_eq!(job.mode(), JobMode::Inpaint);
        let payload = job.to_payload();
        assert_eq!(payload["mask"], "MASK");
        assert_eq!(payload["mask_blur"], 4);
        assert_eq!(payload["inpainting_fill"], 1);
        assert_eq!(payload["inpaint_full_res"], Value::Bool(true));
        assert_eq!(payload["steps"], 35);
        assert_eq!(payload["denoising_strength"], 0.75);
        assert!(payload.get("alwayson_scripts").is_none());
        assert!(payload["negative_prompt"]
            .as_str()
            .unwrap_or_default()
            .ends_with("watermark, glasses"));
    }

    #[test]
    fn digest_is_stable_and_elides_asset_bytes() {
        let first = sketch_job();
        assert_eq!(first.digest(), sketch_job().digest());
        assert_eq!(first.digest().len(), 64);
        assert_ne!(first.digest(), inpaint_job().digest());

        let GenerationJob::Sketch(mut same_length) = sketch_job() else {
            unreachable!()
        };
        same_length.init_image = "COLOX".to_string();
        assert_eq!(GenerationJob::Sketch(same_length).digest(), first.digest());
    }
}
