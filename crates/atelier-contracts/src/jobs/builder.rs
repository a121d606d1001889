use super::{ControlUnit, InpaintDefaults, InpaintJob, SamplingParams, SketchDefaults, SketchJob};
use crate::prompts::PromptPair;

/// Assembles a sketch job from already-encoded assets. No I/O.
pub fn build_sketch_job(
    color_draft: String,
    edge_map: String,
    prompts: PromptPair,
    defaults: &SketchDefaults,
) -> SketchJob {
    SketchJob {
        width: defaults.width,
        height: defaults.height,
        prompts,
        init_image: color_draft,
        sampling: SamplingParams {
            steps: defaults.steps,
            cfg_scale: defaults.cfg_scale,
            sampler_name: defaults.sampler_name.clone(),
            denoising_strength: defaults.denoising_strength,
        },
        control: ControlUnit {
            image: edge_map,
            module: defaults.control_module.clone(),
            model: defaults.control_model.clone(),
            weight: defaults.control_weight,
            control_mode: defaults.control_mode.clone(),
        },
    }
}

/// Assembles an inpaint job from already-encoded assets. No I/O.
pub fn build_inpaint_job(
    base: String,
    mask: String,
    prompts: PromptPair,
    defaults: &InpaintDefaults,
) -> InpaintJob {
    InpaintJob {
        width: defaults.width,
        height: defaults.height,
        prompts,
        init_image: base,
        mask,
        sampling: SamplingParams {
            steps: defaults.steps,
            cfg_scale: defaults.cfg_scale,
            sampler_name: defaults.sampler_name.clone(),
            denoising_strength: defaults.denoising_strength,
        },
        mask_blur: defaults.mask_blur,
        inpainting_fill: defaults.inpainting_fill,
        inpaint_full_res: defaults.inpaint_full_res,
    }
}
