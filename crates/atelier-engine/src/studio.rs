use anyhow::{Context, Result};
use atelier_contracts::events::EventWriter;
use atelier_contracts::jobs::{
    build_inpaint_job, build_sketch_job, GenerationJob, JobDefaults, JobMode,
};
use atelier_contracts::prompts::normalize;
use image::{DynamicImage, GenericImageView};
use serde_json::json;

use crate::backend::BackendClient;
use crate::canvas::Canvas;
use crate::codec::{encode_png_base64, resize_to_canonical};
use crate::edges::{extract_edges, EdgeThresholds};
use crate::http::{error_chain_text, map_object};
use crate::layers::{resolve_inpaint_layers, resolve_sketch_layers};

/// Outcome of one generation action. Both absent means nothing was produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    pub image: Option<DynamicImage>,
    /// Edge map the sketch job was conditioned on.
    pub debug: Option<DynamicImage>,
}

impl GenerationResult {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }
}

/// A sketch job ready to submit, plus the edge map it carries.
#[derive(Debug, Clone)]
pub struct PreparedSketch {
    pub job: GenerationJob,
    pub edge_map: DynamicImage,
}

/// Drives canvas input through layer resolution, edge extraction and encoding into the backend.
pub struct Studio {
    backend: BackendClient,
    defaults: JobDefaults,
    events: EventWriter,
}

impl Studio {
    pub fn new(backend: BackendClient, defaults: JobDefaults, events: EventWriter) -> Self {
        Self {
            backend,
            defaults,
            events,
        }
    }

    /// `Ok(None)` when the canvas carries nothing to draw from.
    pub fn prepare_sketch(
        &self,
        canvas: Option<&Canvas>,
        positive: &str,
        negative: &str,
    ) -> Result<Option<PreparedSketch>> {
        let Some(layers) = canvas.and_then(resolve_sketch_layers) else {
            return Ok(None);
        };
        let defaults = &self.defaults.sketch;
        let line_art = resize_to_canonical(&layers.line_art, defaults.width, defaults.height);
        let edge_map = DynamicImage::ImageLuma8(extract_edges(&line_art, EdgeThresholds::DEFAULT));
        let color_draft = resize_to_canonical(&layers.color_draft, defaults.width, defaults.height);

        let color_b64 = encode_png_base64(&color_draft).context("failed to encode color draft")?;
        let edges_b64 = encode_png_base64(&edge_map).context("failed to encode edge map")?;
        tracing::debug!(
            color_draft_bytes = color_b64.len(),
            edge_map_bytes = edges_b64.len(),
            "sketch assets encoded"
        );
        let job = build_sketch_job(color_b64, edges_b64, normalize(positive, negative), defaults);
        Ok(Some(PreparedSketch {
            job: GenerationJob::Sketch(job),
            edge_map,
        }))
    }

    /// `Ok(None)` when there is no canvas or no layer to take the mask from.
    pub fn prepare_inpaint(
        &self,
        canvas: Option<&Canvas>,
        positive: &str,
        negative: &str,
    ) -> Result<Option<GenerationJob>> {
        let Some(layers) = resolve_inpaint_layers(canvas) else {
            return Ok(None);
        };
        let defaults = &self.defaults.inpaint;
        let base = resize_to_canonical(&layers.base, defaults.width, defaults.height);
        let mask = resize_to_canonical(
            &DynamicImage::ImageLuma8(layers.mask),
            defaults.width,
            defaults.height,
        );

        let base_b64 = encode_png_base64(&base).context("failed to encode inpaint base")?;
        let mask_b64 = encode_png_base64(&mask).context("failed to encode inpaint mask")?;
        let job = build_inpaint_job(base_b64, mask_b64, normalize(positive, negative), defaults);
        Ok(Some(GenerationJob::Inpaint(job)))
    }

    /// Sketch-guided generation. The edge preview is only returned alongside a generated image.
    pub fn generate_sketch(
        &self,
        canvas: Option<&Canvas>,
        positive: &str,
        negative: &str,
    ) -> GenerationResult {
        let prepared = match self.prepare_sketch(canvas, positive, negative) {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                self.skip(JobMode::Sketch, "canvas has no pixels");
                return GenerationResult::absent();
            }
            Err(err) => {
                self.fail_preparation(JobMode::Sketch, &err);
                return GenerationResult::absent();
            }
        };
        let image = self.run(&prepared.job);
        let debug = image.as_ref().map(|_| prepared.edge_map);
        GenerationResult { image, debug }
    }

    pub fn generate_inpaint(
        &self,
        canvas: Option<&Canvas>,
        positive: &str,
        negative: &str,
    ) -> GenerationResult {
        let job = match self.prepare_inpaint(canvas, positive, negative) {
            Ok(Some(job)) => job,
            Ok(None) => {
                self.skip(JobMode::Inpaint, "no mask layer");
                return GenerationResult::absent();
            }
            Err(err) => {
                self.fail_preparation(JobMode::Inpaint, &err);
                return GenerationResult::absent();
            }
        };
        GenerationResult {
            image: self.run(&job),
            debug: None,
        }
    }

    fn run(&self, job: &GenerationJob) -> Option<DynamicImage> {
        let mode = job.mode().as_str();
        let (width, height) = job.dimensions();
        self.events.record(
            "generation_started",
            map_object(json!({
                "mode": mode,
                "backend": self.backend.name(),
                "digest": job.digest(),
                "width": width,
                "height": height,
            })),
        );
        let image = self.backend.submit(job);
        let mut finished = json!({ "mode": mode, "ok": image.is_some() });
        if let Some(image) = image.as_ref() {
            let (out_width, out_height) = image.dimensions();
            finished["width"] = json!(out_width);
            finished["height"] = json!(out_height);
        }
        self.events.record("generation_finished", map_object(finished));
        image
    }

    fn skip(&self, mode: JobMode, reason: &str) {
        tracing::warn!(mode = mode.as_str(), reason, "generation skipped");
        self.events.record(
            "generation_skipped",
            map_object(json!({ "mode": mode.as_str(), "reason": reason })),
        );
    }

    fn fail_preparation(&self, mode: JobMode, err: &anyhow::Error) {
        tracing::warn!(
            mode = mode.as_str(),
            error = %error_chain_text(err, 1024),
            "failed to prepare generation job"
        );
        self.events.record(
            "generation_skipped",
            map_object(json!({ "mode": mode.as_str(), "reason": "preparation failed" })),
        );
    }
}
