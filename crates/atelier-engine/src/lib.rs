pub mod backend;
pub mod canvas;
pub mod chat;
pub mod codec;
pub mod dialogue;
pub mod edges;
mod http;
pub mod layers;
pub mod studio;

pub use backend::{BackendClient, DryrunBackend, GenerationBackend, WebUiBackend};
pub use canvas::Canvas;
pub use chat::{ChatCompletion, OpenAiChat};
pub use dialogue::DialogueController;
pub use edges::{extract_edges, EdgeThresholds};
pub use layers::{resolve_inpaint_layers, resolve_sketch_layers, InpaintLayers, SketchLayers};
pub use studio::{GenerationResult, PreparedSketch, Studio};
