//! Generative model backends used by the responder's fallback path.

pub use nyaya_core::{GenerationError, GenerativeModel, LlmMode};

mod gemini;
mod model_router;

pub use gemini::GeminiModel;
pub use model_router::{build_model, select_model, MockModel};
