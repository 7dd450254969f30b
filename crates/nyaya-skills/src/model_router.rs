//! Model Router: picks the generative backend (mock or live Gemini) from config.

use crate::gemini::GeminiModel;
use nyaya_core::{ConversationTurn, CoreConfig, GenerationError, GenerativeModel, LlmMode, Role};
use std::sync::Arc;

const MOCK_NAME: &str = "mock";

/// Offline generator: returns a deterministic reply built from the latest user turn.
/// Useful for local runs without a credential.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockModel;

impl MockModel {
    pub fn new() -> Self {
        Self
    }

    fn mock_generate(&self, history: &[ConversationTurn]) -> String {
        let question = history
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .unwrap_or("");
        let preview = question
            .chars()
            .take(80)
            .chain(if question.chars().count() > 80 { "…" } else { "" }.chars())
            .collect::<String>();
        format!(
            "[Generated – Mock LLM]\n\nYou asked: \"{}\" ({} earlier turns in this conversation).\n\nThis is a placeholder answer. Configure a Gemini API key for real legal guidance.",
            preview,
            history.len().saturating_sub(1)
        )
    }
}

#[async_trait::async_trait]
impl GenerativeModel for MockModel {
    fn name(&self) -> &str {
        MOCK_NAME
    }

    async fn generate(
        &self,
        _system_instruction: &str,
        history: &[ConversationTurn],
    ) -> Result<String, GenerationError> {
        Ok(self.mock_generate(history))
    }
}

/// Selects a backend for `mode`. Live mode without a credential yields `None`, which
/// the responder reports as "AI service unavailable.".
pub fn select_model(
    mode: LlmMode,
    api_key: Option<String>,
    config: &CoreConfig,
) -> Option<Arc<dyn GenerativeModel>> {
    match mode {
        LlmMode::Mock => {
            tracing::info!(target: "nyaya::model", "AI fallback using mock model");
            Some(Arc::new(MockModel::new()))
        }
        LlmMode::Live => match api_key {
            Some(key) => {
                let model = GeminiModel::new(key)
                    .with_model(&config.llm_model)
                    .with_api_base(&config.llm_api_url)
                    .with_timeout(config.generation_timeout());
                tracing::info!(target: "nyaya::model", model = model.model(), "AI fallback using Gemini");
                Some(Arc::new(model))
            }
            None => {
                tracing::warn!(
                    target: "nyaya::model",
                    "No API key configured (llm_api_key / GOOGLE_API_KEY); AI fallback disabled"
                );
                None
            }
        },
    }
}

/// Backend for the given config: mode from `llm_mode`, credential from [`CoreConfig::api_key`].
pub fn build_model(config: &CoreConfig) -> Option<Arc<dyn GenerativeModel>> {
    select_model(config.llm_mode(), config.api_key(), config)
}
