//! Responder pipeline: input guard -> knowledge lookup -> generative fallback -> memory update.
//!
//! Every call produces a non-empty reply. Failures are request-scoped and surface only as
//! fixed sentinel replies; the cause is logged.

mod guard;

pub use guard::{inspect_input, InputVerdict};

use crate::knowledge::KnowledgeBase;
use crate::memory::{ConversationMemory, ConversationTurn};
use crate::shared::CallerContext;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const REPLY_EMPTY_INPUT: &str = "Please enter a valid question.";
pub const REPLY_JUNK_INPUT: &str = "Please ask a meaningful legal question.";
pub const REPLY_AI_UNAVAILABLE: &str = "AI service unavailable.";
pub const REPLY_REPHRASE: &str = "Please rephrase your question.";
pub const REPLY_SERVER_ERROR: &str = "Server error while generating reply.";

/// Fixed role/tone instruction sent with every fallback call.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert in Indian women's legal rights.
Provide accurate, law-based answers.
Be supportive and clear.";

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a generation call failed. All variants map to [`REPLY_SERVER_ERROR`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

/// External text generator used when the knowledge base has no confident answer.
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Generates a reply for `history` (oldest first, last turn is the user's question).
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[ConversationTurn],
    ) -> Result<String, GenerationError>;
}

/// Which step of the pipeline produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Rejected,
    Knowledge,
    Unavailable,
    Generated,
    Failed,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::Rejected => "rejected",
            ReplySource::Knowledge => "knowledge",
            ReplySource::Unavailable => "unavailable",
            ReplySource::Generated => "generated",
            ReplySource::Failed => "failed",
        }
    }
}

/// Result of resolving one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub reply: String,
    pub source: ReplySource,
    /// Similarity score of the knowledge match, when one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Resolution {
    fn fixed(reply: &str, source: ReplySource) -> Self {
        Self {
            reply: reply.to_string(),
            source,
            score: None,
        }
    }

    /// True when the caller should see a server-error status.
    pub fn is_failure(&self) -> bool {
        self.source == ReplySource::Failed
    }
}

/// Owns the service state needed to answer a question. Shared behind `Arc` by the gateway.
pub struct Responder {
    knowledge: Arc<KnowledgeBase>,
    memory: Arc<ConversationMemory>,
    model: Option<Arc<dyn GenerativeModel>>,
    timeout: Duration,
}

impl Responder {
    /// Responder without a generative model: unmatched questions get [`REPLY_AI_UNAVAILABLE`].
    pub fn new(knowledge: Arc<KnowledgeBase>, memory: Arc<ConversationMemory>) -> Self {
        Self {
            knowledge,
            memory,
            model: None,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Same as [`Responder::with_model`] but accepts an optional model.
    pub fn with_optional_model(mut self, model: Option<Arc<dyn GenerativeModel>>) -> Self {
        self.model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn model_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Resolves one raw message for the caller in `ctx`.
    pub async fn resolve(&self, ctx: &CallerContext, raw: &str) -> Resolution {
        let identity = ctx.resolved_identity();

        let message = match inspect_input(raw) {
            InputVerdict::Accepted(m) => m,
            InputVerdict::TooShort => return Resolution::fixed(REPLY_EMPTY_INPUT, ReplySource::Rejected),
            InputVerdict::Junk => return Resolution::fixed(REPLY_JUNK_INPUT, ReplySource::Rejected),
        };

        if let Some(found) = self.knowledge.best_match(message) {
            return Resolution {
                reply: found.entry.render_reply(),
                source: ReplySource::Knowledge,
                score: Some(found.score),
            };
        }

        let Some(model) = self.model.as_ref() else {
            return Resolution::fixed(REPLY_AI_UNAVAILABLE, ReplySource::Unavailable);
        };

        // Lock is released here; the call below may take seconds.
        let history = self.memory.append_and_snapshot(identity, ConversationTurn::user(message));

        let outcome = match tokio::time::timeout(self.timeout, model.generate(SYSTEM_INSTRUCTION, &history)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(text) => {
                let trimmed = text.trim();
                let reply = if trimmed.is_empty() { REPLY_REPHRASE } else { trimmed };
                self.memory.append(identity, ConversationTurn::assistant(reply));
                Resolution {
                    reply: reply.to_string(),
                    source: ReplySource::Generated,
                    score: None,
                }
            }
            Err(e) => {
                tracing::error!(
                    target: "nyaya::responder",
                    model = model.name(),
                    correlation_id = ctx.correlation_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Generative fallback failed"
                );
                Resolution::fixed(REPLY_SERVER_ERROR, ReplySource::Failed)
            }
        }
    }
}
