//! nyaya-core: legal Q&A core library (config, knowledge base, conversation memory, responder).
//!
//! The gateway and the model crate only depend on what is re-exported here, so the
//! resolution pipeline can be exercised in-process without any HTTP or network layer.

mod knowledge;
mod memory;
mod responder;
mod shared;

// Shared (config + caller context)
pub use shared::{CallerContext, CoreConfig, LlmMode, ANONYMOUS_IDENTITY};

// Knowledge base (CSV FAQ, fuzzy lookup)
pub use knowledge::{similarity, KnowledgeBase, KnowledgeEntry, KnowledgeMatch, LoadError, MATCH_THRESHOLD};

// Conversation memory (per-caller bounded history)
pub use memory::{ConversationMemory, ConversationTurn, Role, MAX_HISTORY_TURNS};

// Responder pipeline
pub use responder::{
    inspect_input, GenerationError, GenerativeModel, InputVerdict, ReplySource, Resolution, Responder,
    DEFAULT_GENERATION_TIMEOUT, REPLY_AI_UNAVAILABLE, REPLY_EMPTY_INPUT, REPLY_JUNK_INPUT, REPLY_REPHRASE,
    REPLY_SERVER_ERROR, SYSTEM_INSTRUCTION,
};
