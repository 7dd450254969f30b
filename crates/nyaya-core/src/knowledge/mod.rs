//! Curated legal FAQ knowledge base.
//!
//! Loaded once at startup from a CSV source with columns `question`, `answer` and
//! `law_reference`, then shared read-only. Lookups score the caller's question against
//! every stored question with a bigram Dice coefficient and only accept a best match
//! above [`MATCH_THRESHOLD`].

pub mod similarity;
mod store;

pub use store::{KnowledgeBase, KnowledgeEntry, KnowledgeMatch, LoadError, MATCH_THRESHOLD};
