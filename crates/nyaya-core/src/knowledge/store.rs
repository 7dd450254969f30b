//! In-memory FAQ store loaded from CSV.

use super::similarity;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// A match is accepted only when its score is strictly above this value.
pub const MATCH_THRESHOLD: f64 = 0.65;

const LAW_REFERENCE_PREFIX: &str = "\n\n📘 Related Law: ";

/// Failure to read the knowledge source. Non-fatal for the service: see
/// [`KnowledgeBase::load_or_empty`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("knowledge source unreadable: {0}")]
    Io(#[from] io::Error),
    #[error("knowledge source malformed: {0}")]
    Csv(#[from] csv::Error),
}

/// One curated question/answer pair. `question` is stored lowercased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_reference: Option<String>,
}

impl KnowledgeEntry {
    /// Builds a normalized entry. An empty reference is stored as `None`.
    pub fn new(question: impl Into<String>, answer: impl Into<String>, law_reference: Option<String>) -> Self {
        Self {
            question: question.into().to_lowercase(),
            answer: answer.into(),
            law_reference: law_reference.filter(|r| !r.is_empty()),
        }
    }

    /// The reply text for this entry: the answer, plus a law-reference footer when present.
    pub fn render_reply(&self) -> String {
        match self.law_reference.as_deref() {
            Some(reference) => format!("{}{}{}", self.answer, LAW_REFERENCE_PREFIX, reference),
            None => self.answer.clone(),
        }
    }
}

/// Best match for a query, with its similarity score.
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeMatch<'a> {
    pub entry: &'a KnowledgeEntry,
    pub score: f64,
}

/// CSV row as found on disk. Every column is optional.
#[derive(Debug, Deserialize)]
struct FaqRow {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    law_reference: String,
}

impl From<FaqRow> for KnowledgeEntry {
    fn from(row: FaqRow) -> Self {
        KnowledgeEntry::new(row.question, row.answer, Some(row.law_reference))
    }
}

/// Read-only FAQ collection. Order is load order and decides ties.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a base from entries, normalizing each question to lowercase.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = KnowledgeEntry>,
    {
        let entries = entries
            .into_iter()
            .map(|e| KnowledgeEntry::new(e.question, e.answer, e.law_reference))
            .collect();
        Self { entries }
    }

    /// Parses CSV with a header row. Rows that fail to decode are skipped.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        // Header errors (e.g. invalid UTF-8) make the whole source unusable.
        csv_reader.headers()?;

        let mut entries = Vec::new();
        for (line, row) in csv_reader.deserialize::<FaqRow>().enumerate() {
            match row {
                Ok(row) => entries.push(KnowledgeEntry::from(row)),
                Err(e) => tracing::warn!(
                    target: "nyaya::knowledge",
                    row = line + 1,
                    error = %e,
                    "Skipping malformed knowledge row"
                ),
            }
        }
        Ok(Self { entries })
    }

    /// Opens and parses the CSV file at `path`.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// Best-effort load: any failure is logged and yields an empty base so the
    /// service keeps answering through the generative fallback.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::open_path(path) {
            Ok(kb) => {
                tracing::info!(
                    target: "nyaya::knowledge",
                    path = %path.display(),
                    entries = kb.len(),
                    "Knowledge base loaded"
                );
                kb
            }
            Err(e) => {
                tracing::warn!(
                    target: "nyaya::knowledge",
                    path = %path.display(),
                    error = %e,
                    "Knowledge base unavailable; continuing with AI fallback only"
                );
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Highest-scoring entry for `query` when its score exceeds [`MATCH_THRESHOLD`].
    /// The query is lowercased before comparison. Pure; never fails.
    pub fn best_match(&self, query: &str) -> Option<KnowledgeMatch<'_>> {
        let query = query.to_lowercase();
        let (index, score) = similarity::best_match(&query, self.entries.iter().map(|e| e.question.as_str()))?;
        if score > MATCH_THRESHOLD {
            Some(KnowledgeMatch {
                entry: &self.entries[index],
                score,
            })
        } else {
            None
        }
    }
}
