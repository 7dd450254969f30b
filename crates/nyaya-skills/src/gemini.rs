//! Gemini `generateContent` client.
//!
//! API key: `llm_api_key` in config or `GOOGLE_API_KEY`. Default model: `gemini-1.5-flash`.

use nyaya_core::{ConversationTurn, GenerationError, GenerativeModel, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Finish reasons that mean the candidate text was withheld.
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn build_request(system_instruction: &str, history: &[ConversationTurn]) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: history
            .iter()
            .map(|turn| Content {
                role: Some(wire_role(turn.role).to_string()),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect(),
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_instruction.to_string(),
            }],
        },
    }
}

/// Concatenated part texts of the first candidate.
///
/// A response without candidates or content yields an empty string, which the responder
/// turns into a rephrase prompt. Blocked prompts and blocked candidates are errors.
fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback {
            Some(feedback) => Err(GenerationError::MalformedResponse(format!(
                "prompt blocked: {}",
                feedback.block_reason.as_deref().unwrap_or("unspecified")
            ))),
            None => Ok(String::new()),
        };
    };
    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|r| BLOCKED_FINISH_REASONS.contains(r))
    {
        return Err(GenerationError::MalformedResponse(format!("candidate blocked: {}", reason)));
    }
    Ok(candidate
        .content
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default())
}

/// Live Gemini backend.
pub struct GeminiModel {
    api_key: String,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiModel {
    /// Create a client with an explicit API key and the default timeout.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key: api_key.trim().to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: build_client(DEFAULT_TIMEOUT),
        }
    }

    /// Set the model id (e.g. `gemini-1.5-flash`, `gemini-1.5-pro`).
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.trim().to_string();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Transport-level timeout. The responder applies its own bound on top.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait::async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_instruction: &str,
        history: &[ConversationTurn],
    ) -> Result<String, GenerationError> {
        let body = build_request(system_instruction, history);

        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let parsed: GenerateContentResponse = res
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let text = extract_text(parsed)?;
        tracing::debug!(target: "nyaya::gemini", model = %self.model, chars = text.len(), "Gemini reply received");
        Ok(text)
    }
}
