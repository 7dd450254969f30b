//! Chat handler: `POST /chat` -> `Responder::resolve` -> `{ "reply": ... }`.
//!
//! Accepts a JSON body or an urlencoded form with a `message` field. Every outcome,
//! including malformed bodies and generation failures, uses the same reply shape.

use crate::identity::caller_identity;
use crate::AppState;
use axum::{
    body::to_bytes,
    extract::{ConnectInfo, FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use nyaya_core::{CallerContext, REPLY_EMPTY_INPUT};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::Instrument;

/// Request bodies larger than this are rejected as malformed.
const MAX_BODY_BYTES: usize = 100 * 1024;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatReply {
    pub(crate) reply: String,
}

pub(crate) fn reply_response(status: StatusCode, reply: impl Into<String>) -> Response {
    (status, Json(ChatReply { reply: reply.into() })).into_response()
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Decodes the chat body. An empty body is a request without a message.
async fn read_chat_request(request: Request) -> Result<ChatRequest, String> {
    if is_form(&request) {
        return Form::<ChatRequest>::from_request(request, &())
            .await
            .map(|Form(req)| req)
            .map_err(|e| e.body_text());
    }
    let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| e.to_string())?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ChatRequest::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

pub(crate) async fn chat(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let identity = caller_identity(
        request.headers(),
        connect.map(|ConnectInfo(addr)| addr),
        state.config.trust_forwarded_for,
    );
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!(target: "nyaya::chat", "chat", correlation_id = %correlation_id);

    async move {
        let req = match read_chat_request(request).await {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(target: "nyaya::chat", error = %e, "Rejected undecodable chat body");
                return reply_response(StatusCode::BAD_REQUEST, REPLY_EMPTY_INPUT);
            }
        };
        let message = req.message.unwrap_or_default();

        let ctx = CallerContext::new(identity).with_correlation_id(correlation_id);
        let resolution = state.responder.resolve(&ctx, &message).await;

        tracing::info!(
            target: "nyaya::chat",
            identity = %ctx.identity,
            chars = message.chars().count(),
            source = resolution.source.as_str(),
            score = ?resolution.score,
            "Chat resolved"
        );

        let status = if resolution.is_failure() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        reply_response(status, resolution.reply)
    }
    .instrument(span)
    .await
}
