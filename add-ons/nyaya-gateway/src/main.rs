//! Axum-based HTTP gateway for the nyaya legal assistant. Config-driven via CoreConfig.

mod handlers;
mod identity;
mod rate_limit;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use nyaya_core::{ConversationMemory, CoreConfig, KnowledgeBase, Responder};
use rate_limit::RateLimiter;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[nyaya-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(CoreConfig::load()?);

    let knowledge = Arc::new(KnowledgeBase::load_or_empty(&config.knowledge_path));
    let memory = Arc::new(ConversationMemory::new());
    let responder = Arc::new(
        Responder::new(knowledge, memory)
            .with_optional_model(nyaya_skills::build_model(&config))
            .with_timeout(config.generation_timeout()),
    );

    let limiter = RateLimiter::per_minute(config.rate_limit_per_minute);
    tokio::spawn(rate_limit::cleanup_loop(limiter.clone()));

    let app = build_app(AppState {
        config: Arc::clone(&config),
        responder,
        limiter,
    });

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(target: "nyaya::gateway", "{} listening on {}", config.app_name, listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "nyaya::gateway", error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "nyaya::gateway", "Shutdown signal received");
}

fn build_app(state: AppState) -> Router {
    let frontend_enabled = state.config.frontend_enabled;
    let frontend_dir = PathBuf::from(&state.config.frontend_dir);

    // Browser UI may be served from another origin; credentials are allowed, so origin
    // and headers are mirrored instead of wildcarded.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request());

    let chat_route = post(handlers::chat::chat)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::limit_chat));

    let mut app = Router::new()
        .route("/chat", chat_route)
        .route("/api/v1/health", get(health))
        .with_state(state);

    if frontend_enabled {
        if frontend_dir.is_dir() {
            app = app.fallback_service(ServeDir::new(frontend_dir).append_index_html_on_directories(true));
        } else {
            tracing::warn!(
                target: "nyaya::gateway",
                dir = %frontend_dir.display(),
                "Frontend directory missing; static files disabled"
            );
        }
    }

    app.layer(SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    ))
    .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) responder: Arc<Responder>,
    pub(crate) limiter: RateLimiter,
}

/// GET /api/v1/health – liveness plus knowledge/model status.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "app_name": state.config.app_name,
        "knowledge_entries": state.responder.knowledge().len(),
        "ai_configured": state.responder.model_configured(),
        "active_conversations": state.responder.memory().identity_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use nyaya_core::{
        ConversationTurn, GenerationError, GenerativeModel, KnowledgeEntry, REPLY_AI_UNAVAILABLE,
        REPLY_EMPTY_INPUT, REPLY_JUNK_INPUT, REPLY_SERVER_ERROR,
    };
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Echoes the last user turn, or fails when `fail` is set. Records history lengths.
    struct EchoModel {
        fail: bool,
        seen: Mutex<Vec<usize>>,
    }

    impl EchoModel {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl GenerativeModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            _system_instruction: &str,
            history: &[ConversationTurn],
        ) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(history.len());
            if self.fail {
                return Err(GenerationError::Request("connection reset".to_string()));
            }
            Ok(format!("echo: {}", history.last().map(|t| t.text.as_str()).unwrap_or("")))
        }
    }

    fn test_config() -> CoreConfig {
        CoreConfig {
            app_name: "Test Gateway".to_string(),
            frontend_enabled: false,
            ..CoreConfig::default()
        }
    }

    fn test_knowledge() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::from_entries(vec![
            KnowledgeEntry::new("what is dowry", "Dowry is...", Some("Dowry Prohibition Act".to_string())),
            KnowledgeEntry::new("how to file police complaint", "Visit the nearest police station.", None),
        ]))
    }

    fn test_app_with(config: CoreConfig, model: Option<Arc<EchoModel>>) -> (Router, Arc<Responder>) {
        let limiter = RateLimiter::per_minute(config.rate_limit_per_minute);
        let responder = Arc::new(
            Responder::new(test_knowledge(), Arc::new(ConversationMemory::new()))
                .with_optional_model(model.map(|m| m as Arc<dyn GenerativeModel>)),
        );
        let app = build_app(AppState {
            config: Arc::new(config),
            responder: Arc::clone(&responder),
            limiter,
        });
        (app, responder)
    }

    fn chat_json(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn reply_of(res: axum::response::Response) -> (StatusCode, String) {
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json["reply"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_health_reports_knowledge_and_model() {
        let (app, _) = test_app_with(test_config(), None);
        let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["app_name"], "Test Gateway");
        assert_eq!(json["knowledge_entries"], 2);
        assert_eq!(json["ai_configured"], false);
    }

    #[tokio::test]
    async fn test_chat_knowledge_match_skips_model() {
        let model = EchoModel::new(false);
        let (app, _) = test_app_with(test_config(), Some(Arc::clone(&model)));
        let res = app.oneshot(chat_json(serde_json::json!({ "message": "What is dowry" }))).await.unwrap();
        let (status, reply) = reply_of(res).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, "Dowry is...\n\n📘 Related Law: Dowry Prohibition Act");
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_rejects_short_missing_and_junk_messages() {
        let (app, _) = test_app_with(test_config(), Some(EchoModel::new(false)));

        let res = app.clone().oneshot(chat_json(serde_json::json!({ "message": "ab" }))).await.unwrap();
        assert_eq!(reply_of(res).await, (StatusCode::OK, REPLY_JUNK_INPUT.to_string()));

        let res = app.clone().oneshot(chat_json(serde_json::json!({}))).await.unwrap();
        assert_eq!(reply_of(res).await, (StatusCode::OK, REPLY_EMPTY_INPUT.to_string()));

        let res = app.oneshot(chat_json(serde_json::json!({ "message": null }))).await.unwrap();
        assert_eq!(reply_of(res).await, (StatusCode::OK, REPLY_EMPTY_INPUT.to_string()));
    }

    #[tokio::test]
    async fn test_chat_without_model_is_unavailable() {
        let (app, responder) = test_app_with(test_config(), None);
        let res = app
            .oneshot(chat_json(serde_json::json!({ "message": "explain maternity leave rights" })))
            .await
            .unwrap();
        assert_eq!(reply_of(res).await, (StatusCode::OK, REPLY_AI_UNAVAILABLE.to_string()));
        assert_eq!(responder.memory().identity_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_fallback_generates_and_remembers() {
        let model = EchoModel::new(false);
        let (app, responder) = test_app_with(test_config(), Some(Arc::clone(&model)));

        let res = app
            .clone()
            .oneshot(chat_json(serde_json::json!({ "message": "explain maternity leave rights" })))
            .await
            .unwrap();
        assert_eq!(
            reply_of(res).await,
            (StatusCode::OK, "echo: explain maternity leave rights".to_string())
        );

        let res = app
            .oneshot(chat_json(serde_json::json!({ "message": "what about adoption" })))
            .await
            .unwrap();
        assert_eq!(reply_of(res).await.0, StatusCode::OK);

        // No connect info in-process: both requests share the anonymous identity.
        assert_eq!(*model.seen.lock().unwrap(), vec![1, 3]);
        assert_eq!(responder.memory().turn_count(nyaya_core::ANONYMOUS_IDENTITY), 4);
    }

    #[tokio::test]
    async fn test_chat_generation_failure_returns_500_with_reply() {
        let (app, responder) = test_app_with(test_config(), Some(EchoModel::new(true)));
        let res = app
            .oneshot(chat_json(serde_json::json!({ "message": "explain maternity leave rights" })))
            .await
            .unwrap();
        assert_eq!(
            reply_of(res).await,
            (StatusCode::INTERNAL_SERVER_ERROR, REPLY_SERVER_ERROR.to_string())
        );
        assert_eq!(responder.memory().turn_count(nyaya_core::ANONYMOUS_IDENTITY), 1);
    }

    #[tokio::test]
    async fn test_chat_accepts_urlencoded_form() {
        let (app, _) = test_app_with(test_config(), None);
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("message=how+to+file+police+complaint"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(
            reply_of(res).await,
            (StatusCode::OK, "Visit the nearest police station.".to_string())
        );
    }

    #[tokio::test]
    async fn test_chat_malformed_json_is_400_with_reply_shape() {
        let (app, _) = test_app_with(test_config(), None);
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{\"message\": "))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(reply_of(res).await, (StatusCode::BAD_REQUEST, REPLY_EMPTY_INPUT.to_string()));
    }

    #[tokio::test]
    async fn test_chat_rate_limited_per_caller() {
        let config = CoreConfig {
            rate_limit_per_minute: 2,
            ..test_config()
        };
        let (app, _) = test_app_with(config, None);

        let from = |ip: [u8; 4]| {
            let mut req = chat_json(serde_json::json!({ "message": "what is dowry" }));
            req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40000))));
            req
        };

        for _ in 0..2 {
            let res = app.clone().oneshot(from([10, 0, 0, 1])).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app.clone().oneshot(from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(
            reply_of(res).await,
            (StatusCode::TOO_MANY_REQUESTS, rate_limit::REPLY_RATE_LIMITED.to_string())
        );

        let res = app.oneshot(from([10, 0, 0, 2])).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_history_is_partitioned_by_peer_address() {
        let model = EchoModel::new(false);
        let (app, responder) = test_app_with(test_config(), Some(Arc::clone(&model)));

        for ip in [[10, 0, 0, 1], [10, 0, 0, 2]] {
            let mut req = chat_json(serde_json::json!({ "message": "explain maternity leave rights" }));
            req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40000))));
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        assert_eq!(*model.seen.lock().unwrap(), vec![1, 1]);
        assert_eq!(responder.memory().turn_count("10.0.0.1"), 2);
        assert_eq!(responder.memory().turn_count("10.0.0.2"), 2);
    }

    #[tokio::test]
    async fn test_cors_mirrors_origin_with_credentials() {
        let (app, _) = test_app_with(test_config(), None);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.headers()["access-control-allow-origin"], "http://localhost:3000");
        assert_eq!(res.headers()["access-control-allow-credentials"], "true");
    }
}
