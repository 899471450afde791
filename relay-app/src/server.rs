//! Relay server and one-shot invocation entry points.

use crate::config::RelayConfig;
use crate::handler::RelayHandler;
use crate::routes;
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use relay_channels::{InboundEvent, PlatformResponse};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path).await?;
    let handler = RelayHandler::from_config(&cfg)?;
    tracing::info!(
        model = %handler.model(),
        inference_endpoint = %cfg.inference.endpoint,
        inference_api_key_set = cfg.inference.api_key.is_some(),
        channel = %handler.channel_id(),
        bot_name = %cfg.teams.bot_name,
        bind_addr = %cfg.server.bind_addr,
        webhook_path = %cfg.server.webhook_path,
        "config ok"
    );
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path).await?;
    let addr = cfg.server.bind_addr;
    tracing::info!(
        bind_addr = %addr,
        webhook_path = %cfg.server.webhook_path,
        request_timeout_seconds = cfg.server.request_timeout_seconds,
        max_in_flight = cfg.server.max_in_flight,
        max_body_bytes = cfg.server.max_body_bytes,
        model = %cfg.inference.model,
        inference_timeout_seconds = cfg.inference.timeout_seconds,
        teams_timeout_seconds = cfg.teams.timeout_seconds,
        max_answer_chars = cfg.teams.max_answer_chars,
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;
    let handler = Arc::new(RelayHandler::from_config(&cfg)?);
    let app = build_app(&cfg, handler);

    tracing::info!(%addr, "teamsrelay serving");
    run_until(listener, app, shutdown_signal()).await
}

async fn run_until(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("http server shutdown completed");
    Ok(())
}

/// Runs exactly one event read from `event_path` (stdin when `None`) and prints the
/// platform response.
pub async fn invoke(config_path: Option<PathBuf>, event_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path).await?;
    let handler = RelayHandler::from_config(&cfg)?;
    let raw_event = read_input(event_path.as_deref()).await?;
    let response = run_invocation(&handler, &raw_event).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Prints the `authorization` header value a connector would send for the body.
pub async fn sign(config_path: Option<PathBuf>, body_path: Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path).await?;
    let handler = RelayHandler::from_config(&cfg)?;
    let body = read_input(body_path.as_deref()).await?;
    tracing::debug!(body_len = body.len(), "signing body");
    println!("{}", handler.verifier().authorization_header(&body)?);
    Ok(())
}

pub async fn run_invocation(handler: &RelayHandler, raw_event: &[u8]) -> PlatformResponse {
    match serde_json::from_slice::<InboundEvent>(raw_event) {
        Ok(event) => handler.handle_event(&event).await,
        Err(error) => {
            tracing::error!(%error, "invocation event is not valid json; acknowledging anyway");
            PlatformResponse::ack()
        }
    }
}

pub fn build_app(cfg: &RelayConfig, handler: Arc<RelayHandler>) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    // The timeout sits inside the concurrency limit so queueing time is not counted;
    // `validate` keeps it longer than both outbound client timeouts combined.
    routes::router(&cfg.server.webhook_path)
        .layer(Extension(handler))
        .layer(DefaultBodyLimit::max(cfg.server.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.server.request_timeout_seconds),
        ))
        .layer(GlobalConcurrencyLimitLayer::new(cfg.server.max_in_flight))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display())),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .map_err(|e| anyhow::anyhow!("read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{build_app, run_invocation, run_until};
    use crate::config::RelayConfig;
    use crate::handler::RelayHandler;
    use axum::body::{Body, to_bytes};
    use axum::http::header::AUTHORIZATION;
    use axum::http::{Request, StatusCode};
    use relay_channels::PlatformResponse;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::util::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET_B64: &str = "cmVsYXktdGVzdC1zZWNyZXQ=";

    fn config_for(llm: &MockServer, teams: &MockServer) -> RelayConfig {
        let mut cfg = RelayConfig::default();
        cfg.auth.hmac_secret = SECRET_B64.to_string();
        cfg.inference.endpoint = llm.uri();
        cfg.teams.webhook_url = teams.uri();
        cfg
    }

    async fn silent_upstreams() -> (MockServer, MockServer) {
        let llm = MockServer::start().await;
        let teams = MockServer::start().await;
        for server in [&llm, &teams] {
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(server)
                .await;
        }
        (llm, teams)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        String::from_utf8(body.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn webhook_route_acknowledges_unsigned_request() {
        let (llm, teams) = silent_upstreams().await;
        let cfg = config_for(&llm, &teams);
        let handler = Arc::new(RelayHandler::from_config(&cfg).expect("handler"));
        let app = build_app(&cfg, handler);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/teams/messages")
                    .header(AUTHORIZATION, "HMAC bm90LXRoZS1yaWdodC1tYWM=")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text":"Zoé bonjour"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_string(response).await, "\"Ok!\"");
    }

    #[tokio::test]
    async fn webhook_route_relays_signed_request() {
        let llm = MockServer::start().await;
        let teams = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "completion": "Salut" })),
            )
            .expect(1)
            .mount(&llm)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&teams)
            .await;
        let cfg = config_for(&llm, &teams);
        let handler = Arc::new(RelayHandler::from_config(&cfg).expect("handler"));
        let body = r#"{"text":"<at>Zoé</at> bonjour"}"#;
        let signature = handler
            .verifier()
            .authorization_header(body.as_bytes())
            .expect("sign body");
        let app = build_app(&cfg, handler);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/teams/messages")
                    .header(AUTHORIZATION, signature)
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "\"Ok!\"");
    }

    #[tokio::test]
    async fn health_route_reports_model_and_channel() {
        let (llm, teams) = silent_upstreams().await;
        let cfg = config_for(&llm, &teams);
        let handler = Arc::new(RelayHandler::from_config(&cfg).expect("handler"));
        let app = build_app(&cfg, handler);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("health json");
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(body.get("channel").and_then(|v| v.as_str()), Some("teams"));
        assert_eq!(
            body.get("model").and_then(|v| v.as_str()),
            Some("anthropic.claude-v2:1")
        );
    }

    #[tokio::test]
    async fn invocation_always_returns_ack() {
        let (llm, teams) = silent_upstreams().await;
        let cfg = config_for(&llm, &teams);
        let handler = RelayHandler::from_config(&cfg).expect("handler");

        let missing_token = serde_json::to_vec(&json!({
            "headers": { "authorization": "HMAC" },
            "body": "{\"text\":\"bonjour\"}"
        }))
        .expect("event");
        assert_eq!(
            run_invocation(&handler, &missing_token).await,
            PlatformResponse::ack()
        );
        assert_eq!(
            run_invocation(&handler, b"garbage").await,
            PlatformResponse::ack()
        );
    }

    #[tokio::test]
    async fn slow_model_still_gets_ack_and_delivers_fallback() {
        let llm = MockServer::start().await;
        let teams = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "completion": "trop tard" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&llm)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&teams)
            .await;
        let mut cfg = config_for(&llm, &teams);
        cfg.inference.timeout_seconds = 1;
        cfg.teams.timeout_seconds = 1;
        cfg.server.request_timeout_seconds = 3;
        cfg.validate().expect("timeouts are consistent");
        let handler = Arc::new(RelayHandler::from_config(&cfg).expect("handler"));
        let body = r#"{"text":"bonjour"}"#;
        let signature = handler
            .verifier()
            .authorization_header(body.as_bytes())
            .expect("sign body");
        let app = build_app(&cfg, handler);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/teams/messages")
                    .header(AUTHORIZATION, signature)
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "\"Ok!\"");
    }

    #[tokio::test]
    async fn oversized_body_is_acknowledged_without_outbound_calls() {
        let (llm, teams) = silent_upstreams().await;
        let mut small = config_for(&llm, &teams);
        small.server.max_body_bytes = 1024;
        let defaults = config_for(&llm, &teams);

        for (cfg, size) in [(small, 4096), (defaults, 3 * 1024 * 1024)] {
            let handler = Arc::new(RelayHandler::from_config(&cfg).expect("handler"));
            let app = build_app(&cfg, handler);
            let text = "a".repeat(size);
            let body = serde_json::to_vec(&json!({ "text": text })).expect("body");

            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/v1/teams/messages")
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .expect("request"),
                )
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK, "body of {size} bytes");
            assert_eq!(body_string(response).await, "\"Ok!\"");
        }
    }

    #[tokio::test]
    async fn server_stops_when_shutdown_resolves() {
        let (llm, teams) = silent_upstreams().await;
        let cfg = config_for(&llm, &teams);
        let handler = Arc::new(RelayHandler::from_config(&cfg).expect("handler"));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run_until(listener, build_app(&cfg, handler), async move {
            let _ = stop_rx.await;
        }));

        stop_tx.send(()).expect("server still running");
        let finished = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server stopped in time")
            .expect("server task joined");
        assert!(finished.is_ok());
    }
}
