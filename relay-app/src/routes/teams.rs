use crate::handler::RelayHandler;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Extension, Json};
use relay_channels::ACK_MESSAGE;
use std::sync::Arc;

pub fn router(webhook_path: &str) -> axum::Router {
    axum::Router::new().route(webhook_path, post(receive_message))
}

/// Takes the body as raw bytes: the signature covers them exactly as sent.
#[tracing::instrument(level = "info", skip_all)]
async fn receive_message(
    Extension(handler): Extension<Arc<RelayHandler>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Json<&'static str> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(
                status = rejection.status().as_u16(),
                reason = %rejection.body_text(),
                "request body rejected; acknowledging without relaying"
            );
            return Json(ACK_MESSAGE);
        }
    };
    let outcome = handler.handle(&headers, &body).await;
    tracing::debug!(outcome = outcome.as_str(), "webhook acknowledged");
    Json(ACK_MESSAGE)
}
