pub mod health;
pub mod teams;

use axum::Router;

pub fn router(webhook_path: &str) -> Router {
    Router::new()
        .merge(health::router())
        .merge(teams::router(webhook_path))
}
