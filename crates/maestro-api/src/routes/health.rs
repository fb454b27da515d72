//! `/ping` and `/healthcheck`.

use axum::routing::get;
use axum::Json;
use axum::Router;
use serde_json::{json, Value};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ping", get(ping)).route("/healthcheck", get(healthcheck))
}

async fn ping() -> &'static str {
    "pong"
}

async fn healthcheck() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "success": true,
    }))
}
