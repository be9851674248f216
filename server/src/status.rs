//! The one HTTP surface this service exposes (spec §6 "Scheduler contract" /
//! out-of-scope note: the query-side HTTP API and HTML rendering live
//! outside this crate). `GET /status` is a liveness probe only.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub fn router() -> Router {
    Router::new().route("/status", get(status))
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
