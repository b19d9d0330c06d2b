//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks both content directories accept writes

use crate::services::catalog_service::MediaCatalog;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Liveness only: answers 200 with `{"status":"ok"}` and touches no storage.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Performs a best-effort write/read/delete in the music and covers
/// directories. HTTP 200 when both pass, HTTP 503 otherwise.
pub async fn readyz(State(catalog): State<MediaCatalog>) -> impl IntoResponse {
    let music = catalog.audio_store().probe_writable().await;
    let covers = catalog.image_store().probe_writable().await;
    let overall_ok = music.is_ok() && covers.is_ok();

    let mut checks = HashMap::new();
    checks.insert("music", CheckStatus::from(music));
    checks.insert("covers", CheckStatus::from(covers));

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl From<Result<(), String>> for CheckStatus {
    fn from(result: Result<(), String>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.err(),
        }
    }
}
