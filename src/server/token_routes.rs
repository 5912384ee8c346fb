use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header::AUTHORIZATION, header::WWW_AUTHENTICATE, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::TokenCacheError;
use crate::resilience::retry::RetrySettings;
use crate::server::server::{AppState, SharedTokenCache};
use crate::utils::constants::HEALTH_PATH;

#[derive(Clone)]
pub struct TokenRoutesState {
    cache: SharedTokenCache,
    retry: Option<RetrySettings>,
    bearer_token: Option<Arc<str>>,
}

impl TokenRoutesState {
    pub fn new(cache: SharedTokenCache, retry: Option<RetrySettings>, bearer_token: Option<String>) -> Self {
        Self {
            cache,
            retry,
            bearer_token: bearer_token.map(Arc::from),
        }
    }

    /// Token routes sit behind the bearer guard; health does not.
    pub fn router(&self, state: AppState) -> Router<AppState> {
        Router::new()
            .route(
                "/subjects/{subject}/token",
                post(issue_token).get(token_info).delete(clear_token),
            )
            .route("/subjects/{subject}/token/valid", get(token_validity))
            .route("/tokens", delete(clear_all_tokens))
            .route_layer(middleware::from_fn_with_state(state, require_bearer))
            .route(HEALTH_PATH, get(health))
    }
}

/// Diagnostic view of a cached entry. The token itself is never echoed.
#[derive(Debug, Serialize)]
struct TokenInfoView {
    subject: String,
    issued_at: i64,
    expires_at: i64,
    fresh: bool,
}

async fn issue_token(State(state): State<AppState>, Path(subject): Path<String>) -> Response {
    let cache = &state.token_state.cache;
    let subject_ref: &str = &subject;
    let result = match &state.token_state.retry {
        Some(retry) => {
            retry
                .run_with_retry(move || cache.get_valid_token(subject_ref))
                .await
        }
        None => cache.get_valid_token(subject_ref).await,
    };

    match result {
        Ok(token) => (StatusCode::OK, Json(json!({ "subject": subject, "token": token }))).into_response(),
        Err(e) => error_response(&subject, &e),
    }
}

async fn token_info(State(state): State<AppState>, Path(subject): Path<String>) -> Response {
    let cache = &state.token_state.cache;
    match cache.get_token_info(&subject).await {
        Some(credential) => {
            let view = TokenInfoView {
                fresh: cache.has_valid_token(&subject).await,
                subject: credential.subject,
                issued_at: credential.issued_at,
                expires_at: credential.expires_at,
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no cached token for subject '{}'", subject) })),
        )
            .into_response(),
    }
}

async fn token_validity(State(state): State<AppState>, Path(subject): Path<String>) -> Response {
    let valid = state.token_state.cache.has_valid_token(&subject).await;
    Json(json!({ "subject": subject, "valid": valid })).into_response()
}

async fn clear_token(State(state): State<AppState>, Path(subject): Path<String>) -> StatusCode {
    state.token_state.cache.clear_token(&subject).await;
    StatusCode::NO_CONTENT
}

async fn clear_all_tokens(State(state): State<AppState>) -> StatusCode {
    info!("clearing all cached tokens on request");
    state.token_state.cache.clear_all_tokens().await;
    StatusCode::NO_CONTENT
}

async fn health() -> &'static str {
    "ok"
}

async fn require_bearer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.token_state.bearer_token.as_deref() else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented == Some(expected) {
        next.run(req).await
    } else {
        warn!(path = %req.uri().path(), "rejected request without a valid bearer credential");
        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Bearer")],
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}

fn error_response(subject: &str, e: &TokenCacheError) -> Response {
    warn!(subject = %subject, error = %e, "token request failed");
    (e.http_status(), Json(json!({ "error": e.user_message() }))).into_response()
}
