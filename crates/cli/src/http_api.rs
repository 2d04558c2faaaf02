use crate::command::{execute_locators, execute_resolve, CommandResponse};
use crate::server_security::{AuthToken, AUTH_TOKEN_ENV};
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Response as HttpResponse, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use locator_core::Resolver;
use locator_protocol::{serialize_json, ErrorEnvelope, ErrorKind};
use serde_json::json;
use std::sync::Arc;

pub(crate) struct HttpState {
    pub(crate) resolver: Arc<Resolver>,
    pub(crate) auth_token: Option<AuthToken>,
}

pub(crate) fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/resolve", post(resolve_handler))
        .route("/locators", post(locators_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub(crate) async fn resolve_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    respond(execute_resolve(&state.resolver, &body).await)
}

pub(crate) async fn locators_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    respond(execute_locators(&body))
}

pub(crate) async fn health_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Response {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    let stats = state.resolver.embedder().cache().stats();
    respond(CommandResponse::ok(&json!({
        "model_id": state.resolver.model_id(),
        "top_k": state.resolver.config().top_k,
        "cache": {
            "entries": stats.len,
            "hits": stats.hits,
            "misses": stats.misses,
        },
    })))
}

/// Encoding failures are server faults and carry no envelope.
fn respond(result: serde_json::Result<CommandResponse>) -> Response {
    match result {
        Ok(response) => build_response(status_for(&response), &response),
        Err(err) => {
            log::error!("Failed to encode response: {err}");
            plain_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn check_auth(state: &HttpState, headers: &HeaderMap) -> Option<Response> {
    let token = state.auth_token.as_ref()?;
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| token.matches_bearer(value));
    if authorized {
        return None;
    }
    log::warn!("Rejected request without a valid bearer token");
    let response = CommandResponse::error(ErrorEnvelope::invalid_input(format!(
        "Missing or invalid Authorization header; send 'Bearer ${AUTH_TOKEN_ENV}'"
    )));
    Some(build_response(StatusCode::UNAUTHORIZED, &response))
}

fn status_for(response: &CommandResponse) -> StatusCode {
    match response.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::InvalidInput) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::NoCandidates) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::EmbeddingUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn build_response(status: StatusCode, response: &CommandResponse) -> Response {
    let Ok(text) = serialize_json(response) else {
        return plain_status(StatusCode::INTERNAL_SERVER_ERROR);
    };
    let mut builder = HttpResponse::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if status == StatusCode::UNAUTHORIZED {
        builder = builder.header(header::WWW_AUTHENTICATE, "Bearer");
    }
    builder
        .body(Body::from(text))
        .unwrap_or_else(|_| plain_status(StatusCode::INTERNAL_SERVER_ERROR))
}

fn plain_status(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
