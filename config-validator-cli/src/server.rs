//! HTTP transport for the validator.
//!
//! - `PUT /validate`: raw config body in, `{"result": [findings] | null}` out
//! - `OPTIONS /validate`: CORS preflight, `{"result": null}`
//! - `GET /health`: `{"result": null}`
//!
//! Every response is wrapped in the same `{"result": ...}` envelope, including
//! hard failures (`500`) and rejected bodies.

use std::any::Any;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Request;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use config_validator::FindingEntry;
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::ServerConfig;
use crate::logging::LoggingMiddleware;

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub result: T,
}

impl<T: Serialize> Envelope<T> {
    fn respond(status: StatusCode, result: T) -> Response {
        (status, Json(Self { result })).into_response()
    }
}

/// Build the router for `config`.
#[must_use]
pub fn router(config: &ServerConfig) -> Router {
    let logging = LoggingMiddleware::new(config.verbose, config.max_body_bytes);

    let mut router = Router::new()
        .route("/validate", put(validate_config).options(empty_result))
        .route("/health", get(empty_result))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(move |request: Request, next: Next| {
            let logging = logging.clone();
            async move { logging.handle(request, next).await }
        }));

    for (name, value) in &config.response_headers {
        router = router.layer(SetResponseHeaderLayer::overriding(
            name.clone(),
            value.clone(),
        ));
    }
    router
}

/// Bind `config.address:config.port` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let app = router(&config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("Listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// `PUT /validate`
async fn validate_config(body: Result<Bytes, BytesRejection>) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection_status(rejection.status());
            tracing::warn!("Rejected request body: {rejection}");
            return Envelope::respond(status, rejection.body_text());
        }
    };

    match config_validator::validate(&body) {
        Ok(outcome) => {
            let entries: Option<&[FindingEntry]> =
                Some(outcome.report.entries()).filter(|entries| !entries.is_empty());
            Envelope::respond(StatusCode::OK, entries)
        }
        Err(err) => {
            tracing::error!("Failed to validate config: {err}");
            Envelope::respond(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Over-limit bodies keep their `413`; any other failure to read the body is
/// an internal error.
fn rejection_status(status: StatusCode) -> StatusCode {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// `OPTIONS /validate` and `GET /health`
async fn empty_result() -> Json<Envelope<()>> {
    Json(Envelope { result: () })
}

// `CatchPanicLayer` hands the payload over by value.
#[allow(clippy::needless_pass_by_value)]
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!("Request handler panicked: {detail}");
    Envelope::respond(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_response_hides_details() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rejection_status() {
        assert_eq!(
            rejection_status(StatusCode::PAYLOAD_TOO_LARGE),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            rejection_status(StatusCode::BAD_REQUEST),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_envelope_serializes_result_field() {
        let json = serde_json::to_value(Envelope { result: () }).unwrap();
        assert_eq!(json, serde_json::json!({ "result": null }));
    }
}
