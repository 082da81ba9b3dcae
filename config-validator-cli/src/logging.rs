//! Request logging middleware for the validate service.
//!
//! Writes straight to stderr rather than through `tracing` so ANSI colors
//! survive. At `-v` each request gets a one-line summary; at `-vv` request
//! and response bodies are dumped as well.

use std::io::IsTerminal;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Local;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

#[derive(Debug, Clone, Copy)]
enum Style {
    Dim,
    Method,
    Path,
    Status(StatusCode),
    Duration,
    Body,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Self::Dim => "\x1b[2m",
            Self::Method => "\x1b[96m",
            Self::Path => "\x1b[94m",
            Self::Duration => "\x1b[95m",
            Self::Body => "\x1b[90m",
            Self::Status(status) => status_code_color(status),
        }
    }
}

fn status_code_color(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "\x1b[92m",
        300..=399 => "\x1b[93m",
        _ => "\x1b[91m",
    }
}

/// Wraps text in ANSI colors when stderr is a terminal.
#[derive(Debug, Clone, Copy)]
struct Painter {
    enabled: bool,
}

impl Painter {
    fn detect() -> Self {
        Self {
            enabled: std::io::stderr().is_terminal(),
        }
    }

    fn paint(self, style: Style, text: &impl std::fmt::Display) -> String {
        if self.enabled {
            format!("{}{text}\x1b[0m", style.code())
        } else {
            text.to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    pub verbose: u8,
    /// Cap on how much of a body is buffered for a dump.
    pub max_body_bytes: usize,
}

impl LoggingMiddleware {
    #[must_use]
    pub const fn new(verbose: u8, max_body_bytes: usize) -> Self {
        Self {
            verbose,
            max_body_bytes,
        }
    }

    pub async fn handle(&self, request: Request, next: Next) -> Response {
        if self.verbose == 0 {
            return next.run(request).await;
        }

        let painter = Painter::detect();
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let start = Instant::now();

        let response = if self.verbose >= 2 {
            let (parts, body) = request.into_parts();
            let Ok(bytes) = axum::body::to_bytes(body, self.max_body_bytes).await else {
                // Same status the body limit produces downstream.
                return too_large();
            };
            dump_body(painter, "Request body", &bytes);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        } else {
            next.run(request).await
        };

        let status = response.status();
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        eprintln!(
            "{} - INFO - {} {} -> {} in {}",
            Local::now().format(TIMESTAMP_FORMAT),
            painter.paint(Style::Method, &method),
            painter.paint(Style::Path, &path),
            painter.paint(Style::Status(status), &status.as_u16()),
            painter.paint(Style::Duration, &format_args!("{duration_ms:.1}ms")),
        );

        if self.verbose < 2 {
            return response;
        }

        let (parts, body) = response.into_parts();
        match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                dump_body(painter, "Response body", &bytes);
                Response::from_parts(parts, Body::from(bytes))
            }
            Err(_) => Response::from_parts(parts, Body::empty()),
        }
    }
}

fn too_large() -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        axum::Json(serde_json::json!({ "result": "length limit exceeded" })),
    )
        .into_response()
}

/// Print a body at DEBUG level: JSON pretty-printed, anything else as text.
fn dump_body(painter: Painter, label: &str, bytes: &Bytes) {
    if bytes.is_empty() {
        return;
    }
    let (label_suffix, text) = match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(json) => ("", serde_json::to_string_pretty(&json).unwrap_or_default()),
        Err(_) => (" (raw)", String::from_utf8_lossy(bytes).into_owned()),
    };
    eprintln!(
        "{} - DEBUG - {}\n{}",
        Local::now().format(TIMESTAMP_FORMAT),
        painter.paint(Style::Dim, &format_args!("{label}{label_suffix}:")),
        painter.paint(Style::Body, &text),
    );
}
