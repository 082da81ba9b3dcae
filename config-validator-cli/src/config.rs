//! Server configuration.
//!
//! Built once from command-line flags and handed to the router; handlers
//! never consult global state.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::{HeaderName, HeaderValue, header};

pub const DEFAULT_PORT: u16 = 80;

/// Largest request body accepted by `PUT /validate`.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Set on every response, replacing any value a handler produced.
    pub response_headers: Vec<(HeaderName, HeaderValue)>,
    pub max_body_bytes: usize,
    /// Request logging level: 0 off, 1 summaries, 2 with bodies.
    pub verbose: u8,
}

impl ServerConfig {
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Headers the public validate service sends: open CORS for `PUT`
    /// and no caching.
    #[must_use]
    pub fn default_response_headers() -> Vec<(HeaderName, HeaderValue)> {
        vec![
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("OPTIONS, PUT"),
            ),
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache,must-revalidate"),
            ),
        ]
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            response_headers: Self::default_response_headers(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            verbose: 0,
        }
    }
}
