// tls-proxy/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::cookie::CookieError;

/// Per-request proxy failure.
///
/// Every variant becomes a bare 502 for the one client involved; the detail
/// only goes to the log.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("cannot translate message between client and upstream: {0}")]
    Protocol(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("cookie rewrite refused: {0}")]
    Cookie(#[from] CookieError),
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadGateway()
            .content_type("text/plain; charset=utf-8")
            .body("Bad Gateway")
    }
}
