// portal-session/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("invalid origin URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request to identity provider failed: {0}")]
    Transport(#[from] reqwest::Error),
}
