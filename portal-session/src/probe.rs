// portal-session/src/probe.rs
use common::models::Identity;
use reqwest::StatusCode;
use url::Url;

/// Outcome of one session bootstrap probe
#[derive(Debug, Clone, PartialEq)]
pub enum Bootstrap {
    Authenticated(Identity),
    Unauthenticated,
}

impl Bootstrap {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Bootstrap::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Bootstrap::Authenticated(identity) => Some(identity),
            Bootstrap::Unauthenticated => None,
        }
    }
}

/// Asks the identity provider who the current session belongs to.
///
/// The probe never fails: a missing session, an unexpected status, a
/// transport error or an unreadable body all come back as
/// `Bootstrap::Unauthenticated`. No retries, no caching, and no timeout beyond
/// the HTTP client's own.
#[derive(Debug, Clone)]
pub struct SessionProbe {
    client: reqwest::Client,
    identity_path: String,
}

impl SessionProbe {
    /// `client` should keep a cookie store so the session cookie rides along.
    pub fn new(client: reqwest::Client, identity_path: impl Into<String>) -> Self {
        Self {
            client,
            identity_path: identity_path.into(),
        }
    }

    /// Probe the identity endpoint of the origin the page was loaded from.
    ///
    /// A 200 body only counts as authenticated when it decodes into an
    /// `Identity`: JSON without a string `username` or without `id` is
    /// treated like any other unreadable body and yields `Unauthenticated`.
    pub async fn probe(&self, origin: &Url) -> Bootstrap {
        let endpoint = match origin.join(&self.identity_path) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!("Cannot build identity endpoint from {}: {}", origin, e);
                return Bootstrap::Unauthenticated;
            }
        };

        let response = match self.client.get(endpoint.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Identity probe to {} failed: {}", endpoint, e);
                return Bootstrap::Unauthenticated;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<Identity>().await {
                Ok(identity) => Bootstrap::Authenticated(identity),
                Err(e) => {
                    tracing::warn!("Identity response from {} is not a usable identity: {}", endpoint, e);
                    Bootstrap::Unauthenticated
                }
            },
            StatusCode::UNAUTHORIZED => {
                tracing::debug!("No session at {}", endpoint);
                Bootstrap::Unauthenticated
            }
            status => {
                tracing::warn!("Identity probe to {} returned {}", endpoint, status);
                Bootstrap::Unauthenticated
            }
        }
    }
}
