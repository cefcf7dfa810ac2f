// portal-session/src/client.rs
use common::models::LoginRequest;
use common::PortalConfig;
use reqwest::StatusCode;
use url::Url;

use crate::error::PortalError;
use crate::probe::{Bootstrap, SessionProbe};
use crate::router::{Decision, PrivilegeRouter};

/// Result of one page load: the finished probe and the decision taken on it
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub bootstrap: Bootstrap,
    pub decision: Decision,
}

/// Talks to the identity provider the way a page on either origin does:
/// relative to the current origin, with the session cookie managed by the
/// client's cookie store.
pub struct PortalClient {
    http: reqwest::Client,
    probe: SessionProbe,
    router: PrivilegeRouter,
    login_path: String,
    logout_path: String,
}

impl PortalClient {
    pub fn from_config(config: &PortalConfig) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Self::with_client(http, config)
    }

    /// Use a prepared client, e.g. one with DNS overrides for local hostnames.
    pub fn with_client(http: reqwest::Client, config: &PortalConfig) -> Result<Self, PortalError> {
        Ok(Self {
            probe: SessionProbe::new(http.clone(), config.identity_path.clone()),
            router: PrivilegeRouter::from_config(config)?,
            http,
            login_path: config.login_path.clone(),
            logout_path: config.logout_path.clone(),
        })
    }

    /// One page load. The router only sees a completed probe.
    pub async fn load(&self, current: &Url) -> Navigation {
        let bootstrap = self.probe.probe(current).await;
        let decision = self.router.decide(&bootstrap, current);

        tracing::info!(
            url = %current,
            authenticated = bootstrap.is_authenticated(),
            decision = ?decision,
            "Page load routed"
        );

        Navigation { bootstrap, decision }
    }

    /// Submit credentials. The status belongs to the identity provider; a
    /// successful login leaves the session cookie in the cookie store.
    pub async fn login(
        &self,
        origin: &Url,
        username: &str,
        password: &str,
    ) -> Result<StatusCode, PortalError> {
        let url = origin.join(&self.login_path)?;
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self.http.post(url).json(&body).send().await?;
        tracing::info!("Login for {} returned {}", username, response.status());
        Ok(response.status())
    }

    pub async fn logout(&self, origin: &Url) -> Result<StatusCode, PortalError> {
        let url = origin.join(&self.logout_path)?;
        let response = self.http.post(url).send().await?;
        tracing::info!("Logout returned {}", response.status());
        Ok(response.status())
    }
}
