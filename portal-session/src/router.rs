// portal-session/src/router.rs
use common::PortalConfig;
use url::Url;

use crate::capability::CapabilityPolicy;
use crate::error::PortalError;
use crate::origin::{OriginKind, Origins};
use crate::probe::Bootstrap;

/// Session state derived from a completed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AuthenticatedUser,
    AuthenticatedAdmin,
}

/// What the page should do once identity is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Render this origin's login form
    ShowLogin,
    RenderUserApp,
    /// A non-admin on the admin origin; shown, never bounced
    AccessDenied,
    RenderAdminApp,
    /// Full cross-origin navigation
    Redirect(Url),
}

/// Maps (session state, current origin) to exactly one `Decision`.
#[derive(Debug, Clone)]
pub struct PrivilegeRouter {
    origins: Origins,
    policy: CapabilityPolicy,
}

impl PrivilegeRouter {
    pub fn new(origins: Origins, policy: CapabilityPolicy) -> Self {
        Self { origins, policy }
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self, PortalError> {
        Ok(Self::new(
            Origins::from_config(config)?,
            CapabilityPolicy::new(config.admin_rules.clone()),
        ))
    }

    pub fn state(&self, bootstrap: &Bootstrap) -> SessionState {
        match bootstrap.identity() {
            None => SessionState::Unauthenticated,
            Some(identity) if self.policy.is_admin(identity) => SessionState::AuthenticatedAdmin,
            Some(_) => SessionState::AuthenticatedUser,
        }
    }

    pub fn decide(&self, bootstrap: &Bootstrap, current: &Url) -> Decision {
        let here = self.origins.classify(current);

        match (self.state(bootstrap), here) {
            (SessionState::Unauthenticated, _) => Decision::ShowLogin,
            (SessionState::AuthenticatedUser, OriginKind::User) => Decision::RenderUserApp,
            (SessionState::AuthenticatedUser, OriginKind::Admin) => Decision::AccessDenied,
            (SessionState::AuthenticatedAdmin, OriginKind::Admin) => Decision::RenderAdminApp,
            (SessionState::AuthenticatedAdmin, OriginKind::User) => {
                let target = self.origins.equivalent_url(current, here.sibling());
                if target.origin() == current.origin() {
                    // Misconfigured origins: stay on the unprivileged app
                    tracing::warn!("Admin origin {} equals the current origin", target.origin().ascii_serialization());
                    Decision::RenderUserApp
                } else {
                    Decision::Redirect(target)
                }
            }
        }
    }
}
