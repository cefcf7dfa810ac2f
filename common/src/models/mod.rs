// common/src/models/mod.rs
pub mod identity;

pub use identity::*;

/// Identity endpoint of the identity provider
pub const IDENTITY_PATH: &str = "/api/me";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// Session cookie issued by the identity provider. Client code never reads it.
pub const SESSION_COOKIE_NAME: &str = "fc_session_v2";
