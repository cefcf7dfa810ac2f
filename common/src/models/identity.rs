// common/src/models/identity.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded body of a successful identity probe.
///
/// Only `id`, `username` and `is_admin` are interpreted; every other field the
/// identity provider sends is kept in `extra` and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque identifier; the provider may use numbers or strings
    pub id: Value,
    pub username: String,
    /// Absent for legacy and test accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<Value>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_admin: None,
            extra: Map::new(),
        }
    }

    pub fn with_admin_flag(mut self, flag: impl Into<Value>) -> Self {
        self.is_admin = Some(flag.into());
        self
    }
}

/// Body of `POST /api/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// One step of the ordered admin-capability chain.
///
/// The chain is evaluated top to bottom and the first matching rule grants
/// admin. The username rules are weak heuristics kept for accounts whose
/// `is_admin` field is missing; they decide UI routing only and the identity
/// provider still enforces authorization itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRule {
    /// `is_admin` is present and truthy
    ExplicitFlag,
    /// Username equals this value exactly (case-sensitive)
    ExactUsername(String),
    /// Username contains this value, ignoring ASCII case
    UsernameContains(String),
}

impl AdminRule {
    /// Flag, then exact `admin`, then any username containing `admin`.
    pub fn legacy_chain() -> Vec<AdminRule> {
        vec![
            AdminRule::ExplicitFlag,
            AdminRule::ExactUsername("admin".to_string()),
            AdminRule::UsernameContains("admin".to_string()),
        ]
    }

    /// Only the explicit flag counts.
    pub fn strict_chain() -> Vec<AdminRule> {
        vec![AdminRule::ExplicitFlag]
    }
}
