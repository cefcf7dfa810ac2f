// portal-session/src/capability.rs
use common::models::{AdminRule, Identity};
use serde_json::Value;

/// Ordered admin-capability rules. First match wins; no match means
/// non-admin, so the evaluation is total.
///
/// The result is advisory and drives UI routing only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityPolicy {
    rules: Vec<AdminRule>,
}

impl CapabilityPolicy {
    pub fn new(rules: Vec<AdminRule>) -> Self {
        Self { rules }
    }

    /// Explicit flag, then username `admin`, then any username containing
    /// `admin` in any case.
    pub fn legacy() -> Self {
        Self::new(AdminRule::legacy_chain())
    }

    pub fn strict() -> Self {
        Self::new(AdminRule::strict_chain())
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.rules.iter().any(|rule| rule_matches(rule, identity))
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self::legacy()
    }
}

fn rule_matches(rule: &AdminRule, identity: &Identity) -> bool {
    match rule {
        AdminRule::ExplicitFlag => identity.is_admin.as_ref().is_some_and(is_truthy),
        AdminRule::ExactUsername(name) => identity.username == *name,
        AdminRule::UsernameContains(needle) => identity
            .username
            .to_lowercase()
            .contains(&needle.to_lowercase()),
    }
}

/// Truthiness as the browser would judge the decoded JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
