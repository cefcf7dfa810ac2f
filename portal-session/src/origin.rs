// portal-session/src/origin.rs
use common::PortalConfig;
use url::Url;

use crate::error::PortalError;

/// Which of the two first-party applications a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginKind {
    User,
    Admin,
}

impl OriginKind {
    pub fn sibling(self) -> Self {
        match self {
            OriginKind::User => OriginKind::Admin,
            OriginKind::Admin => OriginKind::User,
        }
    }
}

/// The user and admin origins and how to tell them apart.
#[derive(Debug, Clone)]
pub struct Origins {
    user: Url,
    admin: Url,
    admin_marker: String,
    shared_paths: Vec<String>,
}

impl Origins {
    pub fn new(user: Url, admin: Url, admin_marker: impl Into<String>) -> Self {
        Self {
            user,
            admin,
            admin_marker: admin_marker.into(),
            shared_paths: Vec::new(),
        }
    }

    pub fn with_shared_paths(mut self, shared_paths: Vec<String>) -> Self {
        self.shared_paths = shared_paths;
        self
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self, PortalError> {
        let user = Url::parse(&config.user_origin)?;
        let admin = Url::parse(&config.admin_origin)?;
        Ok(Self::new(user, admin, config.admin_host_marker.clone())
            .with_shared_paths(config.shared_paths.clone()))
    }

    /// Hostname substring match; anything not marked is the user origin.
    pub fn classify(&self, url: &Url) -> OriginKind {
        match url.host_str() {
            Some(host) if host.contains(&self.admin_marker) => OriginKind::Admin,
            _ => OriginKind::User,
        }
    }

    pub fn base(&self, kind: OriginKind) -> &Url {
        match kind {
            OriginKind::User => &self.user,
            OriginKind::Admin => &self.admin,
        }
    }

    /// Where a full navigation to `target` should land for a page currently
    /// at `current`. Shared paths keep their path, query and fragment; other
    /// paths land on the target's root.
    pub fn equivalent_url(&self, current: &Url, target: OriginKind) -> Url {
        let mut url = self.base(target).clone();
        if self.is_shared(current.path()) {
            url.set_path(current.path());
            url.set_query(current.query());
            url.set_fragment(current.fragment());
        } else {
            url.set_path("/");
        }
        url
    }

    fn is_shared(&self, path: &str) -> bool {
        self.shared_paths.is_empty() || self.shared_paths.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origins() -> Origins {
        Origins::from_config(&PortalConfig::default()).unwrap()
    }

    #[test]
    fn test_classify_by_hostname_marker() {
        let origins = origins();
        let admin = Url::parse("https://admin.local.lchaty.com/users").unwrap();
        let user = Url::parse("https://local.lchaty.com/chat").unwrap();
        assert_eq!(origins.classify(&admin), OriginKind::Admin);
        assert_eq!(origins.classify(&user), OriginKind::User);
        assert_eq!(OriginKind::User.sibling(), OriginKind::Admin);
    }

    #[test]
    fn test_equivalent_url_keeps_path_by_default() {
        let origins = origins();
        let current = Url::parse("https://local.lchaty.com/settings?tab=2#top").unwrap();
        let url = origins.equivalent_url(&current, OriginKind::Admin);
        assert_eq!(url.as_str(), "https://admin.local.lchaty.com/settings?tab=2#top");
    }

    #[test]
    fn test_unshared_paths_land_on_root() {
        let origins = origins().with_shared_paths(vec!["/settings".to_string()]);
        let current = Url::parse("https://local.lchaty.com/chat/42?x=1").unwrap();
        let url = origins.equivalent_url(&current, OriginKind::Admin);
        assert_eq!(url.as_str(), "https://admin.local.lchaty.com/");
    }
}
