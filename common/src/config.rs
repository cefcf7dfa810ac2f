// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};
use url::Url;

use crate::error::ConfigError;
use crate::models::AdminRule;

/// Central configuration for the proxy and the portal session client
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub portal: PortalConfig,
}

/// Static configuration of the TLS-terminating reverse proxy.
///
/// Read once at process start and never mutated while serving.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen_addr: String,
    /// Default upstream (host:port) for paths no route claims
    pub upstream: String,
    pub routes: Vec<RouteConfig>,
    pub tls: TlsConfig,
    /// Whether downstream clients reach us over HTTPS
    pub secure_transport: bool,
    pub shutdown_timeout_secs: u64,
    pub workers: Option<usize>,
}

/// One path-prefix route as written by the operator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub prefix: String,
    /// Overrides the default upstream for this prefix
    pub upstream: Option<String>,
    /// Domain written into `Set-Cookie` headers passing through this route
    pub cookie_domain: Option<String>,
    pub cookie_path: Option<String>,
}

/// Certificate material: either a PEM pair or a PKCS#12 bundle
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub pkcs12_path: Option<PathBuf>,
    pub passphrase: Option<String>,
}

/// Where the two first-party applications live and how the client talks to
/// the identity provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub user_origin: String,
    pub admin_origin: String,
    /// Hostname substring that marks the admin origin
    pub admin_host_marker: String,
    pub identity_path: String,
    pub login_path: String,
    pub logout_path: String,
    /// Path prefixes served by both apps. Empty means every path is shared.
    pub shared_paths: Vec<String>,
    pub admin_rules: Vec<AdminRule>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8443".to_string(),
            upstream: "127.0.0.1:5173".to_string(),
            routes: Vec::new(),
            tls: TlsConfig::default(),
            secure_transport: true,
            shutdown_timeout_secs: 30,
            workers: None,
        }
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            user_origin: "https://local.lchaty.com".to_string(),
            admin_origin: "https://admin.local.lchaty.com".to_string(),
            admin_host_marker: "admin".to_string(),
            identity_path: crate::models::IDENTITY_PATH.to_string(),
            login_path: crate::models::LOGIN_PATH.to_string(),
            logout_path: crate::models::LOGOUT_PATH.to_string(),
            shared_paths: Vec::new(),
            admin_rules: AdminRule::legacy_chain(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__PROXY__UPSTREAM
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step. Any error here must stop the process.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.proxy.validate()?;
        self.portal.validate()
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::invalid("proxy.listen_addr", "must not be empty"));
        }
        upstream_url(&self.upstream).map_err(|reason| ConfigError::invalid("proxy.upstream", reason))?;

        for (index, route) in self.routes.iter().enumerate() {
            let field = |name: &str| format!("proxy.routes[{}].{}", index, name);

            if !route.prefix.starts_with('/') {
                return Err(ConfigError::invalid(field("prefix"), "must start with '/'"));
            }
            if let Some(upstream) = &route.upstream {
                upstream_url(upstream).map_err(|reason| ConfigError::invalid(field("upstream"), reason))?;
            }
            if let Some(domain) = &route.cookie_domain {
                if !is_valid_attribute_value(domain) {
                    return Err(ConfigError::invalid(field("cookie_domain"), "not a usable cookie domain"));
                }
            }
            if let Some(path) = &route.cookie_path {
                if !path.starts_with('/') || !is_valid_attribute_value(path) {
                    return Err(ConfigError::invalid(field("cookie_path"), "must be an absolute path"));
                }
            }
        }

        self.tls.validate()
    }
}

impl TlsConfig {
    /// Exactly one kind of certificate material must be named.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pem = self.cert_path.is_some() || self.key_path.is_some();
        match (pem, self.pkcs12_path.is_some()) {
            (true, true) => Err(ConfigError::invalid(
                "proxy.tls",
                "configure either cert_path/key_path or pkcs12_path, not both",
            )),
            (false, false) => Err(ConfigError::invalid(
                "proxy.tls",
                "no certificate material configured",
            )),
            (true, false) if self.cert_path.is_none() || self.key_path.is_none() => Err(
                ConfigError::invalid("proxy.tls", "cert_path and key_path must be set together"),
            ),
            _ => Ok(()),
        }
    }
}

impl PortalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let user = Url::parse(&self.user_origin)
            .map_err(|e| ConfigError::invalid("portal.user_origin", e.to_string()))?;
        let admin = Url::parse(&self.admin_origin)
            .map_err(|e| ConfigError::invalid("portal.admin_origin", e.to_string()))?;

        if user.origin() == admin.origin() {
            return Err(ConfigError::invalid(
                "portal.admin_origin",
                "must differ from portal.user_origin",
            ));
        }
        if self.admin_host_marker.is_empty() {
            return Err(ConfigError::invalid("portal.admin_host_marker", "must not be empty"));
        }
        let marked = |url: &Url| url.host_str().is_some_and(|h| h.contains(&self.admin_host_marker));
        if !marked(&admin) || marked(&user) {
            return Err(ConfigError::invalid(
                "portal.admin_host_marker",
                "must appear in the admin hostname and not in the user hostname",
            ));
        }
        for (name, path) in [
            ("portal.identity_path", &self.identity_path),
            ("portal.login_path", &self.login_path),
            ("portal.logout_path", &self.logout_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(name, "must start with '/'"));
            }
        }
        Ok(())
    }
}

/// Turn an operator-supplied `host:port` into the plaintext base URL we
/// forward to.
pub fn upstream_url(host_port: &str) -> Result<Url, String> {
    let trimmed = host_port.trim();
    if trimmed.is_empty() {
        return Err("must not be empty".to_string());
    }
    if trimmed.contains("://") {
        return Err("expected host:port without a scheme".to_string());
    }
    let url = Url::parse(&format!("http://{}", trimmed)).map_err(|e| e.to_string())?;
    if url.host_str().is_none() || url.path() != "/" {
        return Err("expected host:port".to_string());
    }
    Ok(url)
}

fn is_valid_attribute_value(value: &str) -> bool {
    !value.is_empty()
        && !value.chars().any(|c| c == ';' || c == ',' || c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pem_tls() -> TlsConfig {
        TlsConfig {
            cert_path: Some(PathBuf::from("cert.pem")),
            key_path: Some(PathBuf::from("key.pem")),
            ..TlsConfig::default()
        }
    }

    fn valid() -> Config {
        let mut config = Config::default();
        config.proxy.tls = pem_tls();
        config
    }

    #[test]
    fn test_defaults_validate_once_tls_is_named() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_tls_requires_exactly_one_kind_of_material() {
        let mut tls = pem_tls();
        tls.pkcs12_path = Some(PathBuf::from("bundle.p12"));
        assert!(tls.validate().is_err());

        let half = TlsConfig {
            cert_path: Some(PathBuf::from("cert.pem")),
            ..TlsConfig::default()
        };
        assert!(half.validate().is_err());

        let p12 = TlsConfig {
            pkcs12_path: Some(PathBuf::from("bundle.p12")),
            passphrase: Some("secret".into()),
            ..TlsConfig::default()
        };
        assert!(p12.validate().is_ok());
    }

    #[test]
    fn test_route_fields_are_checked() {
        let mut config = valid();
        config.proxy.routes.push(RouteConfig {
            prefix: "api".into(),
            ..RouteConfig::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("proxy.routes[0].prefix"));

        let mut config = valid();
        config.proxy.routes.push(RouteConfig {
            prefix: "/api".into(),
            cookie_domain: Some("local.lchaty.com; Secure".into()),
            ..RouteConfig::default()
        });
        assert!(config.validate().is_err());

        let mut config = valid();
        config.proxy.routes.push(RouteConfig {
            prefix: "/api/auth".into(),
            upstream: Some("http://127.0.0.1:3000".into()),
            ..RouteConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upstream_url() {
        let url = upstream_url("127.0.0.1:3000").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/");
        assert!(upstream_url("").is_err());
        assert!(upstream_url("127.0.0.1:3000/api").is_err());
    }

    #[test]
    fn test_portal_origins_must_be_distinguishable() {
        let mut config = valid();
        config.portal.admin_origin = config.portal.user_origin.clone();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.portal.admin_host_marker = "console".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_layers_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
[proxy]
upstream = "127.0.0.1:4000"

[[proxy.routes]]
prefix = "/api"
cookie_domain = "local.lchaty.com"

[proxy.tls]
pkcs12_path = "dev.p12"
passphrase = "changeit"
"#,
        )
        .unwrap();

        std::env::set_var("CONFIG_DIR", dir.path());
        let config = Config::load_validated().unwrap();
        std::env::remove_var("CONFIG_DIR");

        assert_eq!(config.proxy.upstream, "127.0.0.1:4000");
        assert_eq!(config.proxy.routes.len(), 1);
        assert_eq!(config.proxy.routes[0].cookie_domain.as_deref(), Some("local.lchaty.com"));
        assert_eq!(config.proxy.listen_addr, "127.0.0.1:8443");
        assert_eq!(config.portal.admin_rules, AdminRule::legacy_chain());
    }
}
