// tls-proxy/src/routes.rs
use common::{upstream_url, ConfigError, ProxyConfig};
use url::Url;

use crate::cookie::CookieTarget;

/// A path prefix paired with the upstream that serves it and the cookie scope
/// written into its responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub prefix: String,
    pub upstream: Url,
    pub cookie: Option<CookieTarget>,
}

/// Immutable route table, built once at startup.
///
/// The same `select` decides both the upstream a request goes to and the
/// cookie rewrite applied to its response.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<ProxyRoute>,
    fallback: ProxyRoute,
}

impl ProxyRoute {
    /// Upstream URL for an incoming path and query.
    ///
    /// The path is set rather than joined so a path like `//host/x` can never
    /// change the upstream authority.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.upstream.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }
}

impl RouteTable {
    pub fn new(routes: Vec<ProxyRoute>, fallback_upstream: Url) -> Self {
        Self {
            routes,
            fallback: ProxyRoute {
                prefix: "/".to_string(),
                upstream: fallback_upstream,
                cookie: None,
            },
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let default_upstream = upstream_url(&config.upstream)
            .map_err(|reason| ConfigError::invalid("proxy.upstream", reason))?;

        let mut routes = Vec::with_capacity(config.routes.len());
        for (index, route) in config.routes.iter().enumerate() {
            let upstream = match &route.upstream {
                Some(upstream) => upstream_url(upstream).map_err(|reason| {
                    ConfigError::invalid(format!("proxy.routes[{}].upstream", index), reason)
                })?,
                None => default_upstream.clone(),
            };

            let cookie = route.cookie_domain.as_ref().map(|domain| CookieTarget {
                domain: domain.clone(),
                path: route.cookie_path.clone(),
            });

            routes.push(ProxyRoute {
                prefix: route.prefix.clone(),
                upstream,
                cookie,
            });
        }

        Ok(Self::new(routes, default_upstream))
    }

    /// Longest matching prefix wins; equal lengths go to the route declared
    /// first. Paths no route claims use the default upstream without cookie
    /// rewriting.
    pub fn select(&self, path: &str) -> &ProxyRoute {
        let mut best: Option<&ProxyRoute> = None;
        for route in &self.routes {
            if !path.starts_with(&route.prefix) {
                continue;
            }
            match best {
                Some(current) if current.prefix.len() >= route.prefix.len() => {}
                _ => best = Some(route),
            }
        }
        best.unwrap_or(&self.fallback)
    }

    pub fn routes(&self) -> &[ProxyRoute] {
        &self.routes
    }
}
