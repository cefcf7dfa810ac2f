// tls-proxy/src/cookie.rs
//! `Set-Cookie` attribute rewriting.
//!
//! A session cookie issued by the identity provider is re-scoped to the
//! first-party origin the browser is actually on. Only the `Domain` and `Path`
//! attribute values change; the name=value pair and every other attribute are
//! copied byte for byte.

use thiserror::Error;

/// Domain/path a route writes into passing `Set-Cookie` headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieTarget {
    pub domain: String,
    /// `None` keeps whatever `Path` the upstream sent
    pub path: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("malformed Set-Cookie header")]
    Malformed,

    #[error("cookie '{name}' lacks the Secure attribute but is served over HTTPS")]
    InsecureOverHttps { name: String },
}

impl CookieTarget {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Rewrite the `Domain` and `Path` of one `Set-Cookie` value.
///
/// Missing `Domain` (and `Path`, when the target names one) are appended.
/// Rewriting an already rewritten header with the same target returns it
/// unchanged. A cookie without `Secure` on an HTTPS transport is rejected
/// rather than repaired.
pub fn rewrite_set_cookie(
    header: &str,
    target: &CookieTarget,
    secure_transport: bool,
) -> Result<String, CookieError> {
    let mut segments = header.split(';');
    let pair = segments.next().unwrap_or_default();
    let name = cookie_name(pair).ok_or(CookieError::Malformed)?;

    let mut out = String::with_capacity(header.len() + target.domain.len() + 16);
    out.push_str(pair);

    let mut saw_domain = false;
    let mut saw_path = false;
    let mut secure = false;

    for segment in segments {
        out.push(';');
        match attribute_name(segment) {
            Some(attr) if attr.eq_ignore_ascii_case("domain") => {
                saw_domain = true;
                push_attribute(&mut out, segment, &target.domain);
            }
            Some(attr) if attr.eq_ignore_ascii_case("path") => {
                saw_path = true;
                match &target.path {
                    Some(path) => push_attribute(&mut out, segment, path),
                    None => out.push_str(segment),
                }
            }
            Some(attr) => {
                if attr.eq_ignore_ascii_case("secure") {
                    secure = true;
                }
                out.push_str(segment);
            }
            None => out.push_str(segment),
        }
    }

    if secure_transport && !secure {
        return Err(CookieError::InsecureOverHttps {
            name: name.to_string(),
        });
    }

    if !saw_path {
        if let Some(path) = &target.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
    }
    if !saw_domain {
        out.push_str("; Domain=");
        out.push_str(&target.domain);
    }

    Ok(out)
}

fn cookie_name(pair: &str) -> Option<&str> {
    let (name, _value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn attribute_name(segment: &str) -> Option<&str> {
    let name = segment.split('=').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Replace the value of `segment` while keeping its leading whitespace and
/// the attribute name as the upstream spelled it.
fn push_attribute(out: &mut String, segment: &str, value: &str) {
    let name_end = segment.find('=').unwrap_or(segment.len());
    out.push_str(segment[..name_end].trim_end());
    out.push('=');
    out.push_str(value);
}
