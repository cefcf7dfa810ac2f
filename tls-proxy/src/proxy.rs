// tls-proxy/src/proxy.rs
use std::io;

use actix_web::body::{None as NoBody, SizedStream};
use actix_web::http::{header, Method, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::{StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;
use uuid::Uuid;

use crate::cookie::{rewrite_set_cookie, CookieError};
use crate::error::ProxyError;
use crate::routes::{ProxyRoute, RouteTable};

// Request body chunks buffered between the client connection and the upstream
const PAYLOAD_BUFFER: usize = 16;

// Headers that describe one hop and never cross the proxy
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Read-only state shared by every connection: the route table, one upstream
/// client and the downstream transport flag.
pub struct ProxyState {
    client: reqwest::Client,
    routes: RouteTable,
    secure_transport: bool,
}

impl ProxyState {
    pub fn new(routes: RouteTable, secure_transport: bool) -> Result<Self, reqwest::Error> {
        // Redirects and compression belong to the browser, not to us
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            routes,
            secure_transport,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

// Every path is proxied; there are no local routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::to(forward));
}

async fn forward(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<ProxyState>,
) -> Result<HttpResponse, ProxyError> {
    let route = state.routes.select(req.path());

    let span = tracing::info_span!(
        "proxy",
        request_id = %Uuid::new_v4(),
        method = %req.method(),
        path = %req.path(),
        route = %route.prefix,
        upstream = %route.upstream,
    );

    proxy_request(&req, payload, &state, route)
        .instrument(span)
        .await
        .inspect_err(|e| tracing::error!(route = %route.prefix, upstream = %route.upstream, "{}", e))
}

async fn proxy_request(
    req: &HttpRequest,
    payload: web::Payload,
    state: &ProxyState,
    route: &ProxyRoute,
) -> Result<HttpResponse, ProxyError> {
    let target = route.target_url(req.path(), req.uri().query());

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| ProxyError::Protocol(e.to_string()))?;
    let headers = upstream_headers(req, state.secure_transport)?;

    let mut upstream_req = state.client.request(method, target).headers(headers);
    if has_body(req) {
        upstream_req = upstream_req.body(stream_payload(payload));
    }

    let response = upstream_req.send().await?;

    let status = StatusCode::from_u16(response.status().as_u16())
        .map_err(|e| ProxyError::Protocol(e.to_string()))?;
    let mut builder = HttpResponse::build(status);

    let listed = connection_listed(
        response
            .headers()
            .get_all(reqwest::header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );

    for (name, value) in response.headers() {
        if is_hop_by_hop(name.as_str(), &listed) || name == reqwest::header::CONTENT_LENGTH {
            continue;
        }

        if name == reqwest::header::SET_COOKIE {
            let cookie = downstream_set_cookie(value, route, state.secure_transport)?;
            builder.append_header((header::SET_COOKIE, cookie));
            continue;
        }

        builder.append_header((
            header::HeaderName::from_bytes(name.as_str().as_bytes())
                .map_err(|e| ProxyError::Protocol(e.to_string()))?,
            header::HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| ProxyError::Protocol(e.to_string()))?,
        ));
    }

    tracing::debug!(status = status.as_u16(), "Forwarded response");

    let bodyless = req.method() == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED;

    if bodyless {
        if let Some(length) = response.headers().get(reqwest::header::CONTENT_LENGTH) {
            builder.insert_header((
                header::CONTENT_LENGTH,
                header::HeaderValue::from_bytes(length.as_bytes())
                    .map_err(|e| ProxyError::Protocol(e.to_string()))?,
            ));
        }
        return Ok(builder.body(NoBody::new()));
    }

    let content_length = response.content_length();
    let span = tracing::Span::current();
    let body = response.bytes_stream().inspect_err(move |e| {
        let _entered = span.enter();
        tracing::error!("Upstream body failed mid-stream: {}", e);
    });

    Ok(match content_length {
        Some(length) => builder.body(SizedStream::new(length, body)),
        None => builder.streaming(body),
    })
}

/// Copy end-to-end request headers, keeping `Host` as the client sent it, and
/// describe the original transport to the upstream.
fn upstream_headers(
    req: &HttpRequest,
    secure_transport: bool,
) -> Result<reqwest::header::HeaderMap, ProxyError> {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    let to_name = |name: &str| {
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| ProxyError::Protocol(e.to_string()))
    };
    let to_value = |value: &[u8]| {
        HeaderValue::from_bytes(value).map_err(|e| ProxyError::Protocol(e.to_string()))
    };

    let listed = connection_listed(
        req.headers()
            .get_all(header::CONNECTION)
            .filter_map(|v| v.to_str().ok()),
    );

    let mut headers = HeaderMap::with_capacity(req.headers().len() + 3);
    for (name, value) in req.headers().iter() {
        if is_hop_by_hop(name.as_str(), &listed) {
            continue;
        }
        headers.append(to_name(name.as_str())?, to_value(value.as_bytes())?);
    }

    // HTTP/2 clients carry the host in the URI authority only
    if !headers.contains_key(reqwest::header::HOST) {
        if let Some(authority) = req.uri().authority() {
            headers.insert(reqwest::header::HOST, to_value(authority.as_str().as_bytes())?);
        }
    }

    if let Some(peer) = req.peer_addr() {
        let client_ip = peer.ip().to_string();
        let forwarded_for = match headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(prior) => format!("{}, {}", prior, client_ip),
            None => client_ip,
        };
        headers.insert("x-forwarded-for", to_value(forwarded_for.as_bytes())?);
    }

    let proto = if secure_transport { "https" } else { "http" };
    headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));

    if let Some(host) = headers.get(reqwest::header::HOST).cloned() {
        headers.insert("x-forwarded-host", host);
    }

    Ok(headers)
}

/// Apply the route's cookie scope to one upstream `Set-Cookie` value.
fn downstream_set_cookie(
    value: &reqwest::header::HeaderValue,
    route: &ProxyRoute,
    secure_transport: bool,
) -> Result<header::HeaderValue, ProxyError> {
    let Some(target) = &route.cookie else {
        return header::HeaderValue::from_bytes(value.as_bytes())
            .map_err(|e| ProxyError::Protocol(e.to_string()));
    };

    let raw = value.to_str().map_err(|_| CookieError::Malformed)?;
    let rewritten = rewrite_set_cookie(raw, target, secure_transport)?;

    header::HeaderValue::from_str(&rewritten).map_err(|e| ProxyError::Protocol(e.to_string()))
}

fn has_body(req: &HttpRequest) -> bool {
    req.headers().contains_key(header::CONTENT_LENGTH)
        || req.headers().contains_key(header::TRANSFER_ENCODING)
}

/// Bridge the thread-local actix payload into a `Send` body for the upstream
/// client.
fn stream_payload(mut payload: web::Payload) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<Result<web::Bytes, io::Error>>(PAYLOAD_BUFFER);

    actix_web::rt::spawn(async move {
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

fn connection_listed<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn is_hop_by_hop(name: &str, listed: &[String]) -> bool {
    HOP_BY_HOP.contains(&name) || listed.iter().any(|l| l == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_connection_listed_headers_are_hop_by_hop() {
        let listed = connection_listed(["close, X-Trace", " keep-alive"].into_iter());
        assert_eq!(listed, vec!["close", "x-trace", "keep-alive"]);
        assert!(is_hop_by_hop("x-trace", &listed));
        assert!(is_hop_by_hop("transfer-encoding", &[]));
        assert!(!is_hop_by_hop("cookie", &listed));
    }

    #[test]
    fn test_upstream_headers_keep_host_and_cookie() {
        let req = TestRequest::get()
            .uri("/api/me")
            .insert_header(("host", "admin.local.lchaty.com"))
            .insert_header(("cookie", "fc_session_v2=abc123"))
            .insert_header(("connection", "keep-alive, x-hop"))
            .insert_header(("x-hop", "1"))
            .insert_header(("x-forwarded-for", "10.0.0.1"))
            .peer_addr("192.168.1.20:51000".parse().unwrap())
            .to_http_request();

        let headers = upstream_headers(&req, true).unwrap();
        assert_eq!(headers.get("host").unwrap(), "admin.local.lchaty.com");
        assert_eq!(headers.get("cookie").unwrap(), "fc_session_v2=abc123");
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "10.0.0.1, 192.168.1.20");
        assert_eq!(headers.get("x-forwarded-proto").unwrap(), "https");
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "admin.local.lchaty.com");
        assert!(headers.get("connection").is_none());
        assert!(headers.get("x-hop").is_none());
    }

    #[test]
    fn test_set_cookie_without_route_target_is_verbatim() {
        let route = ProxyRoute {
            prefix: "/".into(),
            upstream: "http://127.0.0.1:5173/".parse().unwrap(),
            cookie: None,
        };
        let value = reqwest::header::HeaderValue::from_static("theme=dark; Path=/");
        let out = downstream_set_cookie(&value, &route, true).unwrap();
        assert_eq!(out, "theme=dark; Path=/");
    }
}
