// tests/tls_listener_test.rs
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer};
use common::{ProxyConfig, RouteConfig, TlsConfig};
use reqwest::StatusCode;
use tls_proxy::proxy::ProxyState;
use tls_proxy::routes::RouteTable;
use tls_proxy::{server, tls};

const HOST: &str = "local.lchaty.com";
const LOGIN_COOKIE: &str =
    "fc_session_v2=abc123; HttpOnly; Secure; SameSite=None; Path=/; Max-Age=3600";

fn spawn_upstream() -> SocketAddr {
    let server = HttpServer::new(|| {
        App::new()
            .route("/api/auth/login", web::post().to(|| async {
                HttpResponse::Ok().insert_header(("set-cookie", LOGIN_COOKIE)).finish()
            }))
            .route("/slow", web::get().to(|| async {
                actix_web::rt::time::sleep(Duration::from_millis(500)).await;
                HttpResponse::Ok().body("done")
            }))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    addr
}

fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

fn write_pem_pair(dir: &Path) -> TlsConfig {
    let generated = rcgen::generate_simple_self_signed(vec![HOST.to_string()]).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, generated.cert.pem()).unwrap();
    std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();
    TlsConfig {
        cert_path: Some(cert_path),
        key_path: Some(key_path),
        ..TlsConfig::default()
    }
}

// Starts the proxy on an ephemeral TLS port and returns its address and handle
fn spawn_proxy(dir: &Path, upstream: SocketAddr) -> (SocketAddr, actix_web::dev::ServerHandle) {
    let config = ProxyConfig {
        listen_addr: "127.0.0.1:0".into(),
        upstream: upstream.to_string(),
        routes: vec![
            RouteConfig {
                prefix: "/api/auth".into(),
                cookie_domain: Some(HOST.into()),
                cookie_path: Some("/".into()),
                ..RouteConfig::default()
            },
            RouteConfig {
                prefix: "/dead".into(),
                upstream: Some(refused_addr().to_string()),
                ..RouteConfig::default()
            },
        ],
        tls: write_pem_pair(dir),
        secure_transport: true,
        shutdown_timeout_secs: 2,
        workers: Some(1),
    };
    config.validate().unwrap();

    let server_config = tls::load_server_config(&config.tls).unwrap();
    let routes = RouteTable::from_config(&config).unwrap();
    let state = ProxyState::new(routes, config.secure_transport).unwrap();

    let bound = server::bind(&config, server_config, state).unwrap();
    let handle = bound.server.handle();
    actix_web::rt::spawn(bound.server);
    (bound.addrs[0], handle)
}

fn https_client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .resolve(HOST, proxy)
        .build()
        .unwrap()
}

fn url(proxy: SocketAddr, path: &str) -> String {
    format!("https://{}:{}{}", HOST, proxy.port(), path)
}

#[actix_web::test]
async fn test_dead_upstream_then_login_over_tls() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, handle) = spawn_proxy(dir.path(), spawn_upstream());
    let client = https_client(proxy);

    let resp = client.get(url(proxy, "/dead/letter")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let resp = client.post(url(proxy, "/api/auth/login")).body("{}").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("set-cookie").unwrap(),
        &format!("{}; Domain={}", LOGIN_COOKIE, HOST)
    );

    handle.stop(true).await;
}

#[actix_web::test]
async fn test_graceful_stop_finishes_in_flight_request() {
    let dir = tempfile::tempdir().unwrap();
    let (proxy, handle) = spawn_proxy(dir.path(), spawn_upstream());

    let in_flight = actix_web::rt::spawn({
        let client = https_client(proxy);
        async move {
            let resp = client.get(url(proxy, "/slow")).send().await?;
            let status = resp.status();
            Ok::<_, reqwest::Error>((status, resp.text().await?))
        }
    });

    // Let the request reach the upstream before stopping
    actix_web::rt::time::sleep(Duration::from_millis(150)).await;
    handle.stop(true).await;

    let (status, body) = in_flight.await.unwrap().unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "done");

    let after = https_client(proxy).get(url(proxy, "/slow")).send().await;
    assert!(after.is_err());
}
