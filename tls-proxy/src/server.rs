// tls-proxy/src/server.rs
use std::net::SocketAddr;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use common::ProxyConfig;
use rustls::ServerConfig;

use crate::proxy::{self, ProxyState};

/// A bound, not yet running, TLS listener.
pub struct BoundProxy {
    pub server: Server,
    pub addrs: Vec<SocketAddr>,
}

/// Bind the TLS listener on `config.listen_addr`.
///
/// On SIGINT/SIGTERM, or `ServerHandle::stop(true)`, the server stops
/// accepting and gives in-flight requests `shutdown_timeout_secs` to finish.
pub fn bind(
    config: &ProxyConfig,
    server_config: ServerConfig,
    state: ProxyState,
) -> std::io::Result<BoundProxy> {
    let state_data = web::Data::new(state);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .configure(proxy::configure)
    })
    .shutdown_timeout(config.shutdown_timeout_secs);

    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    let server = server.bind_rustls_0_23(&config.listen_addr, server_config)?;
    let addrs = server.addrs();

    Ok(BoundProxy {
        server: server.run(),
        addrs,
    })
}
