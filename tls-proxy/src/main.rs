// TLS Proxy - main.rs
// tls-proxy/src/main.rs
use common::{setup_tracing, Config};
use tls_proxy::proxy::ProxyState;
use tls_proxy::routes::RouteTable;
use tls_proxy::{server, tls};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Configuration and certificate material must be complete before we bind
    let config = Config::load_validated().map_err(fatal)?;
    let proxy_config = config.proxy;

    let server_config = tls::load_server_config(&proxy_config.tls).map_err(fatal)?;
    let routes = RouteTable::from_config(&proxy_config).map_err(fatal)?;
    let state = ProxyState::new(routes, proxy_config.secure_transport).map_err(fatal)?;

    for route in state.routes().routes() {
        tracing::info!(
            prefix = %route.prefix,
            upstream = %route.upstream,
            cookie_domain = ?route.cookie.as_ref().map(|c| &c.domain),
            "Route loaded"
        );
    }

    tracing::info!(
        "Starting TLS proxy on {} (default upstream {})",
        proxy_config.listen_addr,
        proxy_config.upstream
    );

    let bound = server::bind(&proxy_config, server_config, state)?;
    for addr in &bound.addrs {
        tracing::info!("Listening on https://{}", addr);
    }
    bound.server.await?;

    tracing::info!("TLS proxy stopped");
    Ok(())
}

fn fatal<E: std::fmt::Display>(err: E) -> std::io::Error {
    tracing::error!("Startup failed: {}", err);
    std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
}
