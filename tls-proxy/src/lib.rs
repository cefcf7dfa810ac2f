//! TLS-terminating reverse proxy that re-scopes identity-provider session
//! cookies to the first-party origin in front of it.

pub mod cookie;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod tls;
