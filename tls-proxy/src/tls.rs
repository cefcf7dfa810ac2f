// tls-proxy/src/tls.rs
//! Server certificate loading for the TLS listener.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::TlsConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate material configured")]
    MissingMaterial,

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("private key error: {0}")]
    PrivateKey(String),

    #[error("PKCS#12 error: {0}")]
    Pkcs12(String),

    #[error("TLS configuration error: {0}")]
    Config(#[from] rustls::Error),
}

/// Build the rustls server configuration from whichever material is
/// configured. Called once before the listener binds.
pub fn load_server_config(config: &TlsConfig) -> Result<ServerConfig, TlsError> {
    let (certs, key) = match (&config.cert_path, &config.key_path, &config.pkcs12_path) {
        (Some(cert_path), Some(key_path), None) => {
            let certs = parse_certificates(&read(cert_path)?)?;
            let key = parse_private_key(&read(key_path)?)?;
            (certs, key)
        }
        (None, None, Some(bundle_path)) => {
            let passphrase = config.passphrase.as_deref().unwrap_or_default();
            parse_pkcs12(&read(bundle_path)?, passphrase)?
        }
        _ => return Err(TlsError::MissingMaterial),
    };

    tracing::info!("Loaded {} certificate(s) for the TLS listener", certs.len());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut server_config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(server_config)
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Certificate(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(TlsError::Certificate("no certificates found".into()));
    }
    Ok(certs)
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| TlsError::PrivateKey(format!("failed to parse private key: {e}")))
}

fn parse_pkcs12(
    data: &[u8],
    passphrase: &str,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TlsError> {
    let keystore = p12_keystore::KeyStore::from_pkcs12(data, passphrase)
        .map_err(|e| TlsError::Pkcs12(e.to_string()))?;

    let (alias, chain) = keystore
        .private_key_chain()
        .ok_or_else(|| TlsError::Pkcs12("bundle holds no private key".into()))?;
    tracing::debug!("Using PKCS#12 key entry '{}'", alias);

    let certs: Vec<CertificateDer<'static>> = chain
        .chain()
        .iter()
        .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
        .collect();
    if certs.is_empty() {
        return Err(TlsError::Pkcs12("bundle holds no certificate chain".into()));
    }

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(chain.key().to_vec()));
    Ok((certs, key))
}
