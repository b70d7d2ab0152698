//! TLS termination
//!
//! Builds a `TlsAcceptor` from a PEM certificate chain and private key.

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsFiles;
use crate::error::{AppError, Result};

/// Install the process-wide rustls crypto provider
///
/// Safe to call more than once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Load the certificate and key files and build an acceptor
pub fn load_acceptor(files: &TlsFiles) -> Result<TlsAcceptor> {
    let cert_pem = read_file(&files.cert).map_err(AppError::Certificate)?;
    let key_pem = read_file(&files.key).map_err(AppError::PrivateKey)?;
    acceptor_from_pem(&cert_pem, &key_pem)
}

/// Build an acceptor from PEM bytes
pub fn acceptor_from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<TlsAcceptor> {
    let certs = parse_certificates(cert_pem)?;
    if certs.is_empty() {
        return Err(AppError::Certificate("no certificates found".into()));
    }
    let key = parse_private_key(key_pem)?;

    install_crypto_provider();
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| AppError::Tls(format!("server config error: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_file(path: &Path) -> std::result::Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

/// Parse PEM-encoded certificates.
fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AppError::Certificate(format!("failed to parse certificates: {e}")))
}

/// Parse PEM-encoded private key.
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| AppError::PrivateKey(format!("failed to parse private key: {e}")))
}
