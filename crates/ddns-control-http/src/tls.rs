// # TLS Material
//
// Loads the PEM certificate chain and private key for the HTTPS listener.
// Missing or unusable material is a configuration error; the daemon treats
// it as fatal at startup.

use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::crypto::ring::default_provider;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};

use ddns_core::{Error, Result};

/// Build a server config from PEM files
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let chain = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::config(format!("Unsupported TLS protocol versions: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| {
            Error::config(format!(
                "TLS certificate {} does not match key {}: {}",
                cert_path.display(),
                key_path.display(),
                e
            ))
        })?;

    Ok(Arc::new(config))
}

/// [`load_tls_config`] wrapped in an acceptor
pub fn tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    Ok(TlsAcceptor::from(load_tls_config(cert_path, key_path)?))
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::config(format!("Unable to open {} {}: {}", what, path.display(), e)))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path, "certificate file")?;

    let chain = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            Error::config(format!(
                "Failed to parse certificates from {}: {}",
                path.display(),
                e
            ))
        })?;

    if chain.is_empty() {
        return Err(Error::config(format!(
            "No certificates found in {}",
            path.display()
        )));
    }

    Ok(chain)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = open(path, "private key file")?;

    private_key(&mut reader)
        .map_err(|e| {
            Error::config(format!(
                "Failed to parse private key from {}: {}",
                path.display(),
                e
            ))
        })?
        .ok_or_else(|| Error::config(format!("No private key found in {}", path.display())))
}
