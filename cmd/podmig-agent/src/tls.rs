//! Client TLS for the host checkpoint endpoint.
//!
//! The credential is discovered from the canonical kubelet paths, first
//! complete (cert, key, CA) triple wins. The host presents a serving cert
//! for its node name, which the agent dials as `localhost`, so peer-name
//! verification is disabled while chain validation against the discovered
//! CA stays on.

use anyhow::{Context, Result, bail};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use std::sync::Arc;
use tracing::info;

use pkg_constants::paths::CLIENT_CERT_CANDIDATES;

struct Credential {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    ca: Vec<CertificateDer<'static>>,
}

fn load_triple(cert_path: &str, key_path: &str, ca_path: &str) -> Result<Credential> {
    let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(cert_path)
        .with_context(|| format!("reading client cert {}", cert_path))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("parsing client cert {}", cert_path))?;
    if chain.is_empty() {
        bail!("no certificates in {}", cert_path);
    }
    let key = PrivateKeyDer::from_pem_file(key_path)
        .with_context(|| format!("reading client key {}", key_path))?;
    let ca: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(ca_path)
        .with_context(|| format!("reading CA {}", ca_path))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("parsing CA {}", ca_path))?;
    if ca.is_empty() {
        bail!("no certificates in {}", ca_path);
    }
    Ok(Credential { chain, key, ca })
}

fn discover() -> Result<Credential> {
    for (cert_path, key_path, ca_path) in CLIENT_CERT_CANDIDATES {
        match load_triple(cert_path, key_path, ca_path) {
            Ok(credential) => {
                info!(cert = cert_path, ca = ca_path, "loaded checkpoint endpoint credential");
                return Ok(credential);
            }
            Err(_) => continue,
        }
    }
    bail!("no complete client credential triple found on this host")
}

/// Delegates to webpki chain validation but accepts any peer name.
#[derive(Debug)]
struct SkipServerName {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for SkipServerName {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => Ok(verified),
            Err(rustls::Error::InvalidCertificate(CertificateError::NotValidForName)) => {
                Ok(ServerCertVerified::assertion())
            }
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            Err(e) => Err(e),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Mutual-TLS client config for the host checkpoint endpoint.
pub fn client_config() -> Result<ClientConfig> {
    let credential = discover()?;

    let mut roots = RootCertStore::empty();
    for ca in &credential.ca {
        roots
            .add(ca.clone())
            .context("adding CA certificate to the root store")?;
    }
    let webpki = WebPkiServerVerifier::builder(Arc::new(roots))
        .build()
        .context("building server certificate verifier")?;

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerName { inner: webpki }))
        .with_client_auth_cert(credential.chain, credential.key)
        .context("configuring client certificate")?;
    Ok(config)
}
