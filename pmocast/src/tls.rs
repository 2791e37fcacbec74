//! Connexion TLS au récepteur Cast.
//!
//! Les récepteurs présentent un certificat auto-signé : la chaîne n'est pas
//! vérifiée, seules les signatures de la poignée de main le sont.

use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme, StreamOwned};
use tracing::debug;

use crate::CastError;

/// Certificat client optionnel (fichiers PEM).
///
/// Sans certificat, la connexion se fait sans authentification client, ce
/// que les récepteurs acceptent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsIdentity {
    pub certificate: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
}

impl TlsIdentity {
    pub fn new(certificate: PathBuf, private_key: PathBuf) -> Self {
        Self {
            certificate: Some(certificate),
            private_key: Some(private_key),
        }
    }

    fn load(
        &self,
    ) -> Result<Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>, CastError> {
        let (Some(cert_path), Some(key_path)) = (&self.certificate, &self.private_key) else {
            return Ok(None);
        };

        let certs = CertificateDer::pem_file_iter(cert_path)
            .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
            .map_err(|e| CastError::Identity(format!("{}: {}", cert_path.display(), e)))?;
        if certs.is_empty() {
            return Err(CastError::Identity(format!(
                "{}: no certificate found",
                cert_path.display()
            )));
        }

        let key = PrivateKeyDer::from_pem_file(key_path)
            .map_err(|e| CastError::Identity(format!("{}: {}", key_path.display(), e)))?;

        Ok(Some((certs, key)))
    }
}

#[derive(Debug)]
struct SelfSignedVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for SelfSignedVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Configuration client rustls pour les récepteurs Cast.
pub fn client_config(identity: &TlsIdentity) -> Result<ClientConfig, CastError> {
    let provider: Arc<CryptoProvider> = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let verifier = SelfSignedVerifier {
        algorithms: provider.signature_verification_algorithms,
    };

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier));

    let config = match identity.load()? {
        Some((certs, key)) => builder.with_client_auth_cert(certs, key)?,
        None => builder.with_no_client_auth(),
    };
    Ok(config)
}

/// Ouvre la connexion TCP puis termine la poignée de main TLS.
pub fn connect(
    addr: SocketAddr,
    identity: &TlsIdentity,
    timeout: Duration,
) -> Result<StreamOwned<ClientConnection, TcpStream>, CastError> {
    let config = client_config(identity)?;
    let conn = ClientConnection::new(Arc::new(config), ServerName::from(addr.ip()))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)?;
    tcp.set_nodelay(true)?;
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;

    let mut stream = StreamOwned::new(conn, tcp);
    while stream.conn.is_handshaking() {
        stream.conn.complete_io(&mut stream.sock)?;
    }
    debug!(
        "🔒 TLS established with {} ({:?})",
        addr,
        stream.conn.protocol_version()
    );

    Ok(stream)
}
