//! TCP connect + TLS handshake against a single address.
//!
//! A probe gets one absolute deadline that covers both phases. Whatever is
//! left of it after the TCP connect is all the handshake gets.

use crate::error::{ProbePhase, ReachError};
use crate::types::ProbeOutcome;
use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Check one address of a domain before `deadline`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, domain: &str, addr: IpAddr, port: u16, deadline: Instant)
        -> ProbeOutcome;
}

/// Prober that opens a real TCP connection and runs a rustls client handshake.
#[derive(Clone)]
pub struct TlsProber {
    connector: TlsConnector,
}

impl TlsProber {
    /// Create a prober that trusts the Mozilla root set from `webpki-roots`.
    pub fn new() -> Result<Self, ReachError> {
        let root_store = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| ReachError::internal(format!("TLS client setup failed: {}", e)))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self::with_client_config(Arc::new(config)))
    }

    /// Create a prober from a prepared rustls client configuration.
    pub fn with_client_config(config: Arc<ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
        }
    }

    /// Handshake over a connected stream, using only what is left before `deadline`.
    async fn handshake<S>(
        &self,
        domain: &str,
        stream: S,
        deadline: Instant,
        budget: std::time::Duration,
    ) -> Result<(), ReachError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = server_name(domain)?;

        match timeout_at(deadline, self.connector.connect(server_name, stream)).await {
            // The TLS stream is dropped here, which closes the connection.
            Ok(Ok(_tls)) => Ok(()),
            Ok(Err(e)) => Err(ReachError::handshake(e.to_string())),
            Err(_) => Err(ReachError::timeout(ProbePhase::Handshake, budget)),
        }
    }
}

impl std::fmt::Debug for TlsProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsProber").finish_non_exhaustive()
    }
}

#[async_trait]
impl Probe for TlsProber {
    async fn probe(
        &self,
        domain: &str,
        addr: IpAddr,
        port: u16,
        deadline: Instant,
    ) -> ProbeOutcome {
        let target = SocketAddr::new(addr, port);
        let budget = deadline.saturating_duration_since(Instant::now());

        let stream = match timeout_at(deadline, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!("connect to {} for {} failed: {}", target, domain, e);
                return ProbeOutcome::ConnectFailed {
                    addr,
                    error: ReachError::connect(e.to_string()),
                };
            }
            Err(_) => {
                debug!("connect to {} for {} timed out", target, domain);
                return ProbeOutcome::ConnectFailed {
                    addr,
                    error: ReachError::timeout(ProbePhase::Connect, budget),
                };
            }
        };

        match self.handshake(domain, stream, deadline, budget).await {
            Ok(()) => {
                debug!("handshake with {} for {} succeeded", target, domain);
                ProbeOutcome::Success { addr }
            }
            Err(error) => {
                debug!("handshake with {} for {} failed: {}", target, domain, error);
                ProbeOutcome::HandshakeFailed { addr, error }
            }
        }
    }
}

/// SNI value for `domain`; a trailing root dot is not sent.
fn server_name(domain: &str) -> Result<ServerName<'static>, ReachError> {
    let name = domain.trim().trim_end_matches('.');
    ServerName::try_from(name)
        .map(|name| name.to_owned())
        .map_err(|e| ReachError::invalid_domain(domain, e.to_string()))
}
