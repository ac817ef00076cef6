//! Per-candidate trial state machine.
//!
//! One trial walks `Idle → Connecting → Handshaking → Verifying → Done`;
//! `TimedOut` is reachable only from `Connecting`, which is the single
//! state with its own timer. The handshake presents the session's decoy
//! SNI host; the verification request presents a hostname harvested from
//! the peer certificate while the Host header names the hidden
//! destination.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use frontr_common::error::ProbeError;
use frontr_common::vocab;
use frontr_protocols::{cert, http, tls};

use crate::sweep::CandidateProber;

pub const FRONT_PORT: u16 = 443;
pub const VERIFY_PATH: &str = "v3/test";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const SAN_WILDCARD: char = '*';

/// Lifecycle of one candidate trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Connecting,
    Handshaking,
    Verifying,
    Done,
    TimedOut,
}

/// What a completed trial observed. Whether it counts is the sweep's call.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Concrete front hostname used for the verification request.
    pub front_host: String,
    pub status: u16,
    pub latency_ms: u32,
    pub body: String,
}

/// A single candidate-address trial. Built fresh per candidate.
pub struct FrontProbe {
    decoy_sni: String,
    hidden_host: String,
    path_prefix: String,
    tls_config: Arc<ClientConfig>,
    state: ProbeState,
}

impl FrontProbe {
    pub fn new(
        decoy_sni: String,
        hidden_host: String,
        path_prefix: String,
        tls_config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            decoy_sni,
            hidden_host,
            path_prefix,
            tls_config,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Runs the trial to a terminal state. The caller suspends until the
    /// trial finishes; only the TCP connect carries its own timer.
    pub async fn run(&mut self, addr: Ipv4Addr) -> Result<ProbeReport, ProbeError> {
        let peer = SocketAddr::from((addr, FRONT_PORT));

        self.enter(ProbeState::Connecting);
        let tcp = match timeout(CONNECT_TIMEOUT, TcpStream::connect(peer)).await {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(e)) => return Err(ProbeError::Connect(e)),
            Err(_) => {
                self.enter(ProbeState::TimedOut);
                return Err(ProbeError::ConnectTimeout);
            }
        };

        self.enter(ProbeState::Handshaking);
        let tls_stream = tls::handshake(self.tls_config.clone(), &self.decoy_sni, tcp)
            .await
            .map_err(ProbeError::Handshake)?;

        self.enter(ProbeState::Verifying);
        let identity = {
            let (_, session) = tls_stream.get_ref();
            let der = session
                .peer_certificates()
                .and_then(|certs| certs.first())
                .ok_or_else(|| ProbeError::CertParse("no peer certificate".to_string()))?;
            cert::inspect(der).map_err(ProbeError::CertParse)?
        };
        drop(tls_stream);

        if identity.expired {
            return Err(ProbeError::CertExpired);
        }
        if identity.dns_names.is_empty() {
            return Err(ProbeError::NoAltNames);
        }

        let san = &identity.dns_names[rand::rng().random_range(0..identity.dns_names.len())];
        let front_host = resolve_front_host(san);
        debug!(
            %addr,
            san,
            front = %front_host,
            decoy = %self.decoy_sni,
            "issuing fronted verification request"
        );

        // Verification rides a fresh connection to the same address, with
        // the harvested name in the handshake this time.
        let path = format!("{}{}", self.path_prefix, VERIFY_PATH);
        let started = Instant::now();
        let tcp = TcpStream::connect(peer).await.map_err(ProbeError::Connect)?;
        let tls_stream = tls::handshake(self.tls_config.clone(), &front_host, tcp)
            .await
            .map_err(ProbeError::Handshake)?;
        let response = http::get(tls_stream, &self.hidden_host, &path)
            .await
            .map_err(ProbeError::Http)?;
        let latency_ms = started.elapsed().as_millis() as u32;

        self.enter(ProbeState::Done);
        debug!(
            %addr,
            front = %front_host,
            status = response.status,
            latency_ms,
            "trial complete"
        );

        Ok(ProbeReport {
            front_host,
            status: response.status,
            latency_ms,
            body: response.body,
        })
    }

    fn enter(&mut self, next: ProbeState) {
        trace!(from = ?self.state, to = ?next, "probe transition");
        self.state = next;
    }
}

/// Turns a harvested certificate name into a concrete front hostname,
/// filling a leading wildcard label from the prefix vocabulary.
fn resolve_front_host(san: &str) -> String {
    match san.strip_prefix(SAN_WILDCARD) {
        Some(rest) => format!("{}{}", vocab::random_prefix(), rest),
        None => san.to_string(),
    }
}

/// Builds one fresh [`FrontProbe`] per candidate, so trial state never
/// leaks between addresses.
pub struct ProbeRunner {
    decoy_sni: String,
    hidden_host: String,
    path_prefix: String,
    tls_config: Arc<ClientConfig>,
}

impl ProbeRunner {
    pub fn new(
        decoy_sni: String,
        hidden_host: String,
        path_prefix: String,
        tls_config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            decoy_sni,
            hidden_host,
            path_prefix,
            tls_config,
        }
    }
}

#[async_trait]
impl CandidateProber for ProbeRunner {
    async fn probe(&mut self, addr: Ipv4Addr) -> Result<ProbeReport, ProbeError> {
        let mut probe = FrontProbe::new(
            self.decoy_sni.clone(),
            self.hidden_host.clone(),
            self.path_prefix.clone(),
            self.tls_config.clone(),
        );
        probe.run(addr).await
    }
}
