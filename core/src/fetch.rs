//! Fronted HTTP fetches through an already-validated endpoint.
//!
//! Used after the first acceptance to pull the allow-list and the
//! refreshed target document over the tunnel that just proved itself.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use rustls::ClientConfig;
use tokio::net::TcpStream;
use tracing::debug;

use frontr_protocols::{http, tls};

use crate::probe::FRONT_PORT;

pub const ALLOWLIST_PATH: &str = "v3/get/whitelist";
pub const DOCUMENT_PATH: &str = "v3/get/frontlist";

/// GET `path` from the hidden host by connecting to `addr` and presenting
/// `front_host` in the handshake.
pub async fn fronted_get(
    tls_config: Arc<ClientConfig>,
    addr: Ipv4Addr,
    front_host: &str,
    hidden_host: &str,
    path: &str,
) -> io::Result<http::Response> {
    debug!(%addr, front_host, hidden_host, path, "fronted fetch");
    let tcp = TcpStream::connect(SocketAddr::from((addr, FRONT_PORT))).await?;
    let stream = tls::handshake(tls_config, front_host, tcp).await?;
    http::get(stream, hidden_host, path).await
}
