use thiserror::Error;

/// Failure modes of a single candidate trial.
///
/// These are candidate-local: the sweep classifies them and moves on to the
/// next address, they never abort a target.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("tcp connect timed out")]
    ConnectTimeout,

    #[error("tcp connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("tls handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    #[error("peer certificate could not be parsed: {0}")]
    CertParse(String),

    #[error("peer certificate has expired")]
    CertExpired,

    #[error("peer certificate carries no usable alternate names")]
    NoAltNames,

    #[error("http exchange failed: {0}")]
    Http(#[source] std::io::Error),
}
