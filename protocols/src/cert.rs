//! Peer-certificate inspection: expiry and alternate-name harvesting.
//!
//! Works on the raw DER certificate rustls exposes after the handshake;
//! only DNS subject-alternative-names are of interest, since they are the
//! pool of usable front hostnames.

use rustls::pki_types::CertificateDer;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// What the peer proved about itself, as far as fronting cares.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    /// DNS subject-alternative-name entries, in certificate order.
    pub dns_names: Vec<String>,
    pub expired: bool,
}

/// Reads expiry and DNS alternate names from a DER certificate.
pub fn inspect(der: &CertificateDer<'_>) -> Result<PeerIdentity, String> {
    let (_, cert) = X509Certificate::from_der(der.as_ref()).map_err(|e| e.to_string())?;

    let expired = cert.validity().time_to_expiration().is_none();

    let dns_names = match cert.subject_alternative_name() {
        Ok(Some(ext)) => ext
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some((*dns).to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(PeerIdentity { dns_names, expired })
}
