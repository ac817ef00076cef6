//! Wire-level primitives for front discovery: the permissive TLS client
//! layer, peer-certificate inspection, and a minimal HTTP/1.1 exchange.
//!
//! Higher layers sequence these into probes; nothing here knows about
//! targets, thresholds, or persistence.

pub mod cert;
pub mod http;
pub mod tls;
