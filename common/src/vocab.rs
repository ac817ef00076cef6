//! Hostname vocabulary and cipher table backing the per-process
//! fingerprint randomization: the decoy SNI host presented during
//! handshakes, the prefix words substituted into wildcard certificate
//! names, and the one cipher suite excluded for the lifetime of the run.

use rand::Rng;

pub const DOMAIN_PREFIXES: [&str; 28] = [
    "imgs", "dl", "www", "docs", "mail", "cdn", "ftp", "my", "wiki", "account", "store", "shop",
    "pay", "buy", "log", "jira", "email", "sql", "db", "ssl", "smile", "img", "cn", "login", "get",
    "push", "cache", "mm",
];

const DOMAIN_SLDS: [&str; 22] = [
    "apple",
    "ubuntu",
    "paypal",
    "ebay",
    "amazon",
    "intel",
    "images-amazon",
    "hotmail",
    "bestbuy",
    "microsoft",
    "linode",
    "digitialocean",
    "sandisk",
    "neweggs",
    "akamiedia",
    "sonymobile",
    "alibaba",
    "apache",
    "sina-cdn",
    "people",
    "xiaomi",
    "foxmail",
];

const DOMAIN_TLDS: [&str; 11] = [
    "com", "com", "com", "org", "com", "net", "com", "com", "com", "net", "com",
];

/// TLS cipher suite ids eligible for per-process exclusion. Removing one
/// changes the ClientHello fingerprint; it is not a security control.
pub const CIPHER_SUITES: [u16; 12] = [
    0x1301, 0x1302, 0x1303, 0xc02b, 0xc02f, 0xc02c, 0xc030, 0xcca9, 0xcca8, 0x009c, 0x009d,
    0x002f,
];

/// Assembles a plausible-looking `prefix.sld.tld` decoy hostname.
pub fn decoy_host() -> String {
    let mut rng = rand::rng();
    format!(
        "{}.{}.{}",
        DOMAIN_PREFIXES[rng.random_range(0..DOMAIN_PREFIXES.len())],
        DOMAIN_SLDS[rng.random_range(0..DOMAIN_SLDS.len())],
        DOMAIN_TLDS[rng.random_range(0..DOMAIN_TLDS.len())],
    )
}

/// One prefix word, for turning a wildcard certificate name into a
/// concrete hostname.
pub fn random_prefix() -> &'static str {
    DOMAIN_PREFIXES[rand::rng().random_range(0..DOMAIN_PREFIXES.len())]
}

/// Draws the cipher suite this process will exclude from every handshake.
pub fn pick_disabled_suite() -> u16 {
    CIPHER_SUITES[rand::rng().random_range(0..CIPHER_SUITES.len())]
}
