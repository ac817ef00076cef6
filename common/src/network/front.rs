//! # Fronting Target Model
//!
//! A target is one censored destination reachable by domain fronting,
//! parsed from a single definition line:
//!
//! ```text
//! priority: typedHost/pathPrefix,legacy1,legacy2,cidrOrAddr,...
//! ```
//!
//! The host's first byte is a type tag (`'A'` deprecated, `'B'` active).
//! The two fields after the host/path segment are legacy carry-overs and
//! are never parsed as address blocks; blocks start at the fourth field.

use std::net::Ipv4Addr;
use std::str::FromStr;

use super::block::AddrBlock;

pub const TYPE_DEPRECATED: char = 'A';
pub const TYPE_ACTIVE: char = 'B';

/// Number of comma fields preceding the first address block.
const BLOCKS_START_FIELD: usize = 3;

/// A working front endpoint produced by a successful trial.
///
/// Immutable once created; freely shareable across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontEndpoint {
    /// Hostname presented in the TLS handshake for this endpoint.
    pub front_host: String,
    pub addr: Ipv4Addr,
    pub latency_ms: u32,
}

/// One fronting destination and its candidate address blocks.
#[derive(Debug, Clone)]
pub struct FrontTarget {
    pub priority: i32,
    pub type_tag: char,
    /// The censored destination, routed to via the Host header.
    pub hidden_host: String,
    /// Prepended verbatim to every request path for this target.
    pub path_prefix: String,
    /// Configured blocks in definition order; may contain invalid
    /// sentinels, which scanners must skip.
    pub blocks: Vec<AddrBlock>,
}

impl FrontTarget {
    pub fn is_deprecated(&self) -> bool {
        self.type_tag == TYPE_DEPRECATED
    }
}

impl FromStr for FrontTarget {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            return Err(format!("expected one priority separator: {line}"));
        }
        let priority = parts[0]
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid priority '{}': {e}", parts[0].trim()))?;

        let fields: Vec<&str> = parts[1].split(',').map(str::trim).collect();
        let host_path = fields[0];
        let (mut hidden_host, path_prefix) = match host_path.find('/') {
            Some(idx) => (&host_path[..idx], &host_path[idx..]),
            None => (host_path, ""),
        };

        let type_tag = hidden_host
            .chars()
            .next()
            .ok_or_else(|| format!("empty host segment: {line}"))?;
        if type_tag == TYPE_DEPRECATED || type_tag == TYPE_ACTIVE {
            hidden_host = &hidden_host[type_tag.len_utf8()..];
        }
        if hidden_host.is_empty() {
            return Err(format!("empty host behind type tag: {line}"));
        }

        let blocks = fields
            .iter()
            .skip(BLOCKS_START_FIELD)
            .map(|text| AddrBlock::parse(text))
            .collect();

        Ok(Self {
            priority,
            type_tag,
            hidden_host: hidden_host.to_string(),
            path_prefix: path_prefix.to_string(),
            blocks,
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_line_parses_host_path_and_blocks() {
        let target: FrontTarget =
            "5: Bforbidden.example.com/path,CNlegacy1,CNlegacy2,203.0.113.0/24"
                .parse()
                .unwrap();

        assert_eq!(target.priority, 5);
        assert_eq!(target.type_tag, TYPE_ACTIVE);
        assert!(!target.is_deprecated());
        assert_eq!(target.hidden_host, "forbidden.example.com");
        assert_eq!(target.path_prefix, "/path");
        assert_eq!(target.blocks.len(), 1);
        assert_eq!(target.blocks[0].size(), 256);
    }

    #[test]
    fn deprecated_tag_is_recognized_and_stripped() {
        let target: FrontTarget = "8: Aold.example.com/,x,y,192.0.2.0/28"
            .parse()
            .unwrap();
        assert!(target.is_deprecated());
        assert_eq!(target.hidden_host, "old.example.com");
    }

    #[test]
    fn legacy_fields_are_not_parsed_as_blocks() {
        let target: FrontTarget =
            "1: Bhost.example.net/,198.51.100.0/24,203.0.113.0/24,192.0.2.0/24"
                .parse()
                .unwrap();
        // Only the fourth comma field onward counts, even when the legacy
        // fields happen to look like CIDR text.
        assert_eq!(target.blocks.len(), 1);
        assert_eq!(target.blocks[0].size(), 256);
    }

    #[test]
    fn host_without_slash_has_empty_path_prefix() {
        let target: FrontTarget = "3: Bbare.example.org,a,b,192.0.2.1"
            .parse()
            .unwrap();
        assert_eq!(target.path_prefix, "");
        assert_eq!(target.blocks.len(), 1);
        assert_eq!(target.blocks[0].size(), 1);
    }

    #[test]
    fn untagged_host_is_kept_verbatim() {
        let target: FrontTarget = "2: plain.example.org/,a,b".parse().unwrap();
        assert_eq!(target.type_tag, 'p');
        assert_eq!(target.hidden_host, "plain.example.org");
        assert!(target.blocks.is_empty());
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!("no separator here".parse::<FrontTarget>().is_err());
        assert!("a:b:c".parse::<FrontTarget>().is_err());
        assert!("x: Bhost.example.com/".parse::<FrontTarget>().is_err());
        assert!("5: /only-a-path,a,b".parse::<FrontTarget>().is_err());
    }

    #[test]
    fn invalid_blocks_are_kept_as_sentinels() {
        let target: FrontTarget = "4: Bhost.example.com/,a,b,bogus,192.0.2.0/30"
            .parse()
            .unwrap();
        assert_eq!(target.blocks.len(), 2);
        assert!(!target.blocks[0].is_valid());
        assert!(target.blocks[1].is_valid());
    }
}
