//! IP Allow-List
//!
//! Optional per-code restriction to single addresses and CIDR ranges,
//! IPv4 and IPv6. Entries are separated by commas, whitespace or newlines.

use ipnet::IpNet;
use std::net::IpAddr;

use crate::error::{AccessError, AccessResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAllowList {
    entries: Vec<IpNet>,
    raw: String,
}

impl IpAllowList {
    /// Strict parse for administrator input. Blank input means no restriction.
    pub fn parse(raw: &str) -> AccessResult<Option<Self>> {
        let mut entries = Vec::new();
        for token in tokens(raw) {
            let net = parse_entry(token).ok_or_else(|| {
                AccessError::InvalidInput(format!("Invalid IP restriction entry: {}", token))
            })?;
            entries.push(net);
        }

        if entries.is_empty() {
            return Ok(None);
        }
        let raw = entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Some(Self { entries, raw }))
    }

    /// Lenient parse for stored values.
    ///
    /// Unparseable entries are dropped; a non-blank list whose entries are
    /// all invalid matches nothing.
    pub fn from_stored(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        let entries = tokens(raw).filter_map(parse_entry).collect::<Vec<_>>();
        if entries.len() != tokens(raw).count() {
            tracing::warn!(restrictions = raw, "Ignoring unparseable IP restriction entries");
        }
        Some(Self {
            entries,
            raw: raw.to_string(),
        })
    }

    /// Whether `ip` falls inside any entry
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.entries.iter().any(|net| net.contains(&ip))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn parse_entry(token: &str) -> Option<IpNet> {
    token
        .parse::<IpNet>()
        .ok()
        .or_else(|| token.parse::<IpAddr>().ok().map(|ip| IpNet::from(ip.to_canonical())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_single_addresses_and_ranges() {
        let list = IpAllowList::parse("203.0.113.7, 10.0.0.0/8\n2001:db8::/32")
            .unwrap()
            .unwrap();

        assert!(list.contains(ip("203.0.113.7")));
        assert!(!list.contains(ip("203.0.113.8")));
        assert!(list.contains(ip("10.42.1.9")));
        assert!(list.contains(ip("2001:db8:1::5")));
        assert!(!list.contains(ip("2001:db9::1")));
    }

    #[test]
    fn test_ipv4_mapped_client_matches_ipv4_entry() {
        let list = IpAllowList::parse("192.0.2.1").unwrap().unwrap();
        assert!(list.contains(ip("::ffff:192.0.2.1")));
    }

    #[test]
    fn test_blank_means_unrestricted() {
        assert_eq!(IpAllowList::parse("  ,\n").unwrap(), None);
        assert_eq!(IpAllowList::from_stored(""), None);
    }

    #[test]
    fn test_strict_parse_rejects_garbage() {
        assert!(matches!(
            IpAllowList::parse("10.0.0.1, banana"),
            Err(AccessError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stored_garbage_fails_closed() {
        let list = IpAllowList::from_stored("banana").unwrap();
        assert!(!list.contains(ip("127.0.0.1")));

        let list = IpAllowList::from_stored("banana, 127.0.0.1").unwrap();
        assert!(list.contains(ip("127.0.0.1")));
    }
}
