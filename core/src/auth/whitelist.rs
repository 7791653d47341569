//! IP whitelist matching and the constant-time password comparison used by login.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// One IP whitelist entry: either a glob-style pattern (`192.168.1.*`) or a CIDR range
/// (`10.0.0.0/24`). A match grants automatic authentication with `profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistRule {
    pub pattern: String,
    pub profile: String,
}

/// Checks `ip` against `pattern`, treating a `/` as a CIDR range and anything else as a
/// glob pattern matched against the dotted-quad string.
pub fn matches(pattern: &str, ip: Ipv4Addr) -> bool {
    if let Some((network, bits)) = pattern.split_once('/') {
        return matches_cidr(network, bits, ip);
    }
    glob_match::glob_match(pattern, &ip.to_string())
}

fn matches_cidr(network: &str, bits: &str, ip: Ipv4Addr) -> bool {
    let Ok(network_addr) = network.parse::<Ipv4Addr>() else {
        return false;
    };
    let Ok(prefix_len) = bits.parse::<u32>() else {
        return false;
    };
    if prefix_len > 32 {
        return false;
    }
    let mask: u32 = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    };
    let network_bits = u32::from(network_addr) & mask;
    let ip_bits = u32::from(ip) & mask;
    network_bits == ip_bits
}

/// Finds the first whitelist rule matching `ip`, if any.
pub fn find_match(rules: &[WhitelistRule], ip: Ipv4Addr) -> Option<&WhitelistRule> {
    rules.iter().find(|rule| matches(&rule.pattern, ip))
}

/// Constant-time comparison of a candidate password against the configured one.
///
/// Lengths are compared first only to short-circuit the common mismatched-length case;
/// this leaks length, not content, and the value comparison itself stays constant-time.
pub fn password_matches(candidate: &str, configured: &str) -> bool {
    if candidate.len() != configured.len() {
        return false;
    }
    candidate.as_bytes().ct_eq(configured.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_pattern_matches_within_subnet() {
        assert!(matches("192.168.1.*", "192.168.1.42".parse().unwrap()));
        assert!(!matches("192.168.1.*", "192.168.2.42".parse().unwrap()));
    }

    #[test]
    fn cidr_pattern_matches_within_range() {
        assert!(matches("10.0.0.0/24", "10.0.0.200".parse().unwrap()));
        assert!(!matches("10.0.0.0/24", "10.0.1.1".parse().unwrap()));
    }

    #[test]
    fn cidr_slash_32_matches_only_the_exact_address() {
        assert!(matches("10.0.0.5/32", "10.0.0.5".parse().unwrap()));
        assert!(!matches("10.0.0.5/32", "10.0.0.6".parse().unwrap()));
    }

    #[test]
    fn find_match_returns_the_matching_rule_profile() {
        let rules = vec![
            WhitelistRule { pattern: "10.0.0.0/8".into(), profile: "trusted".into() },
            WhitelistRule { pattern: "192.168.1.*".into(), profile: "lan".into() },
        ];
        let found = find_match(&rules, "192.168.1.5".parse().unwrap()).unwrap();
        assert_eq!(found.profile, "lan");
    }

    #[test]
    fn password_matches_requires_exact_equality() {
        assert!(password_matches("hunter2", "hunter2"));
        assert!(!password_matches("hunter2", "hunter3"));
        assert!(!password_matches("short", "muchlonger"));
    }
}
