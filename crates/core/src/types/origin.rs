//! Anonymous caller identity.

use core::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Network address of an anonymous caller, used as the daily quota key.
///
/// Built from a parsed [`IpAddr`] so that the same address always produces
/// the same key regardless of how a proxy header spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for Origin {
    fn from(ip: IpAddr) -> Self {
        // Collapse IPv4-mapped IPv6 addresses onto their IPv4 form.
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
            IpAddr::V4(_) => ip,
        };
        Self(ip.to_string())
    }
}

impl From<String> for Origin {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for Origin {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_from_ipv4() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(Origin::from(ip).as_str(), "127.0.0.1");
    }

    #[test]
    fn test_mapped_ipv6_collapses_to_ipv4() {
        let mapped: IpAddr = "::ffff:10.0.0.7".parse().unwrap();
        let plain: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(Origin::from(mapped), Origin::from(plain));
    }

    #[test]
    fn test_ipv6_is_kept() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(Origin::from(ip).to_string(), "2001:db8::1");
    }
}
