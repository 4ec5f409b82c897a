//! Mesh unicast addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// 16-bit mesh node address.
///
/// The gateway prints addresses as bare hexadecimal (`00AB`); operators may
/// also type them with a `0x` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress(pub u16);

impl NodeAddress {
    /// Raw address value.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Parse a hexadecimal address token, with or without `0x`.
    pub fn parse_hex(token: &str) -> Option<Self> {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u16::from_str_radix(digits, 16).ok().map(NodeAddress)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl FromStr for NodeAddress {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeAddress::parse_hex(s).ok_or_else(|| ProtocolError::InvalidField {
            op: "address",
            field: "address",
            value: s.to_string(),
        })
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeAddress> for String {
    fn from(address: NodeAddress) -> Self {
        format!("{:04X}", address.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_and_prefixed() {
        assert_eq!(NodeAddress::parse_hex("00AB"), Some(NodeAddress(0x00AB)));
        assert_eq!(NodeAddress::parse_hex("0x000d"), Some(NodeAddress(0x000D)));
        assert_eq!(NodeAddress::parse_hex("ffff"), Some(NodeAddress(0xFFFF)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(NodeAddress::parse_hex(""), None);
        assert_eq!(NodeAddress::parse_hex("0x"), None);
        assert_eq!(NodeAddress::parse_hex("12345"), None);
        assert_eq!(NodeAddress::parse_hex("zz"), None);
        assert_eq!(NodeAddress::parse_hex("+AB"), None);
        assert_eq!(NodeAddress::parse_hex("0x+1"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeAddress(0x00AB).to_string(), "0x00AB");
        assert_eq!(String::from(NodeAddress(0x0D)), "000D");
    }
}
