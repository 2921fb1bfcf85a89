//! IPv4 address validation and canonical formatting
//!
//! Every address stored in a topology uses the canonical form: four octets,
//! each zero-padded to exactly three digits (`192.168.001.100`). Comparisons
//! and file records only ever see this form.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::num::IntErrorKind;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("IP address is empty")]
    Empty,
    #[error("IP address must have 4 segments, found {0}")]
    SegmentCount(usize),
    #[error("IP address segment '{0}' is not a number")]
    SegmentFormat(String),
    #[error("IP address segment '{0}' is outside 0-255")]
    SegmentRange(String),
}

/// An IPv4 address in canonical zero-padded form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalIp(String);

impl CanonicalIp {
    /// Validate a raw address and wrap its canonical form
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        validate_and_format_ip(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to a standard library address
    pub fn to_ipv4(&self) -> Ipv4Addr {
        let mut octets = [0u8; 4];
        for (slot, segment) in octets.iter_mut().zip(self.0.split('.')) {
            // Canonical strings are built from validated octets
            *slot = segment.parse().unwrap_or_default();
        }
        Ipv4Addr::from(octets)
    }
}

impl From<Ipv4Addr> for CanonicalIp {
    fn from(addr: Ipv4Addr) -> Self {
        let [a, b, c, d] = addr.octets();
        Self(format!("{a:03}.{b:03}.{c:03}.{d:03}"))
    }
}

impl FromStr for CanonicalIp {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CanonicalIp {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonicalIp> for String {
    fn from(ip: CanonicalIp) -> Self {
        ip.0
    }
}

impl std::fmt::Display for CanonicalIp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a dotted IPv4 address and return its canonical form
///
/// Input is trimmed first. Each of the four segments must be an integer in
/// `0..=255`; leading zeros are accepted and normalized.
pub fn validate_and_format_ip(raw: &str) -> Result<String, AddressError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Empty);
    }

    let segments: Vec<&str> = trimmed.split('.').collect();
    if segments.len() != 4 {
        return Err(AddressError::SegmentCount(segments.len()));
    }

    let mut octets = Vec::with_capacity(4);
    for segment in segments {
        octets.push(format!("{:03}", parse_octet(segment)?));
    }
    Ok(octets.join("."))
}

fn parse_octet(segment: &str) -> Result<u8, AddressError> {
    let value: i64 = segment.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            AddressError::SegmentRange(segment.to_string())
        }
        _ => AddressError::SegmentFormat(segment.to_string()),
    })?;
    u8::try_from(value).map_err(|_| AddressError::SegmentRange(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pads_each_octet() {
        assert_eq!(validate_and_format_ip("192.168.1.1").unwrap(), "192.168.001.001");
        assert_eq!(validate_and_format_ip("  10.0.0.254 ").unwrap(), "010.000.000.254");
    }

    #[test]
    fn test_canonical_input_is_stable() {
        let once = validate_and_format_ip("192.168.001.100").unwrap();
        assert_eq!(once, "192.168.001.100");
        assert_eq!(validate_and_format_ip(&once).unwrap(), once);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(validate_and_format_ip(""), Err(AddressError::Empty));
        assert_eq!(validate_and_format_ip("   "), Err(AddressError::Empty));
    }

    #[test]
    fn test_rejects_wrong_segment_count() {
        assert_eq!(validate_and_format_ip("1.2.3"), Err(AddressError::SegmentCount(3)));
        assert_eq!(validate_and_format_ip("1.2.3.4.5"), Err(AddressError::SegmentCount(5)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(
            validate_and_format_ip("999.1.1.1"),
            Err(AddressError::SegmentRange("999".to_string()))
        );
        assert_eq!(
            validate_and_format_ip("1.-1.1.1"),
            Err(AddressError::SegmentRange("-1".to_string()))
        );
        assert!(matches!(
            validate_and_format_ip("1.1.1.99999999999999999999"),
            Err(AddressError::SegmentRange(_))
        ));
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert_eq!(
            validate_and_format_ip("1.a.1.1"),
            Err(AddressError::SegmentFormat("a".to_string()))
        );
        assert_eq!(
            validate_and_format_ip("1..1.1"),
            Err(AddressError::SegmentFormat(String::new()))
        );
    }

    #[test]
    fn test_canonical_ip_conversions() {
        let ip: CanonicalIp = "192.168.1.100".parse().unwrap();
        assert_eq!(ip.as_str(), "192.168.001.100");
        assert_eq!(ip.to_ipv4(), Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(CanonicalIp::from(Ipv4Addr::new(10, 0, 0, 1)).to_string(), "010.000.000.001");
    }
}
