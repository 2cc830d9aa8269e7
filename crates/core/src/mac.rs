//! Hardware address parsing.
//!
//! Two entry points with different strictness:
//!
//! * [`HardwareAddress::normalize`] is lenient and is used for addresses read
//!   from ARP table dumps, where tools print octets without padding
//!   (`8:0:27:a:b:c`).
//! * [`str::parse`] (via [`FromStr`]) is strict and is used for configured
//!   addresses: six two-digit octets separated consistently by `:` or `-`.

use std::fmt;
use std::str::FromStr;

use macaddr::MacAddr6;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("expected 6 octets, found {0}")]
    OctetCount(usize),
    #[error("invalid octet '{0}'")]
    InvalidOctet(String),
    #[error("missing or mixed octet separators")]
    Separator,
    #[error("malformed hardware address: {0}")]
    Malformed(String),
}

/// A six-octet hardware address in canonical form.
///
/// Displays as uppercase, colon separated, two digits per octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Normalize a loosely formatted address.
    ///
    /// Uppercases, splits on `:` (or `-`), left-pads single digit octets and
    /// rejoins. Returns `None` for anything that is not six hex octets of one
    /// or two digits, so a malformed address is never mistaken for a real one.
    pub fn normalize(address: &str) -> Option<Self> {
        let address = address.trim();
        let separator = if address.contains(':') { ':' } else { '-' };
        let octets = parse_octets(address, separator).ok()?;
        Some(Self::new(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.octets();
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for HardwareAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let has_colon = s.contains(':');
        let has_hyphen = s.contains('-');
        let separator = match (has_colon, has_hyphen) {
            (true, false) => ':',
            (false, true) => '-',
            _ => return Err(AddressError::Separator),
        };

        // MacAddr6 also accepts the dotted `0123.4567.89ab` form
        if s.contains('.') {
            return Err(AddressError::Separator);
        }

        s.parse::<MacAddr6>()
            .map(Self::from)
            .map_err(|e| AddressError::Malformed(e.to_string()))
    }
}

impl From<HardwareAddress> for MacAddr6 {
    fn from(value: HardwareAddress) -> Self {
        let [a, b, c, d, e, f] = value.0;
        MacAddr6::new(a, b, c, d, e, f)
    }
}

impl From<MacAddr6> for HardwareAddress {
    fn from(value: MacAddr6) -> Self {
        let mut octets = [0u8; 6];
        octets.copy_from_slice(value.as_bytes());
        Self(octets)
    }
}

/// Split into six octets of one or two hex digits.
fn parse_octets(s: &str, separator: char) -> Result<[u8; 6], AddressError> {
    let parts: Vec<&str> = s.split(separator).collect();
    if parts.len() != 6 {
        return Err(AddressError::OctetCount(parts.len()));
    }

    let mut octets = [0u8; 6];
    for (octet, part) in octets.iter_mut().zip(parts) {
        let valid = (1..=2).contains(&part.len())
            && part.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(AddressError::InvalidOctet(part.to_string()));
        }
        *octet = u8::from_str_radix(part, 16)
            .map_err(|_| AddressError::InvalidOctet(part.to_string()))?;
    }

    Ok(octets)
}
