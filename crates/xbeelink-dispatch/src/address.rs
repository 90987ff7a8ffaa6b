//! 64-bit and 16-bit node addresses.

use std::fmt;
use std::str::FromStr;

/// Factory-assigned 64-bit serial address of a radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address64(pub u64);

impl Address64 {
    pub const COORDINATOR: Self = Self(0);
    pub const BROADCAST: Self = Self(0x0000_0000_0000_FFFF);

    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Read a big-endian address from the first 8 bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
        Some(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for Address64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for Address64 {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 16).map(Self)
    }
}

impl From<u64> for Address64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Network-assigned 16-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address16(pub u16);

impl Address16 {
    pub const COORDINATOR: Self = Self(0);
    /// Sent when the 16-bit address of the destination is not known.
    pub const UNKNOWN: Self = Self(0xFFFE);

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
        Some(Self(u16::from_be_bytes(raw)))
    }
}

impl fmt::Display for Address16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl FromStr for Address16 {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 4).map(|value| Self(value as u16))
    }
}

/// Full addressing for an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    pub long: Address64,
    pub short: Address16,
}

impl Destination {
    /// Address a node by serial number; the network address is resolved by
    /// the module.
    pub fn new(long: impl Into<Address64>) -> Self {
        Self {
            long: long.into(),
            short: Address16::UNKNOWN,
        }
    }

    pub fn with_short(mut self, short: Address16) -> Self {
        self.short = short;
        self
    }

    pub fn broadcast() -> Self {
        Self::new(Address64::BROADCAST)
    }

    pub fn coordinator() -> Self {
        Self::new(Address64::COORDINATOR)
    }

    /// The 10 addressing bytes as they appear in request frames.
    pub fn to_bytes(self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..8].copy_from_slice(&self.long.to_bytes());
        out[8..].copy_from_slice(&self.short.to_bytes());
        out
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.long, self.short)
    }
}

/// Error parsing a hexadecimal address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {input:?}: expected up to {digits} hex digits")]
pub struct ParseAddressError {
    input: String,
    digits: usize,
}

fn parse_hex(s: &str, digits: usize) -> Result<u64, ParseAddressError> {
    let err = || ParseAddressError {
        input: s.to_string(),
        digits,
    };
    let trimmed = s.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex.is_empty() || hex.len() > digits {
        return Err(err());
    }
    u64::from_str_radix(hex, 16).map_err(|_| err())
}
