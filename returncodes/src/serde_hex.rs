use crate::*;
use crypto_bigint::Encoding;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A big integer that travels as minimal lowercase hex
///
/// Used for group parameters and every encoded group element or exponent on the wire.
/// A `HexInteger` carries no group semantics; it must be decoded against a `ZpSubgroup`
/// before it can be used as a `GroupElement`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexInteger(pub BigInt);

impl HexInteger {
    pub fn value(&self) -> &BigInt {
        &self.0
    }

    /// Parse a hex string, naming `field` in the error
    pub fn parse(s: &str, field: &'static str) -> Result<Self, ConversionError> {
        let digits = s.trim_start_matches('0');
        if digits.len() > BigInt::BYTES * 2 {
            return Err(ConversionError::TooLarge(field));
        }
        if digits.is_empty() {
            return if s.is_empty() {
                Err(ConversionError::BadHex(field))
            } else {
                Ok(HexInteger(BigInt::ZERO))
            };
        }

        let padded = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let bytes = hex::decode(&padded).map_err(|_| ConversionError::BadHex(field))?;

        Ok(HexInteger(bigint_from_be_bytes(&bytes)))
    }
}

impl From<BigInt> for HexInteger {
    fn from(value: BigInt) -> Self {
        HexInteger(value)
    }
}

impl FromStr for HexInteger {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HexInteger::parse(s, "integer")
    }
}

impl fmt::Display for HexInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = hex::encode(self.0.to_be_bytes());
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", trimmed)
        }
    }
}

impl fmt::Debug for HexInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self)
    }
}

impl Serialize for HexInteger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexInteger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HexInteger::from_str(&s).map_err(DeError::custom)
    }
}

/// Read a big-endian byte string of at most `BigInt::BYTES` bytes
pub(crate) fn bigint_from_be_bytes(bytes: &[u8]) -> BigInt {
    let mut buf = [0u8; BigInt::BYTES];
    let start = BigInt::BYTES.saturating_sub(bytes.len());
    let skip = bytes.len().saturating_sub(BigInt::BYTES);
    buf[start..].copy_from_slice(&bytes[skip..]);
    BigInt::from_be_slice(&buf)
}
