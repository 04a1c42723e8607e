//! Value objects: equality by value, not identity.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances with the same attribute values
/// are the same value. They are immutable once constructed.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Longest internal part number accepted.
pub const MAX_IPN_LEN: usize = 64;

/// Internal part number: the primary key of a stocked item.
///
/// Always trimmed, non-empty, at most [`MAX_IPN_LEN`] characters and free of
/// whitespace or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipn(String);

impl Ipn {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let value = raw.as_ref().trim();
        if value.is_empty() {
            return Err(DomainError::validation("ipn cannot be empty"));
        }
        if value.len() > MAX_IPN_LEN {
            return Err(DomainError::validation(format!(
                "ipn '{value}' exceeds {MAX_IPN_LEN} characters"
            )));
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::validation(format!(
                "ipn '{value}' contains whitespace or control characters"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Ipn {}

impl core::fmt::Display for Ipn {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ipn {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ipn {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ipn> for String {
    fn from(value: Ipn) -> Self {
        value.0
    }
}

impl AsRef<str> for Ipn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
