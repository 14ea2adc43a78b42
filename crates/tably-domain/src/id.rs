//! Newtype wrappers for domain identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the restaurant (tenant) that owns a request or token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestaurantId(pub Uuid);

impl fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RestaurantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Uuid> for RestaurantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifies one authorization request aggregate. All events with the same
/// id form the aggregate's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthRequestId(pub Uuid);

impl AuthRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AuthRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AuthRequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Uuid> for AuthRequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Opaque payment token identifier, always prefixed `pt_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentTokenId(String);

impl PaymentTokenId {
    pub const PREFIX: &'static str = "pt_";

    /// Mint a fresh token id (`pt_` + 32 hex chars from a random UUID).
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a well-formed payment token id.
#[derive(Debug, thiserror::Error)]
#[error("malformed payment token id")]
pub struct MalformedTokenId;

impl FromStr for PaymentTokenId {
    type Err = MalformedTokenId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(Self::PREFIX).ok_or(MalformedTokenId)?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(MalformedTokenId);
        }
        Ok(Self(s.to_owned()))
    }
}
