//! Prize identity types.
//!
//! A prize is addressed by the pair `(configuration_id, prize_id)`: the
//! configuration groups prizes by promotion (partition key) and the prize id is
//! unique within it (sort key).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for key parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid prize key: {0}")]
pub struct ParseKeyError(String);

/// Identifier of the promotion configuration a prize belongs to.
///
/// # Validation
///
/// - `FromStr::from_str()`: rejects empty strings
/// - `From::from()` and `new()`: no validation (trusted input)
///
/// # Examples
///
/// ```
/// use prize_inventory_core::key::ConfigurationId;
///
/// let id = ConfigurationId::new("summer-promo");
/// assert_eq!(id.as_str(), "summer-promo");
/// assert!("".parse::<ConfigurationId>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationId(String);

impl ConfigurationId {
    /// Create a new `ConfigurationId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the configuration ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConfigurationId {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseKeyError(
                "Configuration ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for ConfigurationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConfigurationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a prize, unique within its configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrizeId(String);

impl PrizeId {
    /// Create a new `PrizeId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random prize id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get the prize ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrizeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrizeId {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseKeyError("Prize ID cannot be empty".to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for PrizeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PrizeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Primary key of a prize record.
///
/// # Examples
///
/// ```
/// use prize_inventory_core::key::PrizeKey;
///
/// let key = PrizeKey::new("summer-promo", "free-coffee");
/// assert_eq!(key.to_string(), "summer-promo/free-coffee");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrizeKey {
    /// Partition key.
    pub configuration_id: ConfigurationId,
    /// Sort key.
    pub prize_id: PrizeId,
}

impl PrizeKey {
    /// Create a key from its two components.
    #[must_use]
    pub fn new(configuration_id: impl Into<ConfigurationId>, prize_id: impl Into<PrizeId>) -> Self {
        Self {
            configuration_id: configuration_id.into(),
            prize_id: prize_id.into(),
        }
    }
}

impl fmt::Display for PrizeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.configuration_id, self.prize_id)
    }
}
