//! Store-level record representation.
//!
//! A [`Record`] is the attribute map the store persists for one prize. The
//! engine never manipulates it field by field; it describes changes as a
//! [`MutationList`](crate::mutation::MutationList) and lets the store apply them.

use crate::key::{ConfigurationId, PrizeId, PrizeKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute holding the partition key.
pub const CONFIGURATION_ID: &str = "configuration_id";
/// Attribute holding the sort key.
pub const PRIZE_ID: &str = "prize_id";
/// Last-modified marker, refreshed on every mutating write.
pub const ENTRY_DATE: &str = "entry_date";

/// A single attribute value.
///
/// Numbers are signed so that a store can represent (and the read path can
/// reject) values that violate non-negativity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Integer attribute (counters, dates in epoch millis, enumerations).
    Number(i64),
    /// Boolean attribute.
    Bool(bool),
    /// Text attribute.
    Text(String),
    /// List of strings (tags).
    TextList(Vec<String>),
}

impl AttributeValue {
    /// Numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean value, if this is a bool.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text value, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

/// One persisted prize row: a map from attribute name to value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    attributes: BTreeMap<String, AttributeValue>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
        }
    }

    /// Create a record that carries only its key attributes.
    #[must_use]
    pub fn with_key(key: &PrizeKey) -> Self {
        let mut record = Self::new();
        record.set(CONFIGURATION_ID, key.configuration_id.as_str());
        record.set(PRIZE_ID, key.prize_id.as_str());
        record
    }

    /// Look up an attribute.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.attributes.get(field)
    }

    /// Numeric attribute, `None` when absent or not a number.
    #[must_use]
    pub fn number(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(AttributeValue::as_number)
    }

    /// Whether the attribute exists.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    /// Set an attribute, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(field.into(), value.into());
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<AttributeValue> {
        self.attributes.remove(field)
    }

    /// Iterate over all attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Primary key of this record, if both key attributes are present.
    #[must_use]
    pub fn key(&self) -> Option<PrizeKey> {
        let configuration_id = self.get(CONFIGURATION_ID)?.as_text()?;
        let prize_id = self.get(PRIZE_ID)?.as_text()?;
        Some(PrizeKey {
            configuration_id: ConfigurationId::new(configuration_id),
            prize_id: PrizeId::new(prize_id),
        })
    }
}

impl FromIterator<(String, AttributeValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_through_attributes() {
        let key = PrizeKey::new("cfg", "p1");
        let record = Record::with_key(&key);
        assert_eq!(record.key(), Some(key));
    }

    #[test]
    fn json_uses_plain_values() {
        let mut record = Record::new();
        record.set("total_available", 3_i64);
        record.set("active", true);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"active": true, "total_available": 3}));
    }
}
