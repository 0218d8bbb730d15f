//! Prize attributes, enumerations and the typed create/update inputs.
//!
//! Counters are not representable in [`PrizeUpdate`]; they change only through
//! the transition builders.

use crate::counter::{Counter, CounterDecodeError, Counters};
use crate::error::ValidationError;
use crate::key::{ConfigurationId, PrizeId, PrizeKey};
use crate::mutation::{MutationList, Predicate};
use crate::record::{AttributeValue, ENTRY_DATE, PRIZE_ID, Record};
use crate::store::{PutItem, UpdateItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Persisted attribute names of non-counter prize fields.
pub mod attr {
    #![allow(missing_docs)]

    pub const NAME: &str = "name";
    pub const DESC: &str = "desc";
    pub const SHORT_DESC: &str = "short_desc";
    pub const REDEEM_DESC: &str = "redeem_desc";
    pub const ACTIVE: &str = "active";
    pub const COST: &str = "cost";
    pub const IMG_URL: &str = "img_url";
    pub const IMAGES_METADATA: &str = "images_metadata";
    pub const DELIVERY_TYPE: &str = "delivery_type";
    pub const REDEMPTION_LINK: &str = "redemption_link";
    pub const BARCODE_TYPE: &str = "barcode_type";
    pub const PRIORITY: &str = "priority";
    pub const TAGS: &str = "tags";
    pub const TIER: &str = "tier";
    pub const REDEMPTION_LIMIT: &str = "redemption_limit";
    pub const MIN_AGE: &str = "min_age";
    pub const FINAL_STATE: &str = "final_state";
    pub const ACTIVE_PARTITION: &str = "active_partition";
    pub const TOTAL_PARTITIONS: &str = "total_partitions";
    pub const AUTO_UPLOAD_VOUCHERS: &str = "auto_upload_vouchers";
    pub const HAS_END_DATE: &str = "has_end_date";
    pub const END_DATE: &str = "end_date";
    pub const START_DATE: &str = "start_date";
    pub const VALIDITY_PERIOD_AFTER_CLAIM: &str = "validity_period_after_claim";
    pub const POOL_PRIZE: &str = "pool_prize";
    pub const WINNING_RATIO: &str = "winning_ratio";
    pub const AUTO_REDEEM: &str = "auto_redeem";
    pub const HAS_EXPIRABLE_MOMENTS: &str = "has_expirable_moments";
}

/// How a prize reaches the winner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryType {
    /// Digital code.
    Digital = 1,
    /// Physical shipment.
    Physical = 2,
}

impl DeliveryType {
    /// Stored numeric value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for DeliveryType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Digital),
            2 => Ok(Self::Physical),
            other => Err(other),
        }
    }
}

/// Barcode symbology printed with a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeType {
    /// No barcode.
    None = 0,
    /// QR code.
    QrCode = 1,
    /// Code 128.
    Code128 = 2,
    /// Code 32.
    Code32 = 3,
    /// Data Matrix.
    DataMatrix = 4,
    /// UPC.
    Upc = 5,
}

impl BarcodeType {
    /// Stored numeric value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for BarcodeType {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::QrCode),
            2 => Ok(Self::Code128),
            3 => Ok(Self::Code32),
            4 => Ok(Self::DataMatrix),
            5 => Ok(Self::Upc),
            other => Err(other),
        }
    }
}

/// Terminal disposition once a winner holds the prize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    /// The prize ends in `redeemed`.
    Redeemed,
    /// The prize ends in `claimed`.
    Claimed,
}

impl FinalState {
    /// Stored text value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redeemed => "redeemed",
            Self::Claimed => "claimed",
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FinalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redeemed" => Ok(Self::Redeemed),
            "claimed" => Ok(Self::Claimed),
            other => Err(other.to_string()),
        }
    }
}

/// Error decoding a [`Prize`] view from a stored record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrizeDecodeError {
    /// Key attributes are missing.
    #[error("Record has no prize key")]
    MissingKey,
    /// A counter is malformed.
    #[error(transparent)]
    Counter(#[from] CounterDecodeError),
    /// An attribute holds a value of the wrong type or outside its enumeration.
    #[error("Attribute {field} has an invalid value")]
    InvalidAttribute {
        /// Attribute name.
        field: &'static str,
    },
}

/// Typed read view of a prize record.
///
/// Fields the engine reasons about are decoded; everything else stays
/// available through [`Prize::attributes`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prize {
    /// Primary key.
    pub key: PrizeKey,
    /// Inventory counters.
    pub counters: Counters,
    /// Stored (or, for date-window listings, derived) active flag.
    pub active: bool,
    /// Delivery type, when set.
    pub delivery_type: Option<DeliveryType>,
    /// Barcode type, when set.
    pub barcode_type: Option<BarcodeType>,
    /// Final state, when set.
    pub final_state: Option<FinalState>,
    /// Start of the validity window (epoch millis).
    pub start_date: Option<i64>,
    /// End of the validity window (epoch millis).
    pub end_date: Option<i64>,
    /// Whether the prize takes part in end-date sweeps.
    pub has_end_date: bool,
    /// Whether vouchers are topped up automatically.
    pub auto_upload_vouchers: bool,
    /// Partition redemption draws from.
    pub active_partition: Option<u32>,
    /// Highest partition allocated.
    pub total_partitions: Option<u32>,
    /// Last-modified marker (epoch millis).
    pub entry_date: Option<i64>,
    /// Raw stored attributes.
    pub attributes: Record,
}

impl Prize {
    /// Decode a stored record.
    ///
    /// # Errors
    ///
    /// Returns [`PrizeDecodeError`] when the key is missing, a counter is
    /// negative or an attribute has the wrong type.
    pub fn from_record(record: Record) -> Result<Self, PrizeDecodeError> {
        let key = record.key().ok_or(PrizeDecodeError::MissingKey)?;
        let counters = Counters::from_record(&record)?;

        Ok(Self {
            key,
            counters,
            active: bool_attr(&record, attr::ACTIVE)?.unwrap_or(false),
            delivery_type: enum_attr(&record, attr::DELIVERY_TYPE, DeliveryType::try_from)?,
            barcode_type: enum_attr(&record, attr::BARCODE_TYPE, BarcodeType::try_from)?,
            final_state: match record.get(attr::FINAL_STATE) {
                None => None,
                Some(value) => Some(
                    value
                        .as_text()
                        .and_then(|s| s.parse().ok())
                        .ok_or(PrizeDecodeError::InvalidAttribute {
                            field: attr::FINAL_STATE,
                        })?,
                ),
            },
            start_date: number_attr(&record, attr::START_DATE)?,
            end_date: number_attr(&record, attr::END_DATE)?,
            has_end_date: bool_attr(&record, attr::HAS_END_DATE)?.unwrap_or(false),
            auto_upload_vouchers: bool_attr(&record, attr::AUTO_UPLOAD_VOUCHERS)?.unwrap_or(false),
            active_partition: partition_attr(&record, attr::ACTIVE_PARTITION)?,
            total_partitions: partition_attr(&record, attr::TOTAL_PARTITIONS)?,
            entry_date: number_attr(&record, ENTRY_DATE)?,
            attributes: record,
        })
    }
}

fn number_attr(record: &Record, field: &'static str) -> Result<Option<i64>, PrizeDecodeError> {
    record
        .get(field)
        .map(|v| v.as_number().ok_or(PrizeDecodeError::InvalidAttribute { field }))
        .transpose()
}

fn bool_attr(record: &Record, field: &'static str) -> Result<Option<bool>, PrizeDecodeError> {
    record
        .get(field)
        .map(|v| v.as_bool().ok_or(PrizeDecodeError::InvalidAttribute { field }))
        .transpose()
}

fn partition_attr(record: &Record, field: &'static str) -> Result<Option<u32>, PrizeDecodeError> {
    number_attr(record, field)?
        .map(|n| u32::try_from(n).map_err(|_| PrizeDecodeError::InvalidAttribute { field }))
        .transpose()
}

fn enum_attr<T>(
    record: &Record,
    field: &'static str,
    decode: impl Fn(i64) -> Result<T, i64>,
) -> Result<Option<T>, PrizeDecodeError> {
    number_attr(record, field)?
        .map(|n| decode(n).map_err(|_| PrizeDecodeError::InvalidAttribute { field }))
        .transpose()
}

/// Loosely typed creation input, as received from an administrative caller.
///
/// [`PrizeDraft::validate`] turns it into a [`NewPrize`] or reports every
/// missing and invalid attribute at once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrizeDraft {
    /// Owning configuration (mandatory).
    pub configuration_id: Option<String>,
    /// Prize id; generated when absent.
    pub prize_id: Option<String>,
    /// Display name (mandatory).
    pub name: Option<String>,
    /// Description (mandatory).
    pub desc: Option<String>,
    /// Active flag (mandatory).
    pub active: Option<bool>,
    /// Raw delivery type (mandatory, see [`DeliveryType`]).
    pub delivery_type: Option<i64>,
    /// Raw barcode type (mandatory, see [`BarcodeType`]).
    pub barcode_type: Option<i64>,
    /// Raw final state (see [`FinalState`]).
    pub final_state: Option<String>,
    /// Initial stock; defaults to zero.
    pub total_amount: Option<i64>,
    /// Initial availability; defaults to `total_amount`.
    pub total_available: Option<i64>,
    /// Remaining optional attributes.
    pub details: PrizeUpdate,
}

/// A validated prize ready to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPrize {
    /// Key the prize will be stored under.
    pub key: PrizeKey,
    /// Full initial record, counters included.
    pub record: Record,
}

impl NewPrize {
    /// Put that only succeeds when no prize exists under the same key.
    #[must_use]
    pub fn into_put_item(self) -> PutItem {
        PutItem {
            key: self.key,
            record: self.record,
            condition: Predicate::NotExists(PRIZE_ID.to_string()),
        }
    }
}

impl PrizeDraft {
    /// Validate the draft and build the initial record.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::Missing`] listing every absent mandatory attribute
    /// - [`ValidationError::Invalid`] listing every out-of-range value
    pub fn validate(self, now: DateTime<Utc>) -> Result<NewPrize, ValidationError> {
        let mut missing = Vec::new();
        let mut require = |present: bool, field: &str| {
            if !present {
                missing.push(field.to_string());
            }
        };
        require(
            self.configuration_id.as_ref().is_some_and(|s| !s.is_empty()),
            "configuration_id",
        );
        require(self.name.is_some(), attr::NAME);
        require(self.desc.is_some(), attr::DESC);
        require(self.active.is_some(), attr::ACTIVE);
        require(self.delivery_type.is_some(), attr::DELIVERY_TYPE);
        require(self.barcode_type.is_some(), attr::BARCODE_TYPE);
        if !missing.is_empty() {
            return Err(ValidationError::Missing(missing));
        }

        let mut invalid = Vec::new();
        let delivery_type = self.delivery_type.and_then(|n| DeliveryType::try_from(n).ok());
        if delivery_type.is_none() {
            invalid.push(attr::DELIVERY_TYPE.to_string());
        }
        let barcode_type = self.barcode_type.and_then(|n| BarcodeType::try_from(n).ok());
        if barcode_type.is_none() {
            invalid.push(attr::BARCODE_TYPE.to_string());
        }
        let final_state = match self.final_state.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = raw.parse::<FinalState>().ok();
                if parsed.is_none() {
                    invalid.push(attr::FINAL_STATE.to_string());
                }
                parsed
            }
        };
        if self.prize_id.as_deref() == Some("") {
            invalid.push(PRIZE_ID.to_string());
        }
        let amount = self.total_amount.unwrap_or(0);
        let available = self.total_available.unwrap_or(amount);
        if amount < 0 {
            invalid.push("total_amount".to_string());
        }
        if available != amount {
            invalid.push("total_available".to_string());
        }
        if !invalid.is_empty() {
            return Err(ValidationError::Invalid(invalid));
        }

        let key = PrizeKey {
            configuration_id: ConfigurationId::new(self.configuration_id.unwrap_or_default()),
            prize_id: self.prize_id.map_or_else(PrizeId::generate, PrizeId::new),
        };

        let mut details = self.details;
        details.name = self.name;
        details.desc = self.desc;
        details.active = self.active;
        details.delivery_type = delivery_type;
        details.barcode_type = barcode_type;
        if final_state.is_some() {
            details.final_state = Some(final_state);
        }

        let mut record = Record::with_key(&key);
        details.mutation().apply_to(&mut record);
        for counter in Counter::ALL {
            let value = match counter {
                Counter::Amount | Counter::Available => amount,
                _ => 0,
            };
            record.set(counter.attribute(), value);
        }
        record.set(ENTRY_DATE, now.timestamp_millis());

        Ok(NewPrize { key, record })
    }
}

/// Typed allow-list of non-counter attribute changes.
///
/// `None` leaves a field untouched. For optional attributes the inner
/// `Option` distinguishes setting a value (`Some(Some(v))`) from removing the
/// attribute (`Some(None)`). Mandatory attributes cannot be removed. Each
/// field maps to the attribute of the same name in [`attr`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs, clippy::option_option)]
pub struct PrizeUpdate {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub short_desc: Option<Option<String>>,
    pub redeem_desc: Option<Option<String>>,
    pub active: Option<bool>,
    pub cost: Option<Option<i64>>,
    pub img_url: Option<Option<String>>,
    pub images_metadata: Option<Option<String>>,
    pub delivery_type: Option<DeliveryType>,
    pub redemption_link: Option<Option<String>>,
    pub barcode_type: Option<BarcodeType>,
    pub priority: Option<Option<i64>>,
    pub tags: Option<Option<Vec<String>>>,
    pub tier: Option<Option<i64>>,
    pub redemption_limit: Option<Option<i64>>,
    pub min_age: Option<Option<i64>>,
    pub final_state: Option<Option<FinalState>>,
    pub active_partition: Option<u32>,
    pub total_partitions: Option<u32>,
    pub auto_upload_vouchers: Option<bool>,
    pub has_end_date: Option<bool>,
    pub end_date: Option<Option<i64>>,
    pub start_date: Option<Option<i64>>,
    pub validity_period_after_claim: Option<Option<i64>>,
}

fn set_field<T: Into<AttributeValue>>(mutation: MutationList, field: &str, value: Option<T>) -> MutationList {
    match value {
        Some(v) => mutation.set(field, v),
        None => mutation,
    }
}

fn set_or_remove<T: Into<AttributeValue>>(
    mutation: MutationList,
    field: &str,
    value: Option<Option<T>>,
) -> MutationList {
    match value {
        Some(Some(v)) => mutation.set(field, v),
        Some(None) => mutation.remove(field),
        None => mutation,
    }
}

impl PrizeUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Mutation list for the requested changes (no `entry_date`).
    #[must_use]
    pub fn mutation(&self) -> MutationList {
        let u = self.clone();
        let m = MutationList::new();
        let m = set_field(m, attr::NAME, u.name);
        let m = set_field(m, attr::DESC, u.desc);
        let m = set_or_remove(m, attr::SHORT_DESC, u.short_desc);
        let m = set_or_remove(m, attr::REDEEM_DESC, u.redeem_desc);
        let m = set_field(m, attr::ACTIVE, u.active);
        let m = set_or_remove(m, attr::COST, u.cost);
        let m = set_or_remove(m, attr::IMG_URL, u.img_url);
        let m = set_or_remove(m, attr::IMAGES_METADATA, u.images_metadata);
        let m = set_field(m, attr::DELIVERY_TYPE, u.delivery_type.map(DeliveryType::as_i64));
        let m = set_or_remove(m, attr::REDEMPTION_LINK, u.redemption_link);
        let m = set_field(m, attr::BARCODE_TYPE, u.barcode_type.map(BarcodeType::as_i64));
        let m = set_or_remove(m, attr::PRIORITY, u.priority);
        let m = set_or_remove(m, attr::TAGS, u.tags);
        let m = set_or_remove(m, attr::TIER, u.tier);
        let m = set_or_remove(m, attr::REDEMPTION_LIMIT, u.redemption_limit);
        let m = set_or_remove(m, attr::MIN_AGE, u.min_age);
        let m = set_or_remove(
            m,
            attr::FINAL_STATE,
            u.final_state.map(|s| s.map(FinalState::as_str)),
        );
        let m = set_field(m, attr::ACTIVE_PARTITION, u.active_partition.map(i64::from));
        let m = set_field(m, attr::TOTAL_PARTITIONS, u.total_partitions.map(i64::from));
        let m = set_field(m, attr::AUTO_UPLOAD_VOUCHERS, u.auto_upload_vouchers);
        let m = set_field(m, attr::HAS_END_DATE, u.has_end_date);
        let m = set_or_remove(m, attr::END_DATE, u.end_date);
        let m = set_or_remove(m, attr::START_DATE, u.start_date);
        set_or_remove(
            m,
            attr::VALIDITY_PERIOD_AFTER_CLAIM,
            u.validity_period_after_claim,
        )
    }

    /// Conditional update applying these changes to an existing prize and
    /// refreshing `entry_date`.
    #[must_use]
    pub fn into_update_item(self, key: PrizeKey, now: DateTime<Utc>) -> UpdateItem {
        UpdateItem {
            key,
            mutation: self.mutation().set(ENTRY_DATE, now.timestamp_millis()),
            condition: Predicate::Exists(PRIZE_ID.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn complete_draft() -> PrizeDraft {
        PrizeDraft {
            configuration_id: Some("summer".into()),
            prize_id: Some("coffee".into()),
            name: Some("Coffee".into()),
            desc: Some("A free coffee".into()),
            active: Some(true),
            delivery_type: Some(1),
            barcode_type: Some(2),
            ..PrizeDraft::default()
        }
    }

    #[test]
    fn missing_mandatory_fields_are_all_reported() {
        let error = PrizeDraft::default().validate(now()).unwrap_err();
        assert_eq!(
            error,
            ValidationError::Missing(vec![
                "configuration_id".into(),
                "name".into(),
                "desc".into(),
                "active".into(),
                "delivery_type".into(),
                "barcode_type".into(),
            ])
        );
    }

    #[test]
    fn out_of_enumeration_values_are_invalid() {
        let draft = PrizeDraft {
            delivery_type: Some(3),
            barcode_type: Some(9),
            final_state: Some("lost".into()),
            ..complete_draft()
        };
        assert_eq!(
            draft.validate(now()).unwrap_err(),
            ValidationError::Invalid(vec![
                "delivery_type".into(),
                "barcode_type".into(),
                "final_state".into(),
            ])
        );
    }

    #[test]
    fn valid_draft_seeds_zeroed_counters() {
        let prize = complete_draft().validate(now()).unwrap();
        assert_eq!(prize.key, PrizeKey::new("summer", "coffee"));
        for counter in Counter::ALL {
            assert_eq!(prize.record.number(counter.attribute()), Some(0));
        }
        assert_eq!(prize.record.number(attr::DELIVERY_TYPE), Some(1));
        assert_eq!(prize.record.number(ENTRY_DATE), Some(1_700_000_000_000));

        let view = Prize::from_record(prize.record).unwrap();
        assert_eq!(view.barcode_type, Some(BarcodeType::Code128));
        assert!(view.counters.conservation_holds());
    }

    #[test]
    fn initial_stock_must_be_conserved() {
        let draft = PrizeDraft {
            total_amount: Some(10),
            total_available: Some(4),
            ..complete_draft()
        };
        assert_eq!(
            draft.validate(now()).unwrap_err(),
            ValidationError::Invalid(vec!["total_available".into()])
        );

        let stocked = PrizeDraft {
            total_amount: Some(10),
            ..complete_draft()
        }
        .validate(now())
        .unwrap();
        assert_eq!(stocked.record.number("total_available"), Some(10));
    }

    #[test]
    fn prize_id_is_generated_when_absent() {
        let draft = PrizeDraft {
            prize_id: None,
            ..complete_draft()
        };
        let prize = draft.validate(now()).unwrap();
        assert!(!prize.key.prize_id.as_str().is_empty());
    }

    #[test]
    fn update_sets_and_removes_optional_fields() {
        let update = PrizeUpdate {
            tier: Some(Some(3)),
            end_date: Some(None),
            active_partition: Some(2),
            ..PrizeUpdate::default()
        };
        let mut record = Record::new();
        record.set(attr::END_DATE, 5_i64);
        update.mutation().apply_to(&mut record);
        assert_eq!(record.get(attr::TIER), Some(&AttributeValue::Number(3)));
        assert!(!record.contains(attr::END_DATE));
        assert_eq!(record.number(attr::ACTIVE_PARTITION), Some(2));
    }

    #[test]
    fn empty_update_only_refreshes_entry_date() {
        let update = PrizeUpdate::default();
        assert!(update.is_empty());
        let item = update.into_update_item(PrizeKey::new("c", "p"), now());
        assert_eq!(item.mutation.ops().len(), 1);
        assert_eq!(item.mutation.ops()[0].field, ENTRY_DATE);
    }
}
