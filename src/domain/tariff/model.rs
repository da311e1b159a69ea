//! Tariff domain entities

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};

/// Maximum length of a tariff category label, in characters
pub const MAX_CATEGORY_LEN: usize = 20;

/// A priced insurance category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: i32,
    pub category_type: String,
    /// Fraction of the declared value, within [0, 1]
    pub rate: f64,
    pub date_accession_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tariffs sharing one accession date
#[derive(Debug, Clone, PartialEq)]
pub struct TariffBatch {
    pub id: i32,
    pub accession_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tariffs: Vec<Tariff>,
}

/// Tariff fields supplied on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTariff {
    pub category_type: String,
    #[serde(deserialize_with = "lenient_rate::deserialize")]
    pub rate: f64,
}

/// Partial tariff update; unset fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_type: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_rate::deserialize_option"
    )]
    pub rate: Option<f64>,
}

impl TariffPatch {
    pub fn is_empty(&self) -> bool {
        self.category_type.is_none() && self.rate.is_none()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.is_empty() {
            return Err(DomainError::Validation(
                "at least one of category_type, rate must be set".into(),
            ));
        }
        if let Some(category) = &self.category_type {
            validate_category(category)?;
        }
        if let Some(rate) = self.rate {
            validate_rate(rate)?;
        }
        Ok(())
    }

    /// Merge the set fields into a cached copy of the tariff.
    pub fn apply_to(&self, cached: &mut CachedTariff, updated_at: DateTime<Utc>) {
        if let Some(category) = &self.category_type {
            cached.category_type = category.clone();
        }
        if let Some(rate) = self.rate {
            cached.rate = rate;
        }
        cached.updated_at = updated_at;
    }
}

/// Cache mirror of a tariff. The id is the cache key and is not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTariff {
    pub category_type: String,
    pub rate: f64,
    pub date_accession_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CachedTariff {
    pub fn into_tariff(self, id: i32) -> Tariff {
        Tariff {
            id,
            category_type: self.category_type,
            rate: self.rate,
            date_accession_id: self.date_accession_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<&Tariff> for CachedTariff {
    fn from(t: &Tariff) -> Self {
        Self {
            category_type: t.category_type.clone(),
            rate: t.rate,
            date_accession_id: t.date_accession_id,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Rates arrive either as JSON numbers or as numeric strings (`"0.04"`).
/// Rates arrive as JSON numbers or numeric strings.
pub mod lenient_rate {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    fn to_f64<E: Error>(raw: Raw) -> Result<f64, E> {
        match raw {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("rate {:?} is not a number", s))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        to_f64(Raw::deserialize(d)?)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Option::<Raw>::deserialize(d)?.map(to_f64).transpose()
    }
}

pub fn validate_category(category: &str) -> DomainResult<()> {
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(DomainError::Validation(format!(
            "category_type must be at most {} characters",
            MAX_CATEGORY_LEN
        )));
    }
    Ok(())
}

pub fn validate_rate(rate: f64) -> DomainResult<()> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(DomainError::Validation(
            "rate must be between 0 and 1".into(),
        ));
    }
    Ok(())
}

/// Convert a stored rate to a decimal through its shortest textual form,
/// so `0.04` becomes exactly `0.04` rather than the nearest binary value.
pub fn rate_to_decimal(rate: f64) -> DomainResult<Decimal> {
    Decimal::from_str(&rate.to_string())
        .map_err(|e| DomainError::Validation(format!("rate {} is not representable: {}", rate, e)))
}

/// Insurance cost of a declared value under the given rate
pub fn insurance_cost(declared_value: Decimal, rate: f64) -> DomainResult<Decimal> {
    if declared_value.is_sign_negative() && !declared_value.is_zero() {
        return Err(DomainError::Validation(
            "declared_value must be non-negative".into(),
        ));
    }
    let rate = rate_to_decimal(rate)?;
    declared_value
        .checked_mul(rate)
        .map(|cost| cost.normalize())
        .ok_or_else(|| DomainError::Validation("declared_value is too large".into()))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cached() -> CachedTariff {
        CachedTariff {
            category_type: "Glass".into(),
            rate: 0.04,
            date_accession_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rate_bounds_are_inclusive() {
        assert!(validate_rate(0.0).is_ok());
        assert!(validate_rate(1.0).is_ok());
        assert!(validate_rate(0.5).is_ok());
        assert!(validate_rate(-0.01).is_err());
        assert!(validate_rate(1.01).is_err());
        assert!(validate_rate(f64::NAN).is_err());
    }

    #[test]
    fn category_length_counts_characters() {
        assert!(validate_category(&"a".repeat(20)).is_ok());
        assert!(validate_category(&"a".repeat(21)).is_err());
        // 20 Cyrillic letters are 40 bytes but still 20 characters
        assert!(validate_category(&"я".repeat(20)).is_ok());
    }

    #[test]
    fn insurance_cost_is_exact() {
        let cost = insurance_cost(dec("1000.0"), 0.04).unwrap();
        assert_eq!(cost, dec("40"));
        assert_eq!(cost.to_string(), "40");
    }

    #[test]
    fn insurance_cost_keeps_small_fractions() {
        let cost = insurance_cost(dec("333.33"), 0.015).unwrap();
        assert_eq!(cost, dec("4.99995"));
    }

    #[test]
    fn insurance_cost_rejects_negative_value() {
        assert!(insurance_cost(dec("-1"), 0.04).is_err());
        assert_eq!(insurance_cost(Decimal::ZERO, 0.04).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn rate_to_decimal_uses_shortest_form() {
        assert_eq!(rate_to_decimal(0.1).unwrap().to_string(), "0.1");
        assert_eq!(rate_to_decimal(0.035).unwrap().to_string(), "0.035");
    }

    #[test]
    fn rate_accepts_numeric_strings() {
        let t: NewTariff =
            serde_json::from_str(r#"{"category_type": "Glass", "rate": "0.04"}"#).unwrap();
        assert_eq!(t.rate, 0.04);

        let patch: TariffPatch = serde_json::from_str(r#"{"rate": 0.5}"#).unwrap();
        assert_eq!(patch.rate, Some(0.5));
        let patch: TariffPatch = serde_json::from_str(r#"{"category_type": "Other"}"#).unwrap();
        assert_eq!(patch.rate, None);

        assert!(serde_json::from_str::<NewTariff>(r#"{"category_type": "x", "rate": "abc"}"#)
            .is_err());
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(TariffPatch::default().validate().is_err());
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let mut entry = cached();
        let now = Utc::now();
        TariffPatch {
            category_type: None,
            rate: Some(0.05),
        }
        .apply_to(&mut entry, now);

        assert_eq!(entry.category_type, "Glass");
        assert_eq!(entry.rate, 0.05);
        assert_eq!(entry.updated_at, now);
    }

    #[test]
    fn cached_tariff_round_trips_id() {
        let tariff = cached().into_tariff(7);
        assert_eq!(tariff.id, 7);
        assert_eq!(CachedTariff::from(&tariff).rate, 0.04);
    }
}
