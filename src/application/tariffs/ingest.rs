//! Batch ingestion payload
//!
//! A JSON object mapping accession dates (`YYYY-MM-DD`) to lists of
//! tariffs. The key order of the document is kept, since batches are
//! created in that order.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::domain::tariff::{validate_category, validate_rate};
use crate::domain::{DomainError, DomainResult, NewTariff};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn reason(err: DomainError) -> String {
    match err {
        DomainError::Validation(msg) => msg,
        other => other.to_string(),
    }
}

/// Parsed but not yet validated payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPayload {
    entries: Vec<(String, Vec<NewTariff>)>,
}

/// One validated date key with its tariffs
#[derive(Debug, Clone, PartialEq)]
pub struct BatchInput {
    pub accession_date: NaiveDate,
    pub tariffs: Vec<NewTariff>,
}

impl BatchPayload {
    pub fn new(entries: Vec<(String, Vec<NewTariff>)>) -> Self {
        Self { entries }
    }

    /// Parse an uploaded document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every key and tariff. All problems are reported together,
    /// and nothing is accepted unless the whole payload is valid.
    pub fn validate(self) -> DomainResult<Vec<BatchInput>> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        let mut inputs = Vec::with_capacity(self.entries.len());

        for (key, tariffs) in self.entries {
            if !seen.insert(key.clone()) {
                problems.push(format!("{}: duplicate date", key));
                continue;
            }

            let date = match NaiveDate::parse_from_str(&key, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    problems.push(format!("{}: expected a date in YYYY-MM-DD format", key));
                    None
                }
            };

            for (index, tariff) in tariffs.iter().enumerate() {
                let checks = [
                    ("category_type", validate_category(&tariff.category_type)),
                    ("rate", validate_rate(tariff.rate)),
                ];
                for (field, check) in checks {
                    if let Err(e) = check {
                        problems.push(format!("{}[{}].{}: {}", key, index, field, reason(e)));
                    }
                }
            }

            if let Some(accession_date) = date {
                inputs.push(BatchInput {
                    accession_date,
                    tariffs,
                });
            }
        }

        if problems.is_empty() {
            Ok(inputs)
        } else {
            Err(DomainError::Validation(problems.join("; ")))
        }
    }
}

impl<'de> Deserialize<'de> for BatchPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = BatchPayload;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping dates to lists of tariffs")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, tariffs)) = map.next_entry::<String, Vec<NewTariff>>()? {
                    entries.push((key, tariffs));
                }
                Ok(BatchPayload { entries })
            }
        }

        deserializer.deserialize_map(PayloadVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order() {
        let payload: BatchPayload = serde_json::from_str(
            r#"{
                "2020-07-01": [{"category_type": "Glass", "rate": 0.04}],
                "2020-06-01": [{"category_type": "Other", "rate": 0.01}]
            }"#,
        )
        .unwrap();

        let inputs = payload.validate().unwrap();
        let dates: Vec<_> = inputs.iter().map(|i| i.accession_date.to_string()).collect();
        assert_eq!(dates, vec!["2020-07-01", "2020-06-01"]);
    }

    #[test]
    fn one_bad_rate_rejects_everything() {
        let payload = BatchPayload::from_slice(
            br#"{
                "2020-07-01": [{"category_type": "Glass", "rate": 0.04}],
                "2020-08-01": [
                    {"category_type": "Glass", "rate": 0.04},
                    {"category_type": "Other", "rate": 1.5}
                ]
            }"#,
        )
        .unwrap();

        let err = payload.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.starts_with("2020-08-01[1].rate:")));
    }

    #[test]
    fn reports_bad_date_and_long_category_together() {
        let long = "x".repeat(21);
        let payload = BatchPayload::new(vec![
            ("01.07.2020".into(), vec![]),
            (
                "2020-07-01".into(),
                vec![NewTariff {
                    category_type: long,
                    rate: 0.1,
                }],
            ),
        ]);

        let DomainError::Validation(msg) = payload.validate().unwrap_err() else {
            panic!("expected a validation error");
        };
        assert!(msg.contains("01.07.2020: expected a date"));
        assert!(msg.contains("2020-07-01[0].category_type"));
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let payload = BatchPayload::new(vec![
            ("2020-07-01".into(), vec![]),
            ("2020-07-01".into(), vec![]),
        ]);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn empty_document_is_valid() {
        let payload = BatchPayload::from_slice(b"{}").unwrap();
        assert!(payload.is_empty());
        assert!(payload.validate().unwrap().is_empty());
    }

    #[test]
    fn non_object_is_a_parse_error() {
        assert!(BatchPayload::from_slice(b"[1, 2]").is_err());
        assert!(BatchPayload::from_slice(br#"{"2020-07-01": [{"rate": 0.1}]}"#).is_err());
    }
}
