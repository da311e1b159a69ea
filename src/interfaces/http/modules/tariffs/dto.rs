//! Tariff DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::CostQuote;
use crate::domain::tariff::model::lenient_rate;
use crate::domain::{Tariff, TariffBatch, TariffPatch};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TariffResponse {
    pub id: i32,
    #[schema(example = "Glass")]
    pub category_type: String,
    #[schema(example = 0.04)]
    pub rate: f64,
    /// Id of the batch the tariff belongs to
    pub date_accession_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tariff> for TariffResponse {
    fn from(t: Tariff) -> Self {
        Self {
            id: t.id,
            category_type: t.category_type,
            rate: t.rate,
            date_accession_id: t.date_accession_id,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// One tariff of a batch creation request (documentation only; the
/// payload is parsed as an ordered date map).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TariffInput {
    #[schema(example = "Glass", max_length = 20)]
    pub category_type: String,
    /// Number or numeric string within [0, 1]
    #[schema(example = 0.04, minimum = 0, maximum = 1)]
    pub rate: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchTariff {
    pub id: i32,
    pub category_type: String,
    pub rate: f64,
}

/// Summary of one created date key
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    /// Batch id
    pub id: i32,
    /// Accession date of the batch
    #[schema(value_type = String, format = Date, example = "2020-06-01")]
    pub created_at: NaiveDate,
    pub tariffs: Vec<BatchTariff>,
}

impl From<TariffBatch> for BatchResponse {
    fn from(batch: TariffBatch) -> Self {
        Self {
            id: batch.id,
            created_at: batch.accession_date,
            tariffs: batch
                .tariffs
                .into_iter()
                .map(|t| BatchTariff {
                    id: t.id,
                    category_type: t.category_type,
                    rate: t.rate,
                })
                .collect(),
        }
    }
}

/// Multipart form of `POST /api/v1/tariffs/upload`
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// JSON document with the same shape as the batch creation body
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTariffRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Glass")]
    pub category_type: Option<String>,
    /// Number or numeric string within [0, 1]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_rate::deserialize_option"
    )]
    #[schema(example = 0.05)]
    pub rate: Option<f64>,
}

impl From<UpdateTariffRequest> for TariffPatch {
    fn from(req: UpdateTariffRequest) -> Self {
        Self {
            category_type: req.category_type,
            rate: req.rate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTariffResponse {
    pub id: i32,
    /// The fields that were changed
    pub new_tariff: UpdateTariffRequest,
}

impl UpdateTariffResponse {
    pub fn new(id: i32, patch: TariffPatch) -> Self {
        Self {
            id,
            new_tariff: UpdateTariffRequest {
                category_type: patch.category_type,
                rate: patch.rate,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteTariffResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteBatchResponse {
    pub batch_id: i32,
    pub deleted_tariff_ids: Vec<i32>,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateCostRequest {
    pub tariff_id: i32,
    /// Non-negative amount, as a number or a decimal string
    #[schema(value_type = f64, example = 1000.0)]
    pub declared_value: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CalculateCostResponse {
    pub tariff_id: i32,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    #[schema(value_type = f64, example = 1000.0)]
    pub declared_value: Decimal,
    pub rate: f64,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    #[schema(value_type = f64, example = 40.0)]
    pub insurance_cost: Decimal,
}

impl From<CostQuote> for CalculateCostResponse {
    fn from(q: CostQuote) -> Self {
        Self {
            tariff_id: q.tariff_id,
            declared_value: q.declared_value,
            rate: q.rate,
            insurance_cost: q.insurance_cost,
        }
    }
}
