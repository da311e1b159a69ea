//! Tariff mutation events
//!
//! Facts published to downstream consumers after a tariff changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tariff::TariffPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "create_tariff")]
    Create,
    #[serde(rename = "update_tariff")]
    Update,
    #[serde(rename = "delete_tariff")]
    Delete,
    #[serde(rename = "calculate_insurance_cost")]
    Calculate,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "create_tariff",
            ActionType::Update => "update_tariff",
            ActionType::Delete => "delete_tariff",
            ActionType::Calculate => "calculate_insurance_cost",
        }
    }

    /// Routing key on the topic exchange
    pub fn routing_key(&self) -> &'static str {
        match self {
            ActionType::Create => "event.created",
            ActionType::Update => "event.updated",
            ActionType::Delete => "event.deleted",
            ActionType::Calculate => "event.calculated",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tariff mutation. Unset fields are left out of the JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub action: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_accession_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tariff: Option<TariffPatch>,
    pub timestamp: DateTime<Utc>,
}

impl MutationEvent {
    fn new(action: ActionType) -> Self {
        Self {
            action,
            date_accession_id: None,
            updated_at: None,
            tariff_id: None,
            new_tariff: None,
            timestamp: Utc::now(),
        }
    }

    pub fn created(date_accession_id: i32, updated_at: DateTime<Utc>) -> Self {
        Self {
            date_accession_id: Some(date_accession_id),
            updated_at: Some(updated_at),
            ..Self::new(ActionType::Create)
        }
    }

    pub fn updated(tariff_id: i32, patch: TariffPatch) -> Self {
        Self {
            tariff_id: Some(tariff_id),
            new_tariff: Some(patch),
            ..Self::new(ActionType::Update)
        }
    }

    pub fn deleted(tariff_id: i32) -> Self {
        Self {
            tariff_id: Some(tariff_id),
            ..Self::new(ActionType::Delete)
        }
    }

    pub fn calculated(tariff_id: i32) -> Self {
        Self {
            tariff_id: Some(tariff_id),
            ..Self::new(ActionType::Calculate)
        }
    }

    pub fn routing_key(&self) -> &'static str {
        self.action.routing_key()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
