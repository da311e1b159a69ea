//! Broker relay records
//!
//! The relay consumes tariff events from the topic exchange and forwards a
//! short acknowledgement record to a Kafka topic. This module holds the
//! pure transformation; the consumer loop lives with the AMQP client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ActionType;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("undecodable event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Record written to the relay topic for every consumed event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayRecord {
    pub action: ActionType,
    pub rmq: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<i32>,
}

#[derive(Deserialize)]
struct EventHeader {
    action: ActionType,
    #[serde(default)]
    tariff_id: Option<i32>,
}

pub fn relay_record(payload: &[u8]) -> Result<RelayRecord, RelayError> {
    let header: EventHeader = serde_json::from_slice(payload)?;
    Ok(RelayRecord {
        action: header.action,
        rmq: "ack",
        tariff_id: header.tariff_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MutationEvent;
    use serde_json::json;

    #[test]
    fn keeps_action_and_tariff_id() {
        let payload = MutationEvent::deleted(17).to_json().unwrap();
        let record = relay_record(&payload).unwrap();

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "action": "delete_tariff", "rmq": "ack", "tariff_id": 17 })
        );
    }

    #[test]
    fn create_events_have_no_tariff_id() {
        let payload = MutationEvent::created(3, chrono::Utc::now()).to_json().unwrap();
        let value = serde_json::to_value(relay_record(&payload).unwrap()).unwrap();

        assert_eq!(value, json!({ "action": "create_tariff", "rmq": "ack" }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(relay_record(b"not json").is_err());
        assert!(relay_record(br#"{"action":"launch_rocket"}"#).is_err());
    }
}
