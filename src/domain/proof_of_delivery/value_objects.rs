use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Proof of Delivery Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofOfDeliveryStatus {
    Initiated,
    Confirmed,
}

impl ProofOfDeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofOfDeliveryStatus::Initiated => "INITIATED",
            ProofOfDeliveryStatus::Confirmed => "CONFIRMED",
        }
    }
}

impl fmt::Display for ProofOfDeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofOfDeliveryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "INITIATED" => Ok(ProofOfDeliveryStatus::Initiated),
            "CONFIRMED" => Ok(ProofOfDeliveryStatus::Confirmed),
            other => Err(format!("unknown proof of delivery status: {}", other)),
        }
    }
}

/// The shipment a proof of delivery acknowledges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub shipped_by_id: Uuid,
    pub shipped_date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOfDeliveryLineItem {
    pub id: Uuid,
    pub orderable_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity_accepted: Option<i64>,
    pub quantity_rejected: Option<i64>,
    pub rejection_reason_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [ProofOfDeliveryStatus::Initiated, ProofOfDeliveryStatus::Confirmed] {
            assert_eq!(status.as_str().parse::<ProofOfDeliveryStatus>().unwrap(), status);
        }
        assert!("SUBMITTED".parse::<ProofOfDeliveryStatus>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&ProofOfDeliveryStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
    }
}
