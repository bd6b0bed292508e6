use serde::Deserialize;
use uuid::Uuid;
use chrono::NaiveDate;

use super::value_objects::ProofOfDeliveryStatus;

// ============================================================================
// Proof of Delivery Commands
// ============================================================================
//
// Absent fields leave the stored value untouched.
//
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProofOfDelivery {
    pub status: Option<ProofOfDeliveryStatus>,
    pub delivered_by: Option<String>,
    pub received_by: Option<String>,
    pub received_date: Option<NaiveDate>,
    #[serde(default)]
    pub line_items: Vec<UpdateProofOfDeliveryLineItem>,
}

impl UpdateProofOfDelivery {
    pub fn confirms(&self) -> bool {
        self.status == Some(ProofOfDeliveryStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProofOfDeliveryLineItem {
    pub id: Uuid,
    pub quantity_accepted: Option<i64>,
    pub quantity_rejected: Option<i64>,
    pub rejection_reason_id: Option<Uuid>,
    pub notes: Option<String>,
}
