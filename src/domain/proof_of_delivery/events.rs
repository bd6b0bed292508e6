use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;

use crate::domain::order::Order;
use super::aggregate::ProofOfDelivery;

// ============================================================================
// Stock Event - downstream inventory record of a confirmed delivery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEvent {
    pub program_id: Uuid,
    pub facility_id: Uuid,
    pub signature: Option<String>,
    pub document_number: String,
    pub occurred_date: Option<NaiveDate>,
    pub line_items: Vec<StockEventLineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEventLineItem {
    pub orderable_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i64,
    pub occurred_date: Option<NaiveDate>,
    pub reason_free_text: Option<String>,
}

impl StockEvent {
    /// Receipt of everything accepted on the POD, at the receiving facility.
    pub fn from_proof_of_delivery(pod: &ProofOfDelivery, order: &Order) -> Self {
        let line_items = pod
            .line_items
            .iter()
            .map(|item| StockEventLineItem {
                orderable_id: item.orderable_id,
                lot_id: item.lot_id,
                quantity: item.quantity_accepted.unwrap_or(0),
                occurred_date: pod.received_date,
                reason_free_text: item.notes.clone(),
            })
            .collect();

        Self {
            program_id: pod.program_id,
            facility_id: pod.receiving_facility_id,
            signature: pod.received_by.clone(),
            document_number: order.order_code.clone(),
            occurred_date: pod.received_date,
            line_items,
        }
    }
}
