use serde::Deserialize;
use uuid::Uuid;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Payload of an order-creation request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub external_id: Option<Uuid>,
    #[serde(default)]
    pub emergency: bool,
    pub program_id: Uuid,
    pub processing_period_id: Uuid,
    pub requesting_facility_id: Uuid,
    pub receiving_facility_id: Uuid,
    pub supplying_facility_id: Uuid,
    pub facility_id: Uuid,
    pub quoted_cost: Option<String>,
    #[serde(default)]
    pub order_line_items: Vec<CreateOrderLineItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderLineItem {
    pub orderable_id: Uuid,
    pub ordered_quantity: i64,
    #[serde(default)]
    pub filled_quantity: i64,
    #[serde(default)]
    pub packs_to_ship: i64,
}
