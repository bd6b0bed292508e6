use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Ordered,
    Fetched,
    TransferFailed,
    InRoute,
    ReadyToPack,
    ReadyToPackWithException,
    Shipped,
    Received,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Ordered,
        OrderStatus::Fetched,
        OrderStatus::TransferFailed,
        OrderStatus::InRoute,
        OrderStatus::ReadyToPack,
        OrderStatus::ReadyToPackWithException,
        OrderStatus::Shipped,
        OrderStatus::Received,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ordered => "ORDERED",
            OrderStatus::Fetched => "FETCHED",
            OrderStatus::TransferFailed => "TRANSFER_FAILED",
            OrderStatus::InRoute => "IN_ROUTE",
            OrderStatus::ReadyToPack => "READY_TO_PACK",
            OrderStatus::ReadyToPackWithException => "READY_TO_PACK_WITH_EXCEPTION",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Received => "RECEIVED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        OrderStatus::ALL
            .iter()
            .find(|status| status.as_str() == normalized)
            .copied()
            .ok_or_else(|| OrderError::UnknownStatus(value.to_string()))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub id: Uuid,
    pub orderable_id: Uuid,
    pub ordered_quantity: i64,
    pub filled_quantity: i64,
    pub packs_to_ship: i64,
}

/// Who last touched an order and when.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetails {
    pub updater_id: Uuid,
    pub updated_date: DateTime<Utc>,
}

impl UpdateDetails {
    pub fn new(updater_id: Uuid, updated_date: DateTime<Utc>) -> Self {
        Self { updater_id, updated_date }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
