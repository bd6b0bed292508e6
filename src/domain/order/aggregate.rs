use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::commands::CreateOrder;
use super::errors::OrderError;
use super::transitions::StatusTransitions;
use super::value_objects::{OrderLineItem, OrderStatus, UpdateDetails};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub external_id: Option<Uuid>,
    pub order_code: String,
    pub emergency: bool,

    // Lifecycle
    pub status: OrderStatus,

    // Routing
    pub program_id: Uuid,
    pub processing_period_id: Uuid,
    pub requesting_facility_id: Uuid,
    pub receiving_facility_id: Uuid,
    pub supplying_facility_id: Uuid,
    pub facility_id: Uuid,

    // Audit Trail
    pub created_by_id: Uuid,
    pub created_date: DateTime<Utc>,
    pub update_details: UpdateDetails,

    pub quoted_cost: Option<String>,
    pub order_line_items: Vec<OrderLineItem>,
}

impl Order {
    /// Build a fresh order in `ORDERED` from a creation request.
    pub fn create(command: CreateOrder, creator_id: Uuid, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let order_code = generate_order_code(id, command.emergency);

        let order_line_items = command
            .order_line_items
            .into_iter()
            .map(|item| OrderLineItem {
                id: Uuid::new_v4(),
                orderable_id: item.orderable_id,
                ordered_quantity: item.ordered_quantity,
                filled_quantity: item.filled_quantity,
                packs_to_ship: item.packs_to_ship,
            })
            .collect();

        Self {
            id,
            external_id: command.external_id,
            order_code,
            emergency: command.emergency,
            status: OrderStatus::Ordered,
            program_id: command.program_id,
            processing_period_id: command.processing_period_id,
            requesting_facility_id: command.requesting_facility_id,
            receiving_facility_id: command.receiving_facility_id,
            supplying_facility_id: command.supplying_facility_id,
            facility_id: command.facility_id,
            created_by_id: creator_id,
            created_date: now,
            update_details: UpdateDetails::new(creator_id, now),
            quoted_cost: command.quoted_cost,
            order_line_items,
        }
    }

    /// Move the order to `to` if the table allows it, stamping who and when.
    pub fn apply_status(
        &mut self,
        to: OrderStatus,
        transitions: &StatusTransitions,
        updater_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        transitions.check(self.status, to)?;
        self.status = to;
        self.update_details = UpdateDetails::new(updater_id, now);
        Ok(())
    }

    pub fn ensure_retryable(&self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::TransferFailed => Ok(()),
            other => Err(OrderError::RetryInvalidStatus(other)),
        }
    }
}

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ORDER_NUMBER_LENGTH: usize = 8;

/// `ORDER-` + first eight base-36 digits of the id + `E`/`R`.
pub fn generate_order_code(id: Uuid, emergency: bool) -> String {
    let mut value = id.as_u128();
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    if digits.is_empty() {
        digits.push('0');
    }

    let number: String = digits.iter().rev().take(ORDER_NUMBER_LENGTH).collect();
    let suffix = if emergency { 'E' } else { 'R' };
    format!("ORDER-{}{}", number, suffix)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::domain::order::commands::CreateOrderLineItem;

    fn create_command(emergency: bool) -> CreateOrder {
        CreateOrder {
            external_id: Some(Uuid::new_v4()),
            emergency,
            program_id: Uuid::new_v4(),
            processing_period_id: Uuid::new_v4(),
            requesting_facility_id: Uuid::new_v4(),
            receiving_facility_id: Uuid::new_v4(),
            supplying_facility_id: Uuid::new_v4(),
            facility_id: Uuid::new_v4(),
            quoted_cost: Some("1.29".to_string()),
            order_line_items: vec![CreateOrderLineItem {
                orderable_id: Uuid::new_v4(),
                ordered_quantity: 50,
                filled_quantity: 35,
                packs_to_ship: 5,
            }],
        }
    }

    fn timestamp(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 5, 7, hour, 5, 20).unwrap()
    }

    #[test]
    fn test_created_order_starts_ordered() {
        let creator = Uuid::new_v4();
        let order = Order::create(create_command(false), creator, timestamp(10));

        assert_eq!(order.status, OrderStatus::Ordered);
        assert_eq!(order.created_by_id, creator);
        assert_eq!(order.created_date, timestamp(10));
        assert_eq!(order.update_details, UpdateDetails::new(creator, timestamp(10)));
        assert_eq!(order.order_line_items.len(), 1);
        assert_eq!(order.order_line_items[0].ordered_quantity, 50);
    }

    #[test]
    fn test_order_code_format() {
        let regular = Order::create(create_command(false), Uuid::new_v4(), timestamp(10));
        let emergency = Order::create(create_command(true), Uuid::new_v4(), timestamp(10));

        assert!(regular.order_code.starts_with("ORDER-"));
        assert!(regular.order_code.ends_with('R'));
        assert!(emergency.order_code.ends_with('E'));
        assert_eq!(regular.order_code.len(), "ORDER-".len() + 8 + 1);
        assert_eq!(regular.order_code, generate_order_code(regular.id, false));
    }

    #[test]
    fn test_order_code_for_small_ids() {
        assert_eq!(generate_order_code(Uuid::nil(), false), "ORDER-0R");
        assert_eq!(generate_order_code(Uuid::from_u128(36 * 36 + 35), true), "ORDER-10ZE");
    }

    #[test]
    fn test_apply_status_stamps_update_details() {
        let mut order = Order::create(create_command(false), Uuid::new_v4(), timestamp(10));
        let updater = Uuid::new_v4();

        order
            .apply_status(OrderStatus::ReadyToPack, &StatusTransitions::default(), updater, timestamp(11))
            .unwrap();

        assert_eq!(order.status, OrderStatus::ReadyToPack);
        assert_eq!(order.update_details, UpdateDetails::new(updater, timestamp(11)));
    }

    #[test]
    fn test_apply_status_rejects_unreachable_state() {
        let mut order = Order::create(create_command(false), Uuid::new_v4(), timestamp(10));
        let before = order.clone();

        let result = order.apply_status(
            OrderStatus::Received,
            &StatusTransitions::default(),
            Uuid::new_v4(),
            timestamp(11),
        );

        assert!(matches!(result, Err(OrderError::InvalidStatusTransition { .. })));
        assert_eq!(order, before);
    }

    #[test]
    fn test_only_transfer_failed_is_retryable() {
        let mut order = Order::create(create_command(false), Uuid::new_v4(), timestamp(10));

        for status in OrderStatus::ALL {
            order.status = status;
            let result = order.ensure_retryable();
            if status == OrderStatus::TransferFailed {
                assert!(result.is_ok());
            } else {
                assert_eq!(result, Err(OrderError::RetryInvalidStatus(status)));
            }
        }
    }
}
