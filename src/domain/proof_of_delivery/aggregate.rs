use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;

use crate::domain::audit::PropertyChange;
use super::commands::{UpdateProofOfDelivery, UpdateProofOfDeliveryLineItem};
use super::errors::ProofOfDeliveryError;
use super::value_objects::{ProofOfDeliveryLineItem, ProofOfDeliveryStatus, Shipment};

pub const ENTITY_TYPE: &str = "ProofOfDelivery";

// ============================================================================
// Proof of Delivery Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOfDelivery {
    pub id: Uuid,
    pub shipment: Shipment,
    pub program_id: Uuid,
    pub receiving_facility_id: Uuid,
    pub status: ProofOfDeliveryStatus,
    pub delivered_by: Option<String>,
    pub received_by: Option<String>,
    pub received_date: Option<NaiveDate>,
    pub line_items: Vec<ProofOfDeliveryLineItem>,
}

impl ProofOfDelivery {
    pub fn order_id(&self) -> Uuid {
        self.shipment.order_id
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ProofOfDeliveryStatus::Confirmed
    }

    /// Confirmed PODs are write-once.
    pub fn ensure_editable(&self) -> Result<(), ProofOfDeliveryError> {
        if self.is_confirmed() {
            Err(ProofOfDeliveryError::AlreadyConfirmed)
        } else {
            Ok(())
        }
    }

    /// Merge the editable fields of `update`. Status is left alone; see `confirm`.
    pub fn apply_update(
        &mut self,
        update: &UpdateProofOfDelivery,
    ) -> Result<Vec<PropertyChange>, ProofOfDeliveryError> {
        self.ensure_editable()?;

        let mut changes = Vec::new();

        if let Some(delivered_by) = &update.delivered_by {
            changes.extend(PropertyChange::between("deliveredBy", self.delivered_by.as_ref(), Some(delivered_by)));
            self.delivered_by = Some(delivered_by.clone());
        }

        if let Some(received_by) = &update.received_by {
            changes.extend(PropertyChange::between("receivedBy", self.received_by.as_ref(), Some(received_by)));
            self.received_by = Some(received_by.clone());
        }

        if let Some(received_date) = &update.received_date {
            changes.extend(PropertyChange::between("receivedDate", self.received_date.as_ref(), Some(received_date)));
            self.received_date = Some(*received_date);
        }

        for item_update in &update.line_items {
            // Unknown line items are ignored.
            if let Some(item) = self.line_items.iter_mut().find(|item| item.id == item_update.id) {
                changes.extend(merge_line_item(item, item_update));
            }
        }

        Ok(changes)
    }

    pub fn validate_for_confirmation(&self) -> Result<(), ProofOfDeliveryError> {
        if is_blank(self.delivered_by.as_deref()) {
            return Err(ProofOfDeliveryError::MissingValue("deliveredBy"));
        }
        if is_blank(self.received_by.as_deref()) {
            return Err(ProofOfDeliveryError::MissingValue("receivedBy"));
        }
        if self.received_date.is_none() {
            return Err(ProofOfDeliveryError::MissingValue("receivedDate"));
        }
        if self.line_items.iter().any(|item| item.quantity_accepted.is_none()) {
            return Err(ProofOfDeliveryError::MissingValue("lineItems.quantityAccepted"));
        }
        Ok(())
    }

    /// INITIATED -> CONFIRMED, only for a complete POD.
    pub fn confirm(&mut self) -> Result<PropertyChange, ProofOfDeliveryError> {
        self.ensure_editable()?;
        self.validate_for_confirmation()?;

        self.status = ProofOfDeliveryStatus::Confirmed;
        Ok(PropertyChange {
            property: "status".to_string(),
            old_value: Some(ProofOfDeliveryStatus::Initiated.to_string()),
            new_value: Some(ProofOfDeliveryStatus::Confirmed.to_string()),
        })
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn merge_line_item(
    item: &mut ProofOfDeliveryLineItem,
    update: &UpdateProofOfDeliveryLineItem,
) -> Vec<PropertyChange> {
    let prefix = format!("lineItems[{}]", item.id);
    let mut changes = Vec::new();

    if let Some(accepted) = update.quantity_accepted {
        changes.extend(PropertyChange::between(&format!("{}.quantityAccepted", prefix), item.quantity_accepted.as_ref(), Some(&accepted)));
        item.quantity_accepted = Some(accepted);
    }
    if let Some(rejected) = update.quantity_rejected {
        changes.extend(PropertyChange::between(&format!("{}.quantityRejected", prefix), item.quantity_rejected.as_ref(), Some(&rejected)));
        item.quantity_rejected = Some(rejected);
    }
    if let Some(reason) = update.rejection_reason_id {
        changes.extend(PropertyChange::between(&format!("{}.rejectionReasonId", prefix), item.rejection_reason_id.as_ref(), Some(&reason)));
        item.rejection_reason_id = Some(reason);
    }
    if let Some(notes) = &update.notes {
        changes.extend(PropertyChange::between(&format!("{}.notes", prefix), item.notes.as_ref(), Some(notes)));
        item.notes = Some(notes.clone());
    }

    changes
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::test_support::{order_fixture, pod_fixture};

    fn initiated() -> ProofOfDelivery {
        pod_fixture(&order_fixture(OrderStatus::Shipped), ProofOfDeliveryStatus::Initiated)
    }

    #[test]
    fn test_fixture_is_complete() {
        assert!(initiated().validate_for_confirmation().is_ok());
    }

    #[test]
    fn test_confirm_flips_status_once() {
        let mut pod = initiated();

        let change = pod.confirm().unwrap();
        assert_eq!(pod.status, ProofOfDeliveryStatus::Confirmed);
        assert_eq!(change.property, "status");
        assert_eq!(change.new_value.as_deref(), Some("CONFIRMED"));

        assert_eq!(pod.confirm(), Err(ProofOfDeliveryError::AlreadyConfirmed));
    }

    #[test]
    fn test_confirmed_pod_rejects_any_update() {
        let mut pod = initiated();
        pod.status = ProofOfDeliveryStatus::Confirmed;
        let before = pod.clone();

        let result = pod.apply_update(&UpdateProofOfDelivery::default());
        assert_eq!(result, Err(ProofOfDeliveryError::AlreadyConfirmed));

        let result = pod.apply_update(&UpdateProofOfDelivery {
            delivered_by: Some("Somebody else".to_string()),
            ..Default::default()
        });
        assert_eq!(result, Err(ProofOfDeliveryError::AlreadyConfirmed));
        assert_eq!(pod, before);
    }

    #[test]
    fn test_blank_delivered_by_blocks_confirmation() {
        let mut pod = initiated();
        pod.delivered_by = Some("   ".to_string());

        assert_eq!(pod.confirm(), Err(ProofOfDeliveryError::MissingValue("deliveredBy")));
        assert_eq!(pod.status, ProofOfDeliveryStatus::Initiated);
    }

    #[test]
    fn test_missing_fields_are_reported_in_order() {
        let mut pod = initiated();
        pod.received_by = None;
        assert_eq!(pod.validate_for_confirmation(), Err(ProofOfDeliveryError::MissingValue("receivedBy")));

        let mut pod = initiated();
        pod.received_date = None;
        assert_eq!(pod.validate_for_confirmation(), Err(ProofOfDeliveryError::MissingValue("receivedDate")));

        let mut pod = initiated();
        pod.line_items[0].quantity_accepted = None;
        assert_eq!(
            pod.validate_for_confirmation(),
            Err(ProofOfDeliveryError::MissingValue("lineItems.quantityAccepted"))
        );
    }

    #[test]
    fn test_update_merges_fields_and_reports_changes() {
        let mut pod = initiated();
        let item_id = pod.line_items[0].id;

        let changes = pod
            .apply_update(&UpdateProofOfDelivery {
                delivered_by: Some("Somebody".to_string()),
                received_by: pod.received_by.clone(),
                line_items: vec![
                    UpdateProofOfDeliveryLineItem {
                        id: item_id,
                        quantity_accepted: Some(7),
                        quantity_rejected: None,
                        rejection_reason_id: None,
                        notes: Some("damaged box".to_string()),
                    },
                    UpdateProofOfDeliveryLineItem {
                        id: Uuid::new_v4(),
                        quantity_accepted: Some(1),
                        quantity_rejected: None,
                        rejection_reason_id: None,
                        notes: None,
                    },
                ],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(pod.delivered_by.as_deref(), Some("Somebody"));
        assert_eq!(pod.line_items[0].quantity_accepted, Some(7));
        assert_eq!(pod.line_items[0].notes.as_deref(), Some("damaged box"));
        assert_eq!(pod.status, ProofOfDeliveryStatus::Initiated);

        let properties: Vec<String> = changes.iter().map(|c| c.property.clone()).collect();
        assert_eq!(
            properties,
            vec![
                "deliveredBy".to_string(),
                format!("lineItems[{}].quantityAccepted", item_id),
                format!("lineItems[{}].notes", item_id),
            ]
        );
    }
}
