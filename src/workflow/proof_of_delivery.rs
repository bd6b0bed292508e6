use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::hooks::ConfirmationHook;
use super::order::OrderWorkflow;
use crate::clock::Clock;
use crate::domain::audit::{AuditLogEntry, AuditLogFilter, PropertyChange};
use crate::domain::order::OrderStatus;
use crate::domain::proof_of_delivery::{self, ProofOfDelivery, ProofOfDeliveryError, UpdateProofOfDelivery};
use crate::error::{FulfillmentError, Result};
use crate::metrics::Metrics;
use crate::pagination::{Page, Pageable};
use crate::permissions::{PermissionService, Right, RightScope};
use crate::repository::{OrderRepository, ProofOfDeliveryRepository, RepositoryError};

// ============================================================================
// Proof of Delivery Workflow
// ============================================================================
//
// Confirmation is the one operation that touches two aggregates: the POD
// flips to CONFIRMED and its order to RECEIVED in a single storage call
// guarded by a compare-and-set on the POD status. Hooks only run after that
// call has committed.
//
// ============================================================================

pub struct ProofOfDeliveryWorkflow {
    pods: Arc<dyn ProofOfDeliveryRepository>,
    orders: Arc<dyn OrderRepository>,
    order_workflow: Arc<OrderWorkflow>,
    permissions: PermissionService,
    hooks: Vec<Arc<dyn ConfirmationHook>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl ProofOfDeliveryWorkflow {
    pub fn new(
        pods: Arc<dyn ProofOfDeliveryRepository>,
        orders: Arc<dyn OrderRepository>,
        order_workflow: Arc<OrderWorkflow>,
        permissions: PermissionService,
        hooks: Vec<Arc<dyn ConfirmationHook>>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { pods, orders, order_workflow, permissions, hooks, clock, metrics }
    }

    pub async fn get(&self, user_id: Uuid, pod_id: Uuid) -> Result<ProofOfDelivery> {
        let pod = self.find(pod_id).await?;
        self.permissions.can_view_pod(user_id, &pod).await?;
        Ok(pod)
    }

    pub async fn search(
        &self,
        user_id: Uuid,
        shipment_id: Option<Uuid>,
        order_id: Option<Uuid>,
        pageable: Pageable,
    ) -> Result<Page<ProofOfDelivery>> {
        if pageable.size == 0 {
            return Err(FulfillmentError::must_be_positive("size"));
        }

        let pods = self.pods.search(shipment_id, order_id).await?;

        let mut decisions: HashMap<RightScope, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(pods.len());
        for pod in pods {
            let scope = RightScope::program_at_facility(pod.program_id, pod.receiving_facility_id);
            let allowed = match decisions.get(&scope) {
                Some(allowed) => *allowed,
                None => {
                    let allowed = self.may_view(user_id, scope).await?;
                    decisions.insert(scope, allowed);
                    allowed
                }
            };
            if allowed {
                visible.push(pod);
            }
        }

        Ok(Page::from_vec(visible, pageable))
    }

    /// The POD of an order's shipment.
    pub async fn find_for_order(&self, user_id: Uuid, order_id: Uuid) -> Result<ProofOfDelivery> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        self.permissions.can_view_pods_of_order(user_id, &order).await?;

        self.pods
            .find_by_order_id(order_id)
            .await?
            .ok_or(FulfillmentError::ProofOfDeliveryNotFound(order_id))
    }

    pub async fn audit_log(&self, user_id: Uuid, pod_id: Uuid, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>> {
        let pod = self.find(pod_id).await?;
        self.permissions.can_view_pod(user_id, &pod).await?;

        let entries = self.pods.audit_log(pod_id).await?;
        Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
    }

    pub async fn update(&self, user_id: Uuid, pod_id: Uuid, payload: UpdateProofOfDelivery) -> Result<ProofOfDelivery> {
        let mut pod = self.find(pod_id).await?;
        self.permissions.can_manage_pod(user_id, &pod).await?;
        pod.ensure_editable()?;

        let now = self.clock.now();
        let mut changes = pod.apply_update(&payload)?;

        if !payload.confirms() {
            let audit = audit_entries(&pod, user_id, changes, now);
            self.pods.update(&pod, &audit).await.map_err(lost_race)?;
            self.metrics.record_pod_update("update");

            tracing::info!(pod_id = %pod.id, changes = audit.len(), "Proof of delivery updated");
            return Ok(pod);
        }

        pod.validate_for_confirmation()?;

        let mut order = self
            .orders
            .find_by_id(pod.order_id())
            .await?
            .ok_or(FulfillmentError::OrderNotFound(pod.order_id()))?;
        let previous_status = order.status;
        self.order_workflow.apply_status(&mut order, OrderStatus::Received, user_id)?;

        changes.push(pod.confirm()?);
        let audit = audit_entries(&pod, user_id, changes, now);
        self.pods.confirm(&pod, &order, previous_status, &audit).await.map_err(lost_race)?;

        self.metrics.record_pod_update("confirm");
        self.metrics.record_status_transition(previous_status.as_str(), OrderStatus::Received.as_str());
        tracing::info!(pod_id = %pod.id, order_id = %order.id, "✅ Proof of delivery confirmed, order received");

        for hook in &self.hooks {
            if let Err(e) = hook.on_confirmed(&pod, &order).await {
                tracing::error!(pod_id = %pod.id, hook = hook.name(), error = %e, "Confirmation hook failed");
                return Err(e.into());
            }
        }

        Ok(pod)
    }

    async fn find(&self, pod_id: Uuid) -> Result<ProofOfDelivery> {
        self.pods
            .find_by_id(pod_id)
            .await?
            .ok_or(FulfillmentError::ProofOfDeliveryNotFound(pod_id))
    }

    async fn may_view(&self, user_id: Uuid, scope: RightScope) -> Result<bool> {
        for right in [Right::PodsManage, Right::PodsView] {
            if self.permissions.has_right(user_id, right, scope).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn audit_entries(
    pod: &ProofOfDelivery,
    author_id: Uuid,
    changes: Vec<PropertyChange>,
    now: DateTime<Utc>,
) -> Vec<AuditLogEntry> {
    changes
        .into_iter()
        .map(|change| AuditLogEntry::record(proof_of_delivery::ENTITY_TYPE, pod.id, author_id, change, now))
        .collect()
}

/// A concurrent confirmation surfaces as the domain error.
fn lost_race(error: RepositoryError) -> FulfillmentError {
    match error {
        RepositoryError::ConcurrentConfirmation => ProofOfDeliveryError::AlreadyConfirmed.into(),
        other => other.into(),
    }
}
