use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::clients::ClientError;
use crate::domain::order::Order;
use crate::domain::proof_of_delivery::ProofOfDelivery;
use crate::metrics::Metrics;

// ============================================================================
// Permission Service
// ============================================================================
//
// Every mutating operation and every single-entity read asks this service
// first. The scope is always derived from the loaded entity:
// - orders are scoped to their supplying facility
// - proofs of delivery to (receiving facility, program)
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    RequisitionConvertToOrder,
    FulfillmentTransferOrder,
    OrdersView,
    PodsManage,
    PodsView,
}

impl Right {
    pub fn name(&self) -> &'static str {
        match self {
            Right::RequisitionConvertToOrder => "REQUISITION_CONVERT_TO_ORDER",
            Right::FulfillmentTransferOrder => "FULFILLMENT_TRANSFER_ORDER",
            Right::OrdersView => "ORDERS_VIEW",
            Right::PodsManage => "PODS_MANAGE",
            Right::PodsView => "PODS_VIEW",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a right must hold. `None` means "not scoped by this dimension".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RightScope {
    pub program_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
}

impl RightScope {
    pub fn facility(facility_id: Uuid) -> Self {
        Self { program_id: None, facility_id: Some(facility_id) }
    }

    pub fn program_at_facility(program_id: Uuid, facility_id: Uuid) -> Self {
        Self { program_id: Some(program_id), facility_id: Some(facility_id) }
    }
}

#[async_trait]
pub trait RightsAuthority: Send + Sync {
    async fn has_right(&self, user_id: Uuid, right: Right, scope: RightScope) -> Result<bool, ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Missing right {0}")]
    Missing(Right),

    #[error("Missing all of the rights {0:?}")]
    MissingAny(Vec<Right>),

    #[error("Permission lookup failed: {0}")]
    Authority(#[from] ClientError),
}

#[derive(Clone)]
pub struct PermissionService {
    authority: Arc<dyn RightsAuthority>,
    metrics: Arc<Metrics>,
}

impl PermissionService {
    pub fn new(authority: Arc<dyn RightsAuthority>, metrics: Arc<Metrics>) -> Self {
        Self { authority, metrics }
    }

    pub async fn has_right(&self, user_id: Uuid, right: Right, scope: RightScope) -> Result<bool, PermissionError> {
        Ok(self.authority.has_right(user_id, right, scope).await?)
    }

    pub async fn check(&self, user_id: Uuid, right: Right, scope: RightScope) -> Result<(), PermissionError> {
        if self.has_right(user_id, right, scope).await? {
            return Ok(());
        }

        tracing::warn!(user_id = %user_id, right = %right, scope = ?scope, "🚫 Permission denied");
        self.metrics.record_permission_denial(right.name());
        Err(PermissionError::Missing(right))
    }

    /// Passes when the user holds at least one of `rights`.
    pub async fn check_any(&self, user_id: Uuid, rights: &[Right], scope: RightScope) -> Result<(), PermissionError> {
        for right in rights {
            if self.has_right(user_id, *right, scope).await? {
                return Ok(());
            }
        }

        tracing::warn!(user_id = %user_id, rights = ?rights, scope = ?scope, "🚫 Permission denied");
        for right in rights {
            self.metrics.record_permission_denial(right.name());
        }
        Err(PermissionError::MissingAny(rights.to_vec()))
    }

    pub async fn can_convert_to_order(&self, user_id: Uuid, supplying_facility_id: Uuid) -> Result<(), PermissionError> {
        self.check(user_id, Right::RequisitionConvertToOrder, RightScope::facility(supplying_facility_id)).await
    }

    pub async fn can_transfer_order(&self, user_id: Uuid, order: &Order) -> Result<(), PermissionError> {
        self.check(user_id, Right::FulfillmentTransferOrder, RightScope::facility(order.supplying_facility_id)).await
    }

    pub async fn can_view_order(&self, user_id: Uuid, order: &Order) -> Result<(), PermissionError> {
        self.check(user_id, Right::OrdersView, RightScope::facility(order.supplying_facility_id)).await
    }

    pub async fn can_manage_pod(&self, user_id: Uuid, pod: &ProofOfDelivery) -> Result<(), PermissionError> {
        self.check(user_id, Right::PodsManage, pod_scope(pod)).await
    }

    pub async fn can_view_pod(&self, user_id: Uuid, pod: &ProofOfDelivery) -> Result<(), PermissionError> {
        self.check_any(user_id, &[Right::PodsManage, Right::PodsView], pod_scope(pod)).await
    }

    /// POD read access for an order that may not have a POD yet. Same rights
    /// as `can_view_pod`, scoped by the order's receiving facility.
    pub async fn can_view_pods_of_order(&self, user_id: Uuid, order: &Order) -> Result<(), PermissionError> {
        self.check_any(
            user_id,
            &[Right::PodsManage, Right::PodsView],
            RightScope::program_at_facility(order.program_id, order.receiving_facility_id),
        )
        .await
    }
}

fn pod_scope(pod: &ProofOfDelivery) -> RightScope {
    RightScope::program_at_facility(pod.program_id, pod.receiving_facility_id)
}
