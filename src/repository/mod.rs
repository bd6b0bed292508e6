// ============================================================================
// Repository Layer
// ============================================================================
//
// Storage traits for orders, proofs of delivery and the POD audit log.
// - PgStore: PostgreSQL through sqlx
// - MemoryStore: in-process, used by tests and `storage.backend = "memory"`
//
// Both guard every status write with a compare-and-set on the stored status:
// a POD can only be confirmed once, and an order only leaves the status the
// caller loaded it in.
//
// ============================================================================

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::audit::AuditLogEntry;
use crate::domain::order::{Order, OrderSearchParams, OrderStatus};
use crate::domain::proof_of_delivery::ProofOfDelivery;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The POD was confirmed by someone else since it was loaded.
    #[error("Proof of delivery was confirmed concurrently")]
    ConcurrentConfirmation,

    /// The order left `expected` since it was loaded.
    #[error("Order {order_id} is no longer {expected}")]
    StaleOrder { order_id: Uuid, expected: OrderStatus },

    #[error("Order code already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn search(&self, params: &OrderSearchParams) -> Result<Vec<Order>, RepositoryError>;

    /// Distinct requesting facilities in first-seen order.
    async fn requesting_facilities(&self, supplying_facility_id: Option<Uuid>) -> Result<Vec<Uuid>, RepositoryError>;

    /// Store a new order. A duplicate order code is a `Conflict`.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Write the order's status and update details if the stored status is
    /// still `expected`, else `StaleOrder`.
    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProofOfDeliveryRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProofOfDelivery>, RepositoryError>;

    async fn find_by_order_id(&self, order_id: Uuid) -> Result<Option<ProofOfDelivery>, RepositoryError>;

    async fn search(
        &self,
        shipment_id: Option<Uuid>,
        order_id: Option<Uuid>,
    ) -> Result<Vec<ProofOfDelivery>, RepositoryError>;

    /// Persist a non-confirming change. Fails with `ConcurrentConfirmation`
    /// if the stored POD is no longer INITIATED.
    async fn update(&self, pod: &ProofOfDelivery, audit: &[AuditLogEntry]) -> Result<(), RepositoryError>;

    /// Atomically flip the stored POD from INITIATED to CONFIRMED and move
    /// its order out of `order_status`. Fails with `ConcurrentConfirmation`
    /// or `StaleOrder` without writing anything if either has changed.
    async fn confirm(
        &self,
        pod: &ProofOfDelivery,
        order: &Order,
        order_status: OrderStatus,
        audit: &[AuditLogEntry],
    ) -> Result<(), RepositoryError>;

    /// Audit entries for one POD, oldest first.
    async fn audit_log(&self, pod_id: Uuid) -> Result<Vec<AuditLogEntry>, RepositoryError>;
}
