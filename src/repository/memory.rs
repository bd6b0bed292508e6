use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{OrderRepository, ProofOfDeliveryRepository, RepositoryError};
use crate::domain::audit::AuditLogEntry;
use crate::domain::order::{Order, OrderSearchParams, OrderStatus};
use crate::domain::proof_of_delivery::{ProofOfDelivery, ProofOfDeliveryStatus};

#[derive(Default)]
struct State {
    // Insertion order is kept for `requesting_facilities`.
    orders: Vec<Order>,
    pods: HashMap<Uuid, ProofOfDelivery>,
    audit: Vec<AuditLogEntry>,
}

impl State {
    fn upsert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        let duplicate = self
            .orders
            .iter()
            .any(|o| o.order_code == order.order_code && o.id != order.id);
        if duplicate {
            return Err(RepositoryError::Conflict(order.order_code.clone()));
        }

        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order.clone(),
            None => self.orders.push(order.clone()),
        }
        Ok(())
    }

    fn ensure_order_status(&self, order_id: Uuid, expected: OrderStatus) -> Result<usize, RepositoryError> {
        match self.orders.iter().position(|o| o.id == order_id) {
            Some(index) if self.orders[index].status == expected => Ok(index),
            _ => Err(RepositoryError::StaleOrder { order_id, expected }),
        }
    }

    fn write_status(&mut self, index: usize, order: &Order) {
        let stored = &mut self.orders[index];
        stored.status = order.status;
        stored.update_details = order.update_details.clone();
    }

    fn ensure_initiated(&self, pod_id: Uuid) -> Result<(), RepositoryError> {
        match self.pods.get(&pod_id) {
            Some(stored) if stored.status == ProofOfDeliveryStatus::Initiated => Ok(()),
            _ => Err(RepositoryError::ConcurrentConfirmation),
        }
    }
}

/// In-process store for both aggregates. Every operation takes one lock,
/// which makes the POD compare-and-set atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    order_saves: Arc<AtomicUsize>,
    pod_saves: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a POD directly. PODs are created by the shipping flow, which
    /// lives outside this service.
    pub async fn insert_proof_of_delivery(&self, pod: ProofOfDelivery) {
        self.state.lock().await.pods.insert(pod.id, pod);
    }

    /// Seed an order without counting it as a save.
    pub async fn insert_order(&self, order: Order) -> Result<(), RepositoryError> {
        self.state.lock().await.upsert_order(&order)
    }

    /// Successful order writes, including those made by `confirm`.
    pub fn order_save_count(&self) -> usize {
        self.order_saves.load(Ordering::SeqCst)
    }

    pub fn pod_save_count(&self) -> usize {
        self.pod_saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.clone())
    }

    async fn search(&self, params: &OrderSearchParams) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().filter(|o| params.matches(o)).cloned().collect())
    }

    async fn requesting_facilities(&self, supplying_facility_id: Option<Uuid>) -> Result<Vec<Uuid>, RepositoryError> {
        let state = self.state.lock().await;
        let mut seen = HashSet::new();

        Ok(state
            .orders
            .iter()
            .filter(|o| supplying_facility_id.map_or(true, |id| o.supplying_facility_id == id))
            .map(|o| o.requesting_facility_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }

    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        self.state.lock().await.upsert_order(order)?;
        self.order_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let index = state.ensure_order_status(order.id, expected)?;

        state.write_status(index, order);
        self.order_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProofOfDeliveryRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ProofOfDelivery>, RepositoryError> {
        Ok(self.state.lock().await.pods.get(&id).cloned())
    }

    async fn find_by_order_id(&self, order_id: Uuid) -> Result<Option<ProofOfDelivery>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.pods.values().find(|p| p.order_id() == order_id).cloned())
    }

    async fn search(
        &self,
        shipment_id: Option<Uuid>,
        order_id: Option<Uuid>,
    ) -> Result<Vec<ProofOfDelivery>, RepositoryError> {
        let state = self.state.lock().await;
        let mut pods: Vec<ProofOfDelivery> = state
            .pods
            .values()
            .filter(|p| shipment_id.map_or(true, |id| p.shipment.id == id))
            .filter(|p| order_id.map_or(true, |id| p.order_id() == id))
            .cloned()
            .collect();
        pods.sort_by_key(|p| p.id);
        Ok(pods)
    }

    async fn update(&self, pod: &ProofOfDelivery, audit: &[AuditLogEntry]) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.ensure_initiated(pod.id)?;

        state.pods.insert(pod.id, pod.clone());
        state.audit.extend_from_slice(audit);
        self.pod_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn confirm(
        &self,
        pod: &ProofOfDelivery,
        order: &Order,
        order_status: OrderStatus,
        audit: &[AuditLogEntry],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.ensure_initiated(pod.id)?;
        let index = state.ensure_order_status(order.id, order_status)?;

        state.write_status(index, order);
        state.pods.insert(pod.id, pod.clone());
        state.audit.extend_from_slice(audit);
        self.pod_saves.fetch_add(1, Ordering::SeqCst);
        self.order_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn audit_log(&self, pod_id: Uuid) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.audit.iter().filter(|e| e.entity_id == pod_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::test_support::{order_fixture, pod_fixture};

    #[tokio::test]
    async fn test_duplicate_order_code_conflicts() {
        let store = MemoryStore::new();
        let first = order_fixture(OrderStatus::Ordered);
        let mut second = order_fixture(OrderStatus::Ordered);
        second.order_code = first.order_code.clone();

        store.insert(&first).await.unwrap();
        let result = store.insert(&second).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(code)) if code == first.order_code));
        assert_eq!(store.order_save_count(), 1);
    }

    #[tokio::test]
    async fn test_update_status_is_compare_and_set() {
        let store = MemoryStore::new();
        let mut order = order_fixture(OrderStatus::Ordered);
        store.insert(&order).await.unwrap();

        order.status = OrderStatus::Fetched;
        store.update_status(&order, OrderStatus::Ordered).await.unwrap();

        // A writer that still believes the order is ORDERED loses.
        let mut stale = order.clone();
        stale.status = OrderStatus::InRoute;
        let result = store.update_status(&stale, OrderStatus::Ordered).await;
        assert!(matches!(
            result,
            Err(RepositoryError::StaleOrder { order_id, expected: OrderStatus::Ordered }) if order_id == order.id
        ));

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, OrderStatus::Fetched);
        assert_eq!(store.order_save_count(), 2);
    }

    #[tokio::test]
    async fn test_update_status_of_unknown_order_is_stale() {
        let store = MemoryStore::new();
        let order = order_fixture(OrderStatus::Ordered);

        let result = store.update_status(&order, OrderStatus::Ordered).await;
        assert!(matches!(result, Err(RepositoryError::StaleOrder { .. })));
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requesting_facilities_are_distinct_in_first_seen_order() {
        let store = MemoryStore::new();
        let a = order_fixture(OrderStatus::Ordered);
        let mut b = order_fixture(OrderStatus::Ordered);
        b.supplying_facility_id = a.supplying_facility_id;
        let mut c = order_fixture(OrderStatus::Ordered);
        c.requesting_facility_id = a.requesting_facility_id;

        for order in [&a, &b, &c] {
            store.insert(order).await.unwrap();
        }

        let all = store.requesting_facilities(None).await.unwrap();
        assert_eq!(all, vec![a.requesting_facility_id, b.requesting_facility_id]);

        let supplied = store.requesting_facilities(Some(a.supplying_facility_id)).await.unwrap();
        assert_eq!(supplied, vec![a.requesting_facility_id, b.requesting_facility_id]);

        let other = store.requesting_facilities(Some(c.supplying_facility_id)).await.unwrap();
        assert_eq!(other, vec![c.requesting_facility_id]);
    }

    #[tokio::test]
    async fn test_confirm_is_compare_and_set() {
        let store = MemoryStore::new();
        let mut order = order_fixture(OrderStatus::Shipped);
        let pod = pod_fixture(&order, ProofOfDeliveryStatus::Initiated);
        store.insert_order(order.clone()).await.unwrap();
        store.insert_proof_of_delivery(pod.clone()).await;

        let mut confirmed = pod.clone();
        confirmed.status = ProofOfDeliveryStatus::Confirmed;
        order.status = OrderStatus::Received;

        store.confirm(&confirmed, &order, OrderStatus::Shipped, &[]).await.unwrap();
        let second = store.confirm(&confirmed, &order, OrderStatus::Shipped, &[]).await;
        assert!(matches!(second, Err(RepositoryError::ConcurrentConfirmation)));

        let stale_update = store.update(&pod, &[]).await;
        assert!(matches!(stale_update, Err(RepositoryError::ConcurrentConfirmation)));
        assert_eq!(store.pod_save_count(), 1);

        let stored = ProofOfDeliveryRepository::find_by_id(&store, pod.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProofOfDeliveryStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_confirm_writes_nothing_when_order_moved() {
        let store = MemoryStore::new();
        let mut order = order_fixture(OrderStatus::TransferFailed);
        let pod = pod_fixture(&order, ProofOfDeliveryStatus::Initiated);
        store.insert_order(order.clone()).await.unwrap();
        store.insert_proof_of_delivery(pod.clone()).await;

        // Someone else moves the order on first.
        let mut in_route = order.clone();
        in_route.status = OrderStatus::InRoute;
        store.update_status(&in_route, OrderStatus::TransferFailed).await.unwrap();

        let mut confirmed = pod.clone();
        confirmed.status = ProofOfDeliveryStatus::Confirmed;
        order.status = OrderStatus::Received;
        let result = store.confirm(&confirmed, &order, OrderStatus::TransferFailed, &[]).await;

        assert!(matches!(result, Err(RepositoryError::StaleOrder { expected: OrderStatus::TransferFailed, .. })));
        let stored_pod = ProofOfDeliveryRepository::find_by_id(&store, pod.id).await.unwrap().unwrap();
        assert_eq!(stored_pod.status, ProofOfDeliveryStatus::Initiated);
        let stored_order = OrderRepository::find_by_id(&store, order.id).await.unwrap().unwrap();
        assert_eq!(stored_order.status, OrderStatus::InRoute);
        assert_eq!(store.pod_save_count(), 0);
    }

    #[tokio::test]
    async fn test_pod_search_filters_conjunctively() {
        let store = MemoryStore::new();
        let first = pod_fixture(&order_fixture(OrderStatus::Shipped), ProofOfDeliveryStatus::Initiated);
        let second = pod_fixture(&order_fixture(OrderStatus::Shipped), ProofOfDeliveryStatus::Initiated);
        store.insert_proof_of_delivery(first.clone()).await;
        store.insert_proof_of_delivery(second.clone()).await;

        assert_eq!(ProofOfDeliveryRepository::search(&store, None, None).await.unwrap().len(), 2);

        let by_order = ProofOfDeliveryRepository::search(&store, None, Some(first.order_id())).await.unwrap();
        assert_eq!(by_order, vec![first.clone()]);

        let mismatched = ProofOfDeliveryRepository::search(&store, Some(first.shipment.id), Some(second.order_id()))
            .await
            .unwrap();
        assert!(mismatched.is_empty());
    }
}
