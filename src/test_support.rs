//! Fixtures, fakes and a wired-up in-memory service for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::api::AppState;
use crate::clients::{ClientError, NotificationSender, OrderTransfer, StockEventSubmitter};
use crate::clock::Clock;
use crate::domain::order::{generate_order_code, Order, OrderLineItem, OrderStatus, StatusTransitions, UpdateDetails};
use crate::domain::proof_of_delivery::{
    ProofOfDelivery, ProofOfDeliveryLineItem, ProofOfDeliveryStatus, Shipment, StockEvent,
};
use crate::metrics::Metrics;
use crate::permissions::{PermissionService, Right, RightScope, RightsAuthority};
use crate::repository::{MemoryStore, OrderRepository};
use crate::workflow::{ConfirmationHook, NotificationHook, OrderWorkflow, ProofOfDeliveryWorkflow, StockEventHook};

// ============================================================================
// Fixtures
// ============================================================================

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 5, 7, 10, 5, 20).unwrap()
}

pub fn order_fixture(status: OrderStatus) -> Order {
    let id = Uuid::new_v4();
    let creator = Uuid::new_v4();

    Order {
        id,
        external_id: Some(Uuid::new_v4()),
        order_code: generate_order_code(id, false),
        emergency: false,
        status,
        program_id: Uuid::new_v4(),
        processing_period_id: Uuid::new_v4(),
        requesting_facility_id: Uuid::new_v4(),
        receiving_facility_id: Uuid::new_v4(),
        supplying_facility_id: Uuid::new_v4(),
        facility_id: Uuid::new_v4(),
        created_by_id: creator,
        created_date: fixed_time(),
        update_details: UpdateDetails::new(creator, fixed_time()),
        quoted_cost: Some("12.50".to_string()),
        order_line_items: vec![OrderLineItem {
            id: Uuid::new_v4(),
            orderable_id: Uuid::new_v4(),
            ordered_quantity: 10,
            filled_quantity: 10,
            packs_to_ship: 1,
        }],
    }
}

/// A POD for `order` with every field confirmation needs already filled in.
pub fn pod_fixture(order: &Order, status: ProofOfDeliveryStatus) -> ProofOfDelivery {
    let line_items = order
        .order_line_items
        .iter()
        .map(|item| ProofOfDeliveryLineItem {
            id: Uuid::new_v4(),
            orderable_id: item.orderable_id,
            lot_id: Some(Uuid::new_v4()),
            quantity_accepted: Some(item.filled_quantity),
            quantity_rejected: None,
            rejection_reason_id: None,
            notes: None,
        })
        .collect();

    ProofOfDelivery {
        id: Uuid::new_v4(),
        shipment: Shipment {
            id: Uuid::new_v4(),
            order_id: order.id,
            shipped_by_id: Uuid::new_v4(),
            shipped_date: fixed_time(),
            notes: None,
        },
        program_id: order.program_id,
        receiving_facility_id: order.receiving_facility_id,
        status,
        delivered_by: Some("Courier".to_string()),
        received_by: Some("Receiver".to_string()),
        received_date: NaiveDate::from_ymd_opt(2017, 5, 8),
        line_items,
    }
}

// ============================================================================
// Fakes
// ============================================================================

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Grants exactly the (user, right, scope) triples it was given.
#[derive(Default)]
pub struct StaticRights {
    grants: Mutex<HashSet<(Uuid, Right, RightScope)>>,
    calls: AtomicUsize,
}

impl StaticRights {
    pub fn grant(&self, user_id: Uuid, right: Right, scope: RightScope) {
        self.grants.lock().unwrap().insert((user_id, right, scope));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RightsAuthority for StaticRights {
    async fn has_right(&self, user_id: Uuid, right: Right, scope: RightScope) -> Result<bool, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.grants.lock().unwrap().contains(&(user_id, right, scope)))
    }
}

#[derive(Default)]
pub struct RecordingStockEvents {
    events: Mutex<Vec<StockEvent>>,
    fail: bool,
}

impl RecordingStockEvents {
    pub fn failing() -> Self {
        Self { events: Mutex::default(), fail: true }
    }

    pub fn events(&self) -> Vec<StockEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl StockEventSubmitter for RecordingStockEvents {
    async fn submit(&self, event: &StockEvent) -> Result<(), ClientError> {
        if self.fail {
            return Err(ClientError::Status { service: "stock-management".to_string(), status: 500 });
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    confirmed: Mutex<Vec<Uuid>>,
}

impl RecordingNotifications {
    pub fn confirmed(&self) -> Vec<Uuid> {
        self.confirmed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifications {
    async fn pod_confirmed(&self, pod: &ProofOfDelivery) -> Result<(), ClientError> {
        self.confirmed.lock().unwrap().push(pod.id);
        Ok(())
    }
}

enum TransferOutcome {
    Succeed,
    Fail,
    Error,
}

/// Holds a transfer inside `transfer()` until the test lets it go.
#[derive(Default)]
struct TransferGate {
    parked: Notify,
    release: Notify,
}

pub struct RecordingTransfer {
    outcome: TransferOutcome,
    transferred: Mutex<Vec<Uuid>>,
    gate: Option<TransferGate>,
}

impl RecordingTransfer {
    fn with(outcome: TransferOutcome) -> Self {
        Self { outcome, transferred: Mutex::default(), gate: None }
    }

    /// Succeeds, but only after `release` is called.
    pub fn gated() -> Self {
        Self { gate: Some(TransferGate::default()), ..Self::with(TransferOutcome::Succeed) }
    }

    /// Resolves once a gated transfer is waiting inside `transfer()`.
    pub async fn parked(&self) {
        if let Some(gate) = &self.gate {
            gate.parked.notified().await;
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    pub fn succeeding() -> Self {
        Self::with(TransferOutcome::Succeed)
    }

    pub fn failing() -> Self {
        Self::with(TransferOutcome::Fail)
    }

    pub fn erroring() -> Self {
        Self::with(TransferOutcome::Error)
    }

    /// Orders that were handed over successfully.
    pub fn transferred(&self) -> Vec<Uuid> {
        self.transferred.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderTransfer for RecordingTransfer {
    async fn transfer(&self, order: &Order) -> Result<bool, ClientError> {
        if let Some(gate) = &self.gate {
            gate.parked.notify_one();
            gate.release.notified().await;
        }

        match self.outcome {
            TransferOutcome::Succeed => {
                self.transferred.lock().unwrap().push(order.id);
                Ok(true)
            }
            TransferOutcome::Fail => Ok(false),
            TransferOutcome::Error => Err(ClientError::CircuitOpen("transfer".to_string())),
        }
    }
}

// ============================================================================
// Harness - workflows over the memory store with recording fakes
// ============================================================================

pub struct Harness {
    pub user: Uuid,
    pub store: MemoryStore,
    pub rights: Arc<StaticRights>,
    pub stock_events: Arc<RecordingStockEvents>,
    pub notifications: Arc<RecordingNotifications>,
    pub transfer: Arc<RecordingTransfer>,
    pub metrics: Arc<Metrics>,
    pub orders: Arc<OrderWorkflow>,
    pub pods: Arc<ProofOfDeliveryWorkflow>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(RecordingTransfer::succeeding(), StatusTransitions::default(), RecordingStockEvents::default())
    }

    pub fn with_transfer(transfer: RecordingTransfer) -> Self {
        Self::build(transfer, StatusTransitions::default(), RecordingStockEvents::default())
    }

    pub fn with_transitions(transitions: StatusTransitions) -> Self {
        Self::build(RecordingTransfer::succeeding(), transitions, RecordingStockEvents::default())
    }

    pub fn with_failing_stock_events() -> Self {
        Self::build(RecordingTransfer::succeeding(), StatusTransitions::default(), RecordingStockEvents::failing())
    }

    fn build(transfer: RecordingTransfer, transitions: StatusTransitions, stock_events: RecordingStockEvents) -> Self {
        let store = MemoryStore::new();
        let rights = Arc::new(StaticRights::default());
        let stock_events = Arc::new(stock_events);
        let notifications = Arc::new(RecordingNotifications::default());
        let transfer = Arc::new(transfer);
        let metrics = Arc::new(Metrics::new().unwrap());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(fixed_time()));
        let permissions = PermissionService::new(rights.clone(), metrics.clone());

        let orders = Arc::new(OrderWorkflow::new(
            Arc::new(store.clone()),
            permissions.clone(),
            transfer.clone(),
            Arc::new(transitions),
            clock.clone(),
            metrics.clone(),
        ));

        let hooks: Vec<Arc<dyn ConfirmationHook>> = vec![
            Arc::new(StockEventHook::new(stock_events.clone())),
            Arc::new(NotificationHook::new(notifications.clone())),
        ];
        let pods = Arc::new(ProofOfDeliveryWorkflow::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            orders.clone(),
            permissions,
            hooks,
            clock,
            metrics.clone(),
        ));

        Self {
            user: Uuid::new_v4(),
            store,
            rights,
            stock_events,
            notifications,
            transfer,
            metrics,
            orders,
            pods,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            orders: self.orders.clone(),
            pods: self.pods.clone(),
        }
    }

    pub async fn seed_order(&self, status: OrderStatus) -> Order {
        let order = order_fixture(status);
        self.store.insert_order(order.clone()).await.unwrap();
        order
    }

    pub async fn seed_pod(&self, order: &Order, status: ProofOfDeliveryStatus) -> ProofOfDelivery {
        let pod = pod_fixture(order, status);
        self.store.insert_proof_of_delivery(pod.clone()).await;
        pod
    }

    pub async fn stored_order(&self, id: Uuid) -> Order {
        OrderRepository::find_by_id(&self.store, id).await.unwrap().unwrap()
    }

    pub fn grant(&self, right: Right, scope: RightScope) {
        self.rights.grant(self.user, right, scope);
    }

    /// Grant `right` at the order's supplying facility.
    pub fn grant_order(&self, right: Right, order: &Order) {
        self.grant(right, RightScope::facility(order.supplying_facility_id));
    }

    pub fn grant_pod(&self, right: Right, pod: &ProofOfDelivery) {
        self.grant(right, RightScope::program_at_facility(pod.program_id, pod.receiving_facility_id));
    }
}
