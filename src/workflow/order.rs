use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::clients::OrderTransfer;
use crate::clock::Clock;
use crate::domain::order::{CreateOrder, Order, OrderSearchParams, OrderStatus, StatusTransitions};
use crate::error::{FulfillmentError, Result};
use crate::metrics::Metrics;
use crate::pagination::{Page, Pageable};
use crate::permissions::{PermissionService, Right, RightScope};
use crate::repository::OrderRepository;

// ============================================================================
// Order Workflow
// ============================================================================

pub struct OrderWorkflow {
    orders: Arc<dyn OrderRepository>,
    permissions: PermissionService,
    transfer: Arc<dyn OrderTransfer>,
    transitions: Arc<StatusTransitions>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl OrderWorkflow {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        permissions: PermissionService,
        transfer: Arc<dyn OrderTransfer>,
        transitions: Arc<StatusTransitions>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { orders, permissions, transfer, transitions, clock, metrics }
    }

    pub async fn create(&self, user_id: Uuid, command: CreateOrder) -> Result<Order> {
        self.permissions.can_convert_to_order(user_id, command.supplying_facility_id).await?;
        self.save_new(user_id, command).await
    }

    /// All payloads are authorized before the first one is saved.
    pub async fn create_batch(&self, user_id: Uuid, commands: Vec<CreateOrder>) -> Result<Vec<Order>> {
        for command in &commands {
            self.permissions.can_convert_to_order(user_id, command.supplying_facility_id).await?;
        }

        let mut created = Vec::with_capacity(commands.len());
        for command in commands {
            created.push(self.save_new(user_id, command).await?);
        }
        Ok(created)
    }

    async fn save_new(&self, user_id: Uuid, command: CreateOrder) -> Result<Order> {
        let order = Order::create(command, user_id, self.clock.now());
        self.orders.insert(&order).await?;
        self.metrics.record_order_created();

        tracing::info!(
            order_id = %order.id,
            order_code = %order.order_code,
            supplying_facility_id = %order.supplying_facility_id,
            "✅ Order created"
        );
        Ok(order)
    }

    pub async fn get(&self, user_id: Uuid, order_id: Uuid) -> Result<Order> {
        let order = self.find(order_id).await?;
        self.permissions.can_view_order(user_id, &order).await?;
        Ok(order)
    }

    /// Every order the user may view.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let orders = self.orders.find_all().await?;
        self.visible_to(user_id, orders).await
    }

    pub async fn search(&self, user_id: Uuid, params: &OrderSearchParams, pageable: Pageable) -> Result<Page<Order>> {
        if pageable.size == 0 {
            return Err(FulfillmentError::must_be_positive("size"));
        }

        let matching = self.orders.search(params).await?;
        let mut visible = self.visible_to(user_id, matching).await?;
        visible.sort_by(|a, b| b.created_date.cmp(&a.created_date));

        tracing::debug!(user_id = %user_id, params = ?params, found = visible.len(), "Order search");
        Ok(Page::from_vec(visible, pageable))
    }

    pub async fn requesting_facilities(&self, supplying_facility_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        Ok(self.orders.requesting_facilities(supplying_facility_id).await?)
    }

    /// Re-dispatch an order whose transfer failed. Returns whether the
    /// transfer went through this time. The move to IN_ROUTE only lands if
    /// the order is still TRANSFER_FAILED once the transfer returns.
    pub async fn retry(&self, user_id: Uuid, order_id: Uuid) -> Result<bool> {
        let mut order = self.find(order_id).await?;
        self.permissions.can_transfer_order(user_id, &order).await?;
        order.ensure_retryable()?;

        let transferred = match self.transfer.transfer(&order).await {
            Ok(transferred) => transferred,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Transfer errored during retry");
                false
            }
        };

        if transferred {
            self.apply_status(&mut order, OrderStatus::InRoute, user_id)?;
            if let Err(e) = self.orders.update_status(&order, OrderStatus::TransferFailed).await {
                tracing::warn!(order_id = %order.id, error = %e, "Order changed while it was being transferred");
                return Err(e.into());
            }
            self.metrics.record_status_transition(OrderStatus::TransferFailed.as_str(), OrderStatus::InRoute.as_str());
        }

        self.metrics.record_retry(transferred);
        tracing::info!(order_id = %order.id, transferred, "🔁 Order transfer retried");
        Ok(transferred)
    }

    /// Transition `order` in memory. The caller persists it.
    pub fn apply_status(&self, order: &mut Order, to: OrderStatus, user_id: Uuid) -> Result<()> {
        let from = order.status;
        order.apply_status(to, &self.transitions, user_id, self.clock.now())?;
        tracing::debug!(order_id = %order.id, from = ?from, to = ?to, "Order status applied");
        Ok(())
    }

    async fn find(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Drops orders whose supplying facility the user cannot view. The
    /// authority is asked once per facility.
    async fn visible_to(&self, user_id: Uuid, orders: Vec<Order>) -> Result<Vec<Order>> {
        let mut decisions: HashMap<Uuid, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(orders.len());

        for order in orders {
            let facility_id = order.supplying_facility_id;
            let allowed = match decisions.get(&facility_id) {
                Some(allowed) => *allowed,
                None => {
                    let allowed = self
                        .permissions
                        .has_right(user_id, Right::OrdersView, RightScope::facility(facility_id))
                        .await?;
                    decisions.insert(facility_id, allowed);
                    allowed
                }
            };

            if allowed {
                visible.push(order);
            }
        }

        Ok(visible)
    }
}
