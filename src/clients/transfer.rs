use async_trait::async_trait;

use super::{ClientError, OrderTransfer, ServiceClient};
use crate::domain::order::Order;

/// Posts the order to the configured transfer endpoint.
pub struct HttpOrderTransfer {
    client: ServiceClient,
}

impl HttpOrderTransfer {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderTransfer for HttpOrderTransfer {
    async fn transfer(&self, order: &Order) -> Result<bool, ClientError> {
        self.client.post_json("", order).await?;
        tracing::info!(order_id = %order.id, order_code = %order.order_code, "🚚 Order transferred");
        Ok(true)
    }
}

/// Used when no transfer endpoint is configured. Every transfer fails.
pub struct DisabledOrderTransfer;

#[async_trait]
impl OrderTransfer for DisabledOrderTransfer {
    async fn transfer(&self, order: &Order) -> Result<bool, ClientError> {
        tracing::warn!(order_id = %order.id, "No transfer endpoint configured");
        Ok(false)
    }
}
