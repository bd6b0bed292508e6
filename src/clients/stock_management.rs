use async_trait::async_trait;

use super::{ClientError, ServiceClient, StockEventSubmitter};
use crate::domain::proof_of_delivery::StockEvent;

pub struct HttpStockEventSubmitter {
    client: ServiceClient,
}

impl HttpStockEventSubmitter {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StockEventSubmitter for HttpStockEventSubmitter {
    async fn submit(&self, event: &StockEvent) -> Result<(), ClientError> {
        self.client.post_json("/api/stockEvents", event).await?;
        tracing::info!(
            document_number = %event.document_number,
            facility_id = %event.facility_id,
            line_items = event.line_items.len(),
            "📦 Stock event submitted"
        );
        Ok(())
    }
}
