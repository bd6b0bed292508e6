use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::{ClientError, NotificationSender, ServiceClient};
use crate::domain::proof_of_delivery::ProofOfDelivery;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationDto<'a> {
    event: &'static str,
    proof_of_delivery_id: Uuid,
    order_id: Uuid,
    facility_id: Uuid,
    program_id: Uuid,
    received_by: Option<&'a str>,
}

pub struct HttpNotificationSender {
    client: ServiceClient,
}

impl HttpNotificationSender {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn pod_confirmed(&self, pod: &ProofOfDelivery) -> Result<(), ClientError> {
        let body = NotificationDto {
            event: "PROOF_OF_DELIVERY_CONFIRMED",
            proof_of_delivery_id: pod.id,
            order_id: pod.order_id(),
            facility_id: pod.receiving_facility_id,
            program_id: pod.program_id,
            received_by: pod.received_by.as_deref(),
        };

        self.client.post_json("/api/notifications", &body).await?;
        tracing::info!(pod_id = %pod.id, "📨 Confirmation notification sent");
        Ok(())
    }
}
