use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{ClientError, NotificationSender, StockEventSubmitter};
use crate::domain::order::Order;
use crate::domain::proof_of_delivery::{ProofOfDelivery, StockEvent};

/// Side effect of a committed POD confirmation. Hooks run in registration
/// order and the first failure fails the request.
#[async_trait]
pub trait ConfirmationHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_confirmed(&self, pod: &ProofOfDelivery, order: &Order) -> Result<(), ClientError>;
}

pub struct StockEventHook {
    submitter: Arc<dyn StockEventSubmitter>,
}

impl StockEventHook {
    pub fn new(submitter: Arc<dyn StockEventSubmitter>) -> Self {
        Self { submitter }
    }
}

#[async_trait]
impl ConfirmationHook for StockEventHook {
    fn name(&self) -> &'static str {
        "stock-event"
    }

    async fn on_confirmed(&self, pod: &ProofOfDelivery, order: &Order) -> Result<(), ClientError> {
        let event = StockEvent::from_proof_of_delivery(pod, order);
        self.submitter.submit(&event).await
    }
}

pub struct NotificationHook {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationHook {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl ConfirmationHook for NotificationHook {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn on_confirmed(&self, pod: &ProofOfDelivery, _order: &Order) -> Result<(), ClientError> {
        self.sender.pod_confirmed(pod).await
    }
}
