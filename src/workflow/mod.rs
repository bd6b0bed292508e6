// ============================================================================
// Workflows - application services behind the HTTP handlers
// ============================================================================
//
// Each operation follows the same shape:
//   load entity -> permission check (scope from the entity) -> domain rule
//   -> persist -> side effects
//
// ============================================================================

mod hooks;
mod order;
mod proof_of_delivery;

pub use hooks::{ConfirmationHook, NotificationHook, StockEventHook};
pub use order::OrderWorkflow;
pub use proof_of_delivery::ProofOfDeliveryWorkflow;
