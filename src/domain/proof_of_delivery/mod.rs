// ============================================================================
// Proof of Delivery Domain
// ============================================================================
//
// - Value objects (ProofOfDeliveryStatus, Shipment, line items)
// - Commands (UpdateProofOfDelivery)
// - Errors (ProofOfDeliveryError enum)
// - Aggregate (ProofOfDelivery with its confirmation rules)
// - Events (StockEvent emitted downstream on confirmation)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod events;

pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use events::*;
