// ============================================================================
// Order Domain - Business Logic for Orders
// ============================================================================
//
// - Value objects (OrderStatus, OrderLineItem, UpdateDetails)
// - Transition table (StatusTransitions)
// - Commands (CreateOrder)
// - Errors (OrderError enum)
// - Aggregate (Order with its lifecycle rules)
// - Search filters (OrderSearchParams)
//
// ============================================================================

pub mod value_objects;
pub mod transitions;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod search;

// Re-export for convenience
pub use value_objects::*;
pub use transitions::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use search::*;
