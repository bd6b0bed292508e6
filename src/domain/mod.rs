// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with value objects, commands,
// errors and the aggregate itself. Nothing here talks to storage, HTTP or
// the permission authority.
//
// ============================================================================

pub mod order;
pub mod proof_of_delivery;
pub mod audit;
