// ============================================================================
// Proof of Delivery Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProofOfDeliveryError {
    #[error("Proof of delivery is already confirmed")]
    AlreadyConfirmed,

    #[error("Field {0} must contain a value")]
    MissingValue(&'static str),
}
