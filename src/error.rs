use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use uuid::Uuid;

use crate::clients::ClientError;
use crate::domain::order::OrderError;
use crate::domain::proof_of_delivery::ProofOfDeliveryError;
use crate::permissions::PermissionError;
use crate::repository::RepositoryError;

// ============================================================================
// Service-level error
// ============================================================================
//
// Every failure a request can end in. Each variant maps to an HTTP status
// and a stable message key that clients localize.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    ProofOfDelivery(#[from] ProofOfDeliveryError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    ExternalService(#[from] ClientError),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Proof of delivery {0} not found")]
    ProofOfDeliveryNotFound(Uuid),

    #[error("Invalid value for {field}")]
    Validation { key: &'static str, field: String },

    #[error("User is not authenticated")]
    Unauthenticated,
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;

impl FulfillmentError {
    pub fn must_be_positive(field: &str) -> Self {
        FulfillmentError::Validation { key: "mustBePositive", field: field.to_string() }
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            FulfillmentError::Order(OrderError::UnknownStatus(_)) => "orderInvalidStatus",
            FulfillmentError::Order(OrderError::InvalidStatusTransition { .. }) => "orderInvalidStatusTransition",
            FulfillmentError::Order(OrderError::RetryInvalidStatus(_)) => "orderRetryInvalidStatus",
            FulfillmentError::ProofOfDelivery(ProofOfDeliveryError::AlreadyConfirmed) => "proofOfDeliveryAlreadyConfirmed",
            FulfillmentError::ProofOfDelivery(ProofOfDeliveryError::MissingValue(_)) => "mustContainValue",
            FulfillmentError::Permission(PermissionError::Missing(_)) => "permissionMissing",
            FulfillmentError::Permission(PermissionError::MissingAny(_)) => "permissionsMissing",
            FulfillmentError::Permission(PermissionError::Authority(_)) => "externalServiceFailure",
            FulfillmentError::Repository(RepositoryError::ConcurrentConfirmation) => "proofOfDeliveryAlreadyConfirmed",
            FulfillmentError::Repository(RepositoryError::StaleOrder { .. }) => "orderStatusChanged",
            FulfillmentError::Repository(RepositoryError::Conflict(_)) => "orderCodeExists",
            FulfillmentError::Repository(_) => "internalError",
            FulfillmentError::ExternalService(_) => "externalServiceFailure",
            FulfillmentError::OrderNotFound(_) => "orderNotFound",
            FulfillmentError::ProofOfDeliveryNotFound(_) => "proofOfDeliveryNotFound",
            FulfillmentError::Validation { key, .. } => *key,
            FulfillmentError::Unauthenticated => "userNotAuthenticated",
        }
    }

    pub fn params(&self) -> Vec<String> {
        match self {
            FulfillmentError::Order(OrderError::UnknownStatus(value)) => vec![value.clone()],
            FulfillmentError::Order(OrderError::InvalidStatusTransition { from, to }) => {
                vec![from.to_string(), to.to_string()]
            }
            FulfillmentError::Order(OrderError::RetryInvalidStatus(status)) => vec![status.to_string()],
            FulfillmentError::ProofOfDelivery(ProofOfDeliveryError::MissingValue(field)) => vec![field.to_string()],
            FulfillmentError::Permission(PermissionError::Missing(right)) => vec![right.to_string()],
            FulfillmentError::Permission(PermissionError::MissingAny(rights)) => {
                rights.iter().map(ToString::to_string).collect()
            }
            FulfillmentError::Permission(PermissionError::Authority(e)) => vec![e.service().to_string()],
            FulfillmentError::Repository(RepositoryError::Conflict(code)) => vec![code.clone()],
            FulfillmentError::Repository(RepositoryError::StaleOrder { order_id, expected }) => {
                vec![order_id.to_string(), expected.to_string()]
            }
            FulfillmentError::ExternalService(e) => vec![e.service().to_string()],
            FulfillmentError::OrderNotFound(id) | FulfillmentError::ProofOfDeliveryNotFound(id) => {
                vec![id.to_string()]
            }
            FulfillmentError::Validation { field, .. } => vec![field.clone()],
            _ => Vec::new(),
        }
    }

    /// Message safe to hand to clients. Storage details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            FulfillmentError::Repository(RepositoryError::Database(_))
            | FulfillmentError::Repository(RepositoryError::Corrupt(_)) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message_key: &'static str,
    pub message: String,
    pub params: Vec<String>,
}

impl ResponseError for FulfillmentError {
    fn status_code(&self) -> StatusCode {
        match self {
            FulfillmentError::Order(_)
            | FulfillmentError::ProofOfDelivery(_)
            | FulfillmentError::Validation { .. }
            | FulfillmentError::Repository(RepositoryError::ConcurrentConfirmation) => StatusCode::BAD_REQUEST,
            FulfillmentError::Permission(PermissionError::Authority(_))
            | FulfillmentError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            FulfillmentError::Permission(_) => StatusCode::FORBIDDEN,
            FulfillmentError::Repository(RepositoryError::Conflict(_))
            | FulfillmentError::Repository(RepositoryError::StaleOrder { .. }) => StatusCode::CONFLICT,
            FulfillmentError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FulfillmentError::OrderNotFound(_) | FulfillmentError::ProofOfDeliveryNotFound(_) => StatusCode::NOT_FOUND,
            FulfillmentError::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), message_key = self.message_key(), error = %self, "❌ Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), message_key = self.message_key(), error = %self, "Request rejected");
        }

        HttpResponse::build(status).json(ErrorBody {
            message_key: self.message_key(),
            message: self.public_message(),
            params: self.params(),
        })
    }
}
