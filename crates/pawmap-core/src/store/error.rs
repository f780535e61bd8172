use thiserror::Error;

use crate::models::MarkerStatus;

/// Terminal failures of marker store operations. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Marker not found: {0}")]
    NotFound(String),

    #[error("User {user_id} is not allowed to modify marker {marker_id}")]
    NotAuthorized { marker_id: String, user_id: String },

    #[error("Cannot move marker {marker_id} from {from} to {to}")]
    InvalidTransition {
        marker_id: String,
        from: MarkerStatus,
        to: MarkerStatus,
    },

    #[error("Invalid marker data: {0}")]
    Validation(String),
}
