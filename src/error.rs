use thiserror::Error;

use crate::models::Role;

/// Errors surfaced to callers of the matching engine
///
/// Malformed features and an untrained estimator never appear here; they
/// resolve to documented defaults where they occur.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile {id} is not a {expected}")]
    InvalidRole { id: String, expected: Role },

    #[error("Invalid privacy parameter: {0}")]
    InvalidPrivacyParameter(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
