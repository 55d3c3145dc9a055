use thiserror::Error;

use super::types::Status;

/// Errors surfaced to whoever triggered a coordinator action.
///
/// Remote failures are normally absorbed by the local fallback and never show
/// up here; `Connectivity` is only returned by actions without a local path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
  #[error("Backend unavailable: {0}")]
  Connectivity(String),

  #[error("Please fill in the required field: {field}")]
  Validation { field: &'static str },

  #[error("Request {0} not found")]
  NotFound(String),

  #[error("Request {0} has already been accepted")]
  AlreadyAccepted(String),

  #[error("Request {id} is {status} and cannot be completed")]
  InvalidTransition { id: String, status: Status },

  #[error("Backend connection required to update request status")]
  RequiresConnection,

  #[error("Please login to use the chat")]
  LoginRequired,
}
