//! Rescue requests: domain types, the backend client and the sync coordinator.

pub mod api_types;
mod cache;
pub mod client;
pub mod error;
pub mod sync;
pub mod types;

pub use client::{RemoteSource, RescueClient};
pub use error::SyncError;
pub use sync::{LoadReport, Mode, SyncCoordinator, SyncOptions, SyncPath, Synced};
pub use types::{
  ChatMessage, ChatSession, Helper, NewRequest, Request, Sender, Session, Status, StatusCounts,
};
