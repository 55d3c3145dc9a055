//! Serde types matching the rescue backend's JSON.
//!
//! These types are separate from domain types so the wire shape (uppercase
//! enums, volunteer fields, zone-less timestamps) never leaks past the client.

use chrono::{DateTime, NaiveDateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};

use super::types::{ChatMessage, ChatRoom, Helper, NewRequest, Request, Role, Sender, Session, Status};

// ============================================================================
// Response envelope
// ============================================================================

/// Envelope shared by every endpoint
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  #[serde(default)]
  pub success: bool,
  pub data: Option<T>,
  pub message: Option<String>,
}

impl<T> ApiResponse<T> {
  /// Check the success flag, keeping the (possibly empty) payload
  pub fn into_checked(self) -> Result<Option<T>> {
    if self.success {
      Ok(self.data)
    } else {
      Err(eyre!(self
        .message
        .unwrap_or_else(|| "Request was not successful".to_string())))
    }
  }

  /// Check the success flag and require a payload
  pub fn into_data(self) -> Result<T> {
    self
      .into_checked()?
      .ok_or_else(|| eyre!("Response carried no data"))
  }
}

// ============================================================================
// Emergency requests
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEmergencyRequest {
  pub id: String,
  #[serde(default)]
  pub animal_type: String,
  #[serde(default)]
  pub urgency: String,
  #[serde(default)]
  pub location: String,
  #[serde(default)]
  pub contact_name: String,
  #[serde(default)]
  pub contact_phone: String,
  pub contact_email: Option<String>,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status: String,
  pub volunteer_id: Option<u64>,
  pub volunteer_name: Option<String>,
  pub volunteer_phone: Option<String>,
  pub created_at: Option<String>,
}

impl ApiEmergencyRequest {
  /// Normalize into the shared request shape
  pub fn into_request(self) -> Request {
    let status = Status::from_remote(&self.status);
    let helper = match status {
      Status::Pending => None,
      _ => Some(Helper {
        name: self
          .volunteer_name
          .filter(|n| !n.trim().is_empty())
          .unwrap_or_else(|| "Volunteer".to_string()),
        phone: self.volunteer_phone.unwrap_or_default(),
        email: None,
        remote_id: self.volunteer_id,
      }),
    };

    Request {
      id: self.id,
      animal_type: self.animal_type,
      urgency: self.urgency.to_lowercase(),
      location: self.location,
      contact_name: self.contact_name,
      contact_phone: self.contact_phone,
      contact_email: self.contact_email.filter(|e| !e.trim().is_empty()),
      description: self.description,
      status,
      helper,
      timestamp: parse_timestamp(self.created_at.as_deref()),
      chat_messages: Vec::new(),
      chat_room_id: None,
    }
  }
}

/// Body of `POST /emergency/submit`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSubmitRequest<'a> {
  pub animal_type: &'a str,
  pub urgency: String,
  pub location: &'a str,
  pub contact_name: &'a str,
  pub contact_phone: &'a str,
  pub contact_email: &'a str,
  pub description: &'a str,
}

impl<'a> From<&'a NewRequest> for ApiSubmitRequest<'a> {
  fn from(fields: &'a NewRequest) -> Self {
    Self {
      animal_type: &fields.animal_type,
      urgency: fields.urgency.to_uppercase(),
      location: &fields.location,
      contact_name: &fields.contact_name,
      contact_phone: &fields.contact_phone,
      contact_email: fields.contact_email.as_deref().unwrap_or(""),
      description: &fields.description,
    }
  }
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiChatRoom {
  pub id: u64,
}

impl From<ApiChatRoom> for ChatRoom {
  fn from(room: ApiChatRoom) -> Self {
    ChatRoom { id: room.id }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChatMessage {
  #[serde(default)]
  pub message: String,
  pub sender_type: Option<String>,
  pub created_at: Option<String>,
}

impl From<ApiChatMessage> for ChatMessage {
  fn from(msg: ApiChatMessage) -> Self {
    ChatMessage {
      sender: msg
        .sender_type
        .as_deref()
        .map(Sender::from_remote)
        .unwrap_or(Sender::System),
      message: msg.message,
      timestamp: parse_timestamp(msg.created_at.as_deref()),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ApiChatMessageBody<'a> {
  pub message: &'a str,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiLoginRequest<'a> {
  pub username: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiJwtResponse {
  #[serde(alias = "accessToken")]
  pub token: String,
  pub id: u64,
  pub username: String,
  pub email: Option<String>,
  pub full_name: Option<String>,
  #[serde(default)]
  pub role: String,
}

impl From<ApiJwtResponse> for Session {
  fn from(jwt: ApiJwtResponse) -> Self {
    Session {
      token: jwt.token,
      user_id: jwt.id,
      username: jwt.username,
      full_name: jwt.full_name,
      email: jwt.email,
      role: Role::from_remote(&jwt.role),
    }
  }
}

/// Parse a backend timestamp.
///
/// The backend sends zone-less local date-times, taken as UTC. RFC 3339 is
/// accepted as well. Missing or unparseable values fall back to now.
pub fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
  let Some(value) = value else {
    return Utc::now();
  };

  DateTime::parse_from_rfc3339(value)
    .map(|dt| dt.with_timezone(&Utc))
    .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc()))
    .unwrap_or_else(|_| Utc::now())
}
