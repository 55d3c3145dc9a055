use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every locally generated request id
pub const LOCAL_ID_PREFIX: &str = "REQ-";

/// Lifecycle state of a rescue request. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  #[default]
  Pending,
  Accepted,
  Completed,
}

impl Status {
  /// Name used by the backend in paths and query strings
  pub fn api_name(&self) -> &'static str {
    match self {
      Status::Pending => "PENDING",
      Status::Accepted => "ACCEPTED",
      Status::Completed => "COMPLETED",
    }
  }

  /// Normalize a backend status string.
  ///
  /// The backend knows a few intermediate states; anything past pending that
  /// is not finished counts as accepted.
  pub fn from_remote(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "pending" | "" => Status::Pending,
      "completed" | "resolved" | "closed" | "cancelled" => Status::Completed,
      _ => Status::Accepted,
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Status::Pending => f.pad("pending"),
      Status::Accepted => f.pad("accepted"),
      Status::Completed => f.pad("completed"),
    }
  }
}

/// Volunteer who took on a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Helper {
  pub name: String,
  pub phone: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  /// Backend user id, when the assignment went through the backend
  #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
  pub remote_id: Option<u64>,
}

impl Helper {
  pub fn new(name: impl Into<String>, phone: impl Into<String>, email: Option<String>) -> Self {
    Self {
      name: name.into(),
      phone: phone.into(),
      email,
      remote_id: None,
    }
  }

  /// Trim fields and drop a blank email
  pub fn normalized(self) -> Self {
    Self {
      name: self.name.trim().to_string(),
      phone: self.phone.trim().to_string(),
      email: non_blank(self.email),
      remote_id: self.remote_id,
    }
  }
}

/// Who wrote a chat message.
///
/// Stored as a plain string: `"system"`, `"user"`, or whatever role or name the
/// backend assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sender {
  System,
  /// The person using this client, when the message never reached the backend
  User,
  /// Role assigned by the backend (e.g. "volunteer"), or a named party
  Party(String),
}

impl Sender {
  /// Classify a backend sender type
  pub fn from_remote(sender_type: &str) -> Self {
    Sender::from(sender_type.trim().to_lowercase())
  }

  pub fn label(&self) -> &str {
    match self {
      Sender::System => "system",
      Sender::User => "you",
      Sender::Party(name) => name,
    }
  }
}

impl From<String> for Sender {
  fn from(s: String) -> Self {
    match s.as_str() {
      "system" => Sender::System,
      "user" => Sender::User,
      _ => Sender::Party(s),
    }
  }
}

impl From<Sender> for String {
  fn from(sender: Sender) -> Self {
    match sender {
      Sender::System => "system".to_string(),
      Sender::User => "user".to_string(),
      Sender::Party(s) => s,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub sender: Sender,
  pub message: String,
  pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
  pub fn new(sender: Sender, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
    Self {
      sender,
      message: message.into(),
      timestamp,
    }
  }
}

/// An emergency rescue request.
///
/// Field names serialize in camelCase so caches written by the web client stay
/// readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
  pub id: String,
  pub animal_type: String,
  pub urgency: String,
  pub location: String,
  pub contact_name: String,
  pub contact_phone: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contact_email: Option<String>,
  pub description: String,
  #[serde(default)]
  pub status: Status,
  #[serde(default)]
  pub helper: Option<Helper>,
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub chat_messages: Vec<ChatMessage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub chat_room_id: Option<u64>,
}

impl Request {
  /// Contact email, if one was given
  pub fn contact_email(&self) -> Option<&str> {
    self.contact_email.as_deref().filter(|e| !e.trim().is_empty())
  }

  /// Whether this request was created on this device and never reached the backend
  pub fn is_local(&self) -> bool {
    self.id.starts_with(LOCAL_ID_PREFIX)
  }

  /// Name of the person on the other side of the chat
  pub fn chat_partner(&self) -> &str {
    match &self.helper {
      Some(helper) if !helper.name.is_empty() => &helper.name,
      _ => &self.contact_name,
    }
  }

  /// Case-insensitive match against the free-text fields
  pub fn matches(&self, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
      return true;
    }
    [
      &self.animal_type,
      &self.location,
      &self.description,
      &self.contact_name,
      &self.id,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&query))
  }
}

/// Fields supplied when submitting a new request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRequest {
  pub animal_type: String,
  pub urgency: String,
  pub location: String,
  pub contact_name: String,
  pub contact_phone: String,
  pub contact_email: Option<String>,
  pub description: String,
}

impl NewRequest {
  /// Name of the first required field that is blank, in form order
  pub fn first_missing(&self) -> Option<&'static str> {
    [
      ("animalType", &self.animal_type),
      ("urgency", &self.urgency),
      ("location", &self.location),
      ("contactName", &self.contact_name),
      ("contactPhone", &self.contact_phone),
      ("description", &self.description),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
  }

  /// Trim every field, lowercase the urgency and drop a blank email
  pub fn normalized(self) -> Self {
    Self {
      animal_type: self.animal_type.trim().to_string(),
      urgency: self.urgency.trim().to_lowercase(),
      location: self.location.trim().to_string(),
      contact_name: self.contact_name.trim().to_string(),
      contact_phone: self.contact_phone.trim().to_string(),
      contact_email: non_blank(self.contact_email),
      description: self.description.trim().to_string(),
    }
  }

  /// Build a fresh pending request
  pub fn into_request(self, id: String, timestamp: DateTime<Utc>) -> Request {
    Request {
      id,
      animal_type: self.animal_type,
      urgency: self.urgency,
      location: self.location,
      contact_name: self.contact_name,
      contact_phone: self.contact_phone,
      contact_email: self.contact_email,
      description: self.description,
      status: Status::Pending,
      helper: None,
      timestamp,
      chat_messages: Vec::new(),
      chat_room_id: None,
    }
  }
}

/// Backend role of the logged-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  User,
  Volunteer,
  Admin,
}

impl Role {
  pub fn from_remote(s: &str) -> Self {
    match s.trim().to_uppercase().as_str() {
      "VOLUNTEER" => Role::Volunteer,
      "ADMIN" => Role::Admin,
      _ => Role::User,
    }
  }

  /// Whether the backend lets this role be assigned to requests
  pub fn can_volunteer(&self) -> bool {
    matches!(self, Role::Volunteer | Role::Admin)
  }
}

/// Authenticated backend session, held in memory only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub token: String,
  pub user_id: u64,
  pub username: String,
  pub full_name: Option<String>,
  pub email: Option<String>,
  pub role: Role,
}

impl Session {
  pub fn display_name(&self) -> &str {
    self
      .full_name
      .as_deref()
      .filter(|n| !n.is_empty())
      .unwrap_or(&self.username)
  }
}

/// Backend chat room attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRoom {
  pub id: u64,
}

/// A chat opened for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
  pub request_id: String,
  pub partner: String,
  pub room_id: Option<u64>,
  pub messages: Vec<ChatMessage>,
  /// Whether the messages came from the backend
  pub remote: bool,
}

/// Number of requests in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
  pub pending: usize,
  pub accepted: usize,
  pub completed: usize,
}

impl StatusCounts {
  pub fn tally<'a>(requests: impl IntoIterator<Item = &'a Request>) -> Self {
    let mut counts = Self::default();
    for request in requests {
      match request.status {
        Status::Pending => counts.pending += 1,
        Status::Accepted => counts.accepted += 1,
        Status::Completed => counts.completed += 1,
      }
    }
    counts
  }
}

/// Generate an id for a request created without the backend.
///
/// Format: `REQ-<unix millis>-<9 lowercase base36 chars>`. Backend ids never
/// carry this prefix.
pub fn local_request_id(now: DateTime<Utc>) -> String {
  const CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
  let mut rng = rand::thread_rng();
  let suffix: String = (0..9)
    .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
    .collect();
  format!("{}{}-{}", LOCAL_ID_PREFIX, now.timestamp_millis(), suffix)
}

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}
