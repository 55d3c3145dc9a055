use crate::config::ApiConfig;
use crate::rescue::api_types::{
  ApiChatMessage, ApiChatMessageBody, ApiChatRoom, ApiEmergencyRequest, ApiJwtResponse,
  ApiLoginRequest, ApiResponse, ApiSubmitRequest,
};
use crate::rescue::types::{ChatMessage, ChatRoom, NewRequest, Request, Session, Status};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Operations the sync coordinator needs from the backend.
///
/// Every failure (transport error, non-2xx status, `success=false`) comes back
/// as an `Err`; callers decide whether to fall back.
pub trait RemoteSource: Send + Sync {
  /// Liveness check
  fn health(&self) -> impl Future<Output = Result<()>> + Send;

  fn login(&self, username: &str, password: &str) -> impl Future<Output = Result<Session>> + Send;

  fn pending_requests(&self) -> impl Future<Output = Result<Vec<Request>>> + Send;

  fn requests_by_status(&self, status: Status)
    -> impl Future<Output = Result<Vec<Request>>> + Send;

  /// Create a request; works without a session
  fn submit(&self, fields: &NewRequest) -> impl Future<Output = Result<Request>> + Send;

  fn assign_volunteer(
    &self,
    request_id: &str,
    volunteer_id: u64,
  ) -> impl Future<Output = Result<Request>> + Send;

  fn update_status(
    &self,
    request_id: &str,
    status: Status,
  ) -> impl Future<Output = Result<Request>> + Send;

  fn chat_room(&self, request_id: &str) -> impl Future<Output = Result<ChatRoom>> + Send;

  fn create_chat_room(&self, request_id: &str) -> impl Future<Output = Result<ChatRoom>> + Send;

  fn chat_messages(&self, room_id: u64) -> impl Future<Output = Result<Vec<ChatMessage>>> + Send;

  fn send_chat_message(
    &self,
    room_id: u64,
    message: &str,
  ) -> impl Future<Output = Result<ChatMessage>> + Send;

  /// Set or clear the bearer token attached to authenticated calls
  fn set_token(&self, token: Option<String>);
}

/// HTTP client for the rescue backend
#[derive(Clone)]
pub struct RescueClient {
  http: reqwest::Client,
  base_url: Url,
  token: Arc<RwLock<Option<String>>>,
}

impl RescueClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("API url cannot be used as a base: {}", config.url));
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token: Arc::new(RwLock::new(None)),
    })
  }

  /// Build an endpoint url below the base path, percent-encoding each segment
  fn endpoint(&self, segments: &[&str]) -> Result<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| eyre!("API url cannot be used as a base: {}", self.base_url))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn token(&self) -> Option<String> {
    self.token.read().ok().and_then(|t| t.clone())
  }

  /// Send a request and unwrap the HTTP layer, returning the envelope
  async fn send<T: DeserializeOwned>(
    &self,
    method: Method,
    url: Url,
    body: Option<Value>,
  ) -> Result<ApiResponse<T>> {
    debug!(%method, %url, "api request");

    let mut request = self.http.request(method.clone(), url.clone());
    if let Some(token) = self.token() {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("{} {} failed: {}", method, url, e))?;

    let status = response.status();
    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?;

    if !status.is_success() {
      let message = serde_json::from_slice::<ApiResponse<Value>>(&bytes)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
      debug!(%url, status = status.as_u16(), %message, "api request rejected");
      return Err(eyre!(message));
    }

    serde_json::from_slice(&bytes).map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))
  }

  async fn get_requests(&self, segments: &[&str]) -> Result<Vec<Request>> {
    let url = self.endpoint(segments)?;
    let requests: Vec<ApiEmergencyRequest> = self.send(Method::GET, url, None).await?.into_data()?;
    Ok(requests.into_iter().map(|r| r.into_request()).collect())
  }

  async fn chat_room_request(&self, method: Method, request_id: &str) -> Result<ChatRoom> {
    let url = self.endpoint(&["chat", "room", "emergency", request_id])?;
    let room: ApiChatRoom = self.send(method, url, None).await?.into_data()?;
    Ok(room.into())
  }
}

impl RemoteSource for RescueClient {
  async fn health(&self) -> Result<()> {
    let url = self.endpoint(&["test", "health"])?;
    self.send::<Value>(Method::GET, url, None).await?.into_checked()?;
    Ok(())
  }

  async fn login(&self, username: &str, password: &str) -> Result<Session> {
    let url = self.endpoint(&["auth", "signin"])?;
    let body = serde_json::to_value(ApiLoginRequest { username, password })?;
    let jwt: ApiJwtResponse = self.send(Method::POST, url, Some(body)).await?.into_data()?;
    Ok(jwt.into())
  }

  async fn pending_requests(&self) -> Result<Vec<Request>> {
    self.get_requests(&["emergency", "pending"]).await
  }

  async fn requests_by_status(&self, status: Status) -> Result<Vec<Request>> {
    self
      .get_requests(&["emergency", "status", status.api_name()])
      .await
  }

  async fn submit(&self, fields: &NewRequest) -> Result<Request> {
    let url = self.endpoint(&["emergency", "submit"])?;
    let body = serde_json::to_value(ApiSubmitRequest::from(fields))?;
    let created: ApiEmergencyRequest = self.send(Method::POST, url, Some(body)).await?.into_data()?;
    Ok(created.into_request())
  }

  async fn assign_volunteer(&self, request_id: &str, volunteer_id: u64) -> Result<Request> {
    let volunteer = volunteer_id.to_string();
    let url = self.endpoint(&["emergency", request_id, "assign", &volunteer])?;
    let updated: ApiEmergencyRequest = self.send(Method::PUT, url, None).await?.into_data()?;
    Ok(updated.into_request())
  }

  async fn update_status(&self, request_id: &str, status: Status) -> Result<Request> {
    let mut url = self.endpoint(&["emergency", request_id, "status"])?;
    url
      .query_pairs_mut()
      .append_pair("status", status.api_name());
    let updated: ApiEmergencyRequest = self.send(Method::PUT, url, None).await?.into_data()?;
    Ok(updated.into_request())
  }

  async fn chat_room(&self, request_id: &str) -> Result<ChatRoom> {
    self.chat_room_request(Method::GET, request_id).await
  }

  async fn create_chat_room(&self, request_id: &str) -> Result<ChatRoom> {
    self.chat_room_request(Method::POST, request_id).await
  }

  async fn chat_messages(&self, room_id: u64) -> Result<Vec<ChatMessage>> {
    let room = room_id.to_string();
    let url = self.endpoint(&["chat", "room", &room, "messages"])?;
    let messages: Vec<ApiChatMessage> = self.send(Method::GET, url, None).await?.into_data()?;
    Ok(messages.into_iter().map(ChatMessage::from).collect())
  }

  async fn send_chat_message(&self, room_id: u64, message: &str) -> Result<ChatMessage> {
    let room = room_id.to_string();
    let url = self.endpoint(&["chat", "room", &room, "message"])?;
    let body = serde_json::to_value(ApiChatMessageBody { message })?;
    let sent: ApiChatMessage = self.send(Method::POST, url, Some(body)).await?.into_data()?;
    Ok(sent.into())
  }

  fn set_token(&self, token: Option<String>) {
    if let Ok(mut guard) = self.token.write() {
      *guard = token;
    }
  }
}
