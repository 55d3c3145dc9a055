//! Online/offline reconciliation of rescue requests.
//!
//! The coordinator owns the in-memory request list. Every mutation is routed to
//! the backend when connected and falls back to a local-only change otherwise;
//! either way the whole list is written through to the cache afterwards.

use chrono::{Duration as ChronoDuration, Utc};
use color_eyre::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{merge_by_key, CacheLayer, CacheSource, CacheStorage};

use super::cache::REQUESTS_KEY;
use super::client::RemoteSource;
use super::error::SyncError;
use super::types::{
  local_request_id, ChatMessage, ChatSession, Helper, NewRequest, Request, Sender, Session,
  Status, StatusCounts,
};

/// Id of the demonstration record seeded into an empty cache
pub const SAMPLE_REQUEST_ID: &str = "REQ-SAMPLE-001";

/// Whether remote calls are attempted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
  Connected,
  #[default]
  Disconnected,
}

impl Mode {
  pub fn is_connected(&self) -> bool {
    matches!(self, Mode::Connected)
  }
}

/// Which path a mutation took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPath {
  Remote,
  Local,
}

/// Result of a mutation, tagged with the path that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
  pub value: T,
  pub path: SyncPath,
}

/// Summary of a load or re-sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
  pub source: CacheSource,
  /// Whether the demonstration record was seeded
  pub seeded: bool,
  pub count: usize,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
  pub probe_timeout: Duration,
  /// Skip the probe and stay disconnected
  pub offline: bool,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      probe_timeout: Duration::from_secs(5),
      offline: false,
    }
  }
}

pub struct SyncCoordinator<R: RemoteSource, S: CacheStorage> {
  remote: R,
  cache: CacheLayer<S>,
  records: Vec<Request>,
  mode: Mode,
  session: Option<Session>,
  source: Option<CacheSource>,
  options: SyncOptions,
}

impl<R: RemoteSource, S: CacheStorage> SyncCoordinator<R, S> {
  pub fn new(remote: R, storage: S, options: SyncOptions) -> Self {
    Self {
      remote,
      cache: CacheLayer::new(storage),
      records: Vec::new(),
      mode: Mode::Disconnected,
      session: None,
      source: None,
      options,
    }
  }

  // ==========================================================================
  // Loading
  // ==========================================================================

  /// Probe the backend, then build the in-memory list from remote and cached
  /// records.
  pub async fn load(&mut self) -> LoadReport {
    let mode = if self.options.offline {
      Mode::Disconnected
    } else {
      self.probe().await
    };
    self.set_mode(mode);
    self.sync_records().await
  }

  async fn probe(&self) -> Mode {
    match tokio::time::timeout(self.options.probe_timeout, self.remote.health()).await {
      Ok(Ok(())) => Mode::Connected,
      Ok(Err(e)) => {
        warn!(error = %e, "backend health check failed");
        Mode::Disconnected
      }
      Err(_) => {
        warn!(timeout = ?self.options.probe_timeout, "backend health check timed out");
        Mode::Disconnected
      }
    }
  }

  fn set_mode(&mut self, mode: Mode) {
    if self.mode != mode {
      info!(?mode, "connection mode changed");
    }
    self.mode = mode;
  }

  async fn sync_records(&mut self) -> LoadReport {
    let report = self.reconcile().await;
    self.source = Some(report.source);
    report
  }

  async fn reconcile(&mut self) -> LoadReport {
    if self.mode.is_connected() {
      match self.fetch_remote().await {
        Some(remote) if !remote.is_empty() => {
          let local: Vec<Request> = self.cache.load(REQUESTS_KEY);
          let remote_count = remote.len();
          self.records = merge_by_key(remote, local);
          self.persist();
          info!(
            remote = remote_count,
            total = self.records.len(),
            "merged remote requests with cache"
          );
          return LoadReport {
            source: CacheSource::Network,
            seeded: false,
            count: self.records.len(),
          };
        }
        Some(_) => debug!("backend returned no requests, using cache"),
        None => {}
      }
    }
    self.load_local()
  }

  /// Pending then accepted requests. `None` when the pending fetch failed.
  async fn fetch_remote(&self) -> Option<Vec<Request>> {
    let mut remote = match self.remote.pending_requests().await {
      Ok(requests) => requests,
      Err(e) => {
        warn!(error = %e, "failed to fetch pending requests");
        return None;
      }
    };

    match self.remote.requests_by_status(Status::Accepted).await {
      Ok(accepted) => remote.extend(accepted),
      Err(e) => warn!(error = %e, "failed to fetch accepted requests"),
    }

    Some(remote)
  }

  fn load_local(&mut self) -> LoadReport {
    let source = if self.mode.is_connected() {
      CacheSource::Cache
    } else {
      CacheSource::Offline
    };

    self.records = self.cache.load(REQUESTS_KEY);
    let seeded = self.records.is_empty();
    if seeded {
      self.records.push(sample_request());
      info!("seeded empty cache with sample request");
    }
    self.persist();

    LoadReport {
      source,
      seeded,
      count: self.records.len(),
    }
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  /// Create a new pending request at the head of the list
  pub async fn submit(&mut self, fields: NewRequest) -> Result<Synced<Request>, SyncError> {
    if let Some(field) = fields.first_missing() {
      return Err(SyncError::Validation { field });
    }
    let fields = fields.normalized();

    let created = if self.mode.is_connected() {
      match self.remote.submit(&fields).await {
        Ok(created) => Some(created),
        Err(e) => {
          warn!(error = %e, "remote submit failed, storing locally");
          None
        }
      }
    } else {
      None
    };

    let (request, path) = match created {
      Some(created) => (
        fields.into_request(created.id, created.timestamp),
        SyncPath::Remote,
      ),
      None => {
        let now = Utc::now();
        (fields.into_request(local_request_id(now), now), SyncPath::Local)
      }
    };

    self.records.retain(|r| r.id != request.id);
    self.records.insert(0, request.clone());
    self.persist();
    info!(id = %request.id, ?path, "request submitted");

    Ok(Synced {
      value: request,
      path,
    })
  }

  /// Mark a pending request as accepted by `helper`
  pub async fn accept(&mut self, id: &str, helper: Helper) -> Result<Synced<Request>, SyncError> {
    let index = self.index_of(id)?;
    if self.records[index].status != Status::Pending {
      return Err(SyncError::AlreadyAccepted(id.to_string()));
    }

    let helper = helper.normalized();
    if helper.name.is_empty() {
      return Err(SyncError::Validation {
        field: "helperName",
      });
    }
    if helper.phone.is_empty() {
      return Err(SyncError::Validation {
        field: "helperPhone",
      });
    }

    let assigned = match self.volunteer_id() {
      Some(user_id) => match self.remote.assign_volunteer(id, user_id).await {
        Ok(_) => Some(user_id),
        Err(e) => {
          warn!(id, error = %e, "remote accept failed, accepting locally");
          None
        }
      },
      None => None,
    };

    let record = &mut self.records[index];
    record.status = Status::Accepted;
    let path = match assigned {
      Some(user_id) => {
        record.helper = Some(Helper {
          remote_id: Some(user_id),
          ..helper
        });
        SyncPath::Remote
      }
      None => {
        record.chat_messages.push(ChatMessage::new(
          Sender::System,
          format!(
            "{} has accepted this rescue request and will be in touch soon.",
            helper.name
          ),
          Utc::now(),
        ));
        record.helper = Some(helper);
        SyncPath::Local
      }
    };
    let value = record.clone();

    self.persist();
    info!(id, ?path, "request accepted");
    Ok(Synced { value, path })
  }

  /// Mark an accepted request as completed. Backend only.
  pub async fn complete(&mut self, id: &str) -> Result<Request, SyncError> {
    let index = self.index_of(id)?;
    let status = self.records[index].status;
    if status != Status::Accepted {
      return Err(SyncError::InvalidTransition {
        id: id.to_string(),
        status,
      });
    }
    if !self.mode.is_connected() {
      return Err(SyncError::RequiresConnection);
    }

    self
      .remote
      .update_status(id, Status::Completed)
      .await
      .map_err(|e| {
        warn!(id, error = %e, "remote complete failed");
        SyncError::Connectivity(e.to_string())
      })?;

    let record = &mut self.records[index];
    record.status = Status::Completed;
    let value = record.clone();

    self.persist();
    info!(id, "request completed");
    Ok(value)
  }

  /// Append a chat message. Blank text is ignored and returns `None`.
  pub async fn send_message(
    &mut self,
    id: &str,
    text: &str,
  ) -> Result<Option<Synced<ChatMessage>>, SyncError> {
    let text = text.trim();
    if text.is_empty() {
      return Ok(None);
    }
    let index = self.index_of(id)?;

    let room_id = self.records[index]
      .chat_room_id
      .filter(|_| self.mode.is_connected() && self.session.is_some());

    let sent = match room_id {
      Some(room_id) => match self.remote.send_chat_message(room_id, text).await {
        Ok(message) => Some(message),
        Err(e) => {
          warn!(id, room_id, error = %e, "remote message failed, storing locally");
          None
        }
      },
      None => None,
    };

    let (message, path) = match sent {
      Some(message) => (message, SyncPath::Remote),
      None => (
        ChatMessage::new(Sender::User, text, Utc::now()),
        SyncPath::Local,
      ),
    };

    self.records[index].chat_messages.push(message.clone());
    self.persist();
    debug!(id, ?path, "chat message stored");

    Ok(Some(Synced {
      value: message,
      path,
    }))
  }

  /// Load the conversation for a request.
  ///
  /// When connected this requires a session. The backend's messages then lead,
  /// and stored messages the backend does not have (e.g. written before the
  /// room existed) are kept in timestamp order. Any backend failure falls back
  /// to the stored messages.
  pub async fn open_chat(&mut self, id: &str) -> Result<ChatSession, SyncError> {
    let index = self.index_of(id)?;

    if self.mode.is_connected() {
      if self.session.is_none() {
        return Err(SyncError::LoginRequired);
      }

      match self.fetch_chat(id, self.records[index].chat_room_id).await {
        Ok((room_id, messages)) => {
          let record = &mut self.records[index];
          record.chat_room_id = Some(room_id);
          let stored = std::mem::take(&mut record.chat_messages);
          record.chat_messages = merge_messages(messages, stored);
          let session = chat_session(record, true);
          self.persist();
          return Ok(session);
        }
        Err(e) => warn!(id, error = %e, "failed to load remote chat, using stored messages"),
      }
    }

    Ok(chat_session(&self.records[index], false))
  }

  async fn fetch_chat(&self, id: &str, known_room: Option<u64>) -> Result<(u64, Vec<ChatMessage>)> {
    let room_id = match known_room {
      Some(room_id) => room_id,
      None => match self.remote.chat_room(id).await {
        Ok(room) => room.id,
        Err(e) => {
          debug!(id, error = %e, "no chat room yet, creating one");
          self.remote.create_chat_room(id).await?.id
        }
      },
    };

    let messages = self.remote.chat_messages(room_id).await?;
    Ok((room_id, messages))
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  /// Sign in and reload from the backend
  pub async fn login(&mut self, username: &str, password: &str) -> Result<LoadReport, SyncError> {
    let session = self.remote.login(username, password).await.map_err(|e| {
      warn!(username, error = %e, "login failed");
      SyncError::Connectivity(e.to_string())
    })?;

    self.remote.set_token(Some(session.token.clone()));
    info!(username = %session.username, role = ?session.role, "logged in");
    self.session = Some(session);
    self.set_mode(Mode::Connected);

    Ok(self.sync_records().await)
  }

  pub fn logout(&mut self) {
    if let Some(session) = self.session.take() {
      info!(username = %session.username, "logged out");
    }
    self.remote.set_token(None);
  }

  // ==========================================================================
  // Accessors
  // ==========================================================================

  /// Records in insertion order
  pub fn records(&self) -> &[Request] {
    &self.records
  }

  /// Records newest first; equal timestamps keep insertion order
  pub fn sorted_records(&self) -> Vec<Request> {
    let mut sorted = self.records().to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
  }

  pub fn counts(&self) -> StatusCounts {
    StatusCounts::tally(&self.records)
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn session(&self) -> Option<&Session> {
    self.session.as_ref()
  }

  /// Where the records came from on the last load
  pub fn source(&self) -> Option<CacheSource> {
    self.source
  }

  fn index_of(&self, id: &str) -> Result<usize, SyncError> {
    self
      .records
      .iter()
      .position(|r| r.id == id)
      .ok_or_else(|| SyncError::NotFound(id.to_string()))
  }

  /// Session user id, if the backend would accept an assignment to them
  fn volunteer_id(&self) -> Option<u64> {
    if !self.mode.is_connected() {
      return None;
    }
    self
      .session
      .as_ref()
      .filter(|s| s.role.can_volunteer())
      .map(|s| s.user_id)
  }

  fn persist(&self) {
    self.cache.write_through(REQUESTS_KEY, &self.records);
  }
}

/// Remote messages plus stored ones missing from them, oldest first
fn merge_messages(remote: Vec<ChatMessage>, stored: Vec<ChatMessage>) -> Vec<ChatMessage> {
  let kept: Vec<ChatMessage> = stored
    .into_iter()
    .filter(|m| !remote.contains(m))
    .collect();
  if !kept.is_empty() {
    debug!(count = kept.len(), "keeping stored messages missing from the backend");
  }

  let mut merged = remote;
  merged.extend(kept);
  merged.sort_by_key(|m| m.timestamp);
  merged
}

fn chat_session(record: &Request, remote: bool) -> ChatSession {
  ChatSession {
    request_id: record.id.clone(),
    partner: record.chat_partner().to_string(),
    room_id: record.chat_room_id,
    messages: record.chat_messages.clone(),
    remote,
  }
}

fn sample_request() -> Request {
  NewRequest {
    animal_type: "dog".to_string(),
    urgency: "critical".to_string(),
    location: "Near Central Park, Bhopal - Behind the main gate".to_string(),
    contact_name: "Priya Sharma".to_string(),
    contact_phone: "+91-98765-43210".to_string(),
    contact_email: Some("priya.sharma@email.com".to_string()),
    description: "Found an injured stray dog with a broken leg. The dog appears to be in \
                  severe pain and needs immediate medical attention."
      .to_string(),
  }
  .into_request(
    SAMPLE_REQUEST_ID.to_string(),
    Utc::now() - ChronoDuration::hours(2),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CachedList, Cacheable, MemoryStorage};
  use crate::rescue::types::{ChatRoom, Role};
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  // ==========================================================================
  // Fakes
  // ==========================================================================

  #[derive(Default)]
  struct FakeState {
    healthy: bool,
    hang_health: bool,
    pending: Vec<Request>,
    accepted: Vec<Request>,
    fail_lists: bool,
    fail_mutations: bool,
    room: Option<u64>,
    messages: Vec<ChatMessage>,
    token: Option<String>,
    calls: Vec<String>,
  }

  #[derive(Clone, Default)]
  struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
  }

  impl FakeRemote {
    fn online() -> Self {
      let remote = Self::default();
      remote.state.lock().unwrap().healthy = true;
      remote
    }

    fn offline() -> Self {
      Self::default()
    }

    fn with<F: FnOnce(&mut FakeState)>(self, f: F) -> Self {
      f(&mut *self.state.lock().unwrap());
      self
    }

    fn calls(&self) -> Vec<String> {
      self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: impl Into<String>) -> std::sync::MutexGuard<'_, FakeState> {
      let mut state = self.state.lock().unwrap();
      state.calls.push(call.into());
      state
    }
  }

  impl RemoteSource for FakeRemote {
    async fn health(&self) -> Result<()> {
      let (healthy, hang) = {
        let state = self.record("health");
        (state.healthy, state.hang_health)
      };
      if hang {
        std::future::pending::<()>().await;
      }
      if healthy {
        Ok(())
      } else {
        Err(eyre!("connection refused"))
      }
    }

    async fn login(&self, username: &str, password: &str) -> Result<Session> {
      let _state = self.record("login");
      if password != "secret" {
        return Err(eyre!("Invalid credentials"));
      }
      Ok(Session {
        token: "jwt".to_string(),
        user_id: 7,
        username: username.to_string(),
        full_name: Some("Asha Rao".to_string()),
        email: None,
        role: Role::Volunteer,
      })
    }

    async fn pending_requests(&self) -> Result<Vec<Request>> {
      let state = self.record("pending");
      if state.fail_lists {
        return Err(eyre!("HTTP 500"));
      }
      Ok(state.pending.clone())
    }

    async fn requests_by_status(&self, status: Status) -> Result<Vec<Request>> {
      let state = self.record(format!("status:{}", status));
      if state.fail_lists {
        return Err(eyre!("HTTP 500"));
      }
      Ok(state.accepted.clone())
    }

    async fn submit(&self, fields: &NewRequest) -> Result<Request> {
      let state = self.record("submit");
      if state.fail_mutations {
        return Err(eyre!("HTTP 500"));
      }
      Ok(
        fields
          .clone()
          .into_request("srv-1".to_string(), Utc::now()),
      )
    }

    async fn assign_volunteer(&self, request_id: &str, volunteer_id: u64) -> Result<Request> {
      let state = self.record(format!("assign:{}:{}", request_id, volunteer_id));
      if state.fail_mutations {
        return Err(eyre!("HTTP 500"));
      }
      Ok(remote_request(request_id, Status::Accepted))
    }

    async fn update_status(&self, request_id: &str, status: Status) -> Result<Request> {
      let state = self.record(format!("status-update:{}", request_id));
      if state.fail_mutations {
        return Err(eyre!("Request not found"));
      }
      Ok(remote_request(request_id, status))
    }

    async fn chat_room(&self, request_id: &str) -> Result<ChatRoom> {
      let state = self.record(format!("room:{}", request_id));
      state
        .room
        .map(|id| ChatRoom { id })
        .ok_or_else(|| eyre!("Chat room not found"))
    }

    async fn create_chat_room(&self, request_id: &str) -> Result<ChatRoom> {
      let mut state = self.record(format!("create-room:{}", request_id));
      if state.fail_mutations {
        return Err(eyre!("HTTP 500"));
      }
      state.room = Some(11);
      Ok(ChatRoom { id: 11 })
    }

    async fn chat_messages(&self, room_id: u64) -> Result<Vec<ChatMessage>> {
      let state = self.record(format!("messages:{}", room_id));
      Ok(state.messages.clone())
    }

    async fn send_chat_message(&self, room_id: u64, message: &str) -> Result<ChatMessage> {
      let state = self.record(format!("send:{}", room_id));
      if state.fail_mutations {
        return Err(eyre!("HTTP 500"));
      }
      Ok(ChatMessage::new(
        Sender::Party("volunteer".to_string()),
        message,
        Utc::now(),
      ))
    }

    fn set_token(&self, token: Option<String>) {
      self.state.lock().unwrap().token = token;
    }
  }

  /// Memory storage that counts writes and stays readable from the test
  #[derive(Clone, Default)]
  struct SharedStorage {
    inner: Arc<MemoryStorage>,
    writes: Arc<AtomicUsize>,
  }

  impl SharedStorage {
    fn with_requests(requests: &[Request]) -> Self {
      let storage = Self::default();
      storage.inner.store_list(REQUESTS_KEY, requests).unwrap();
      storage
    }

    fn writes(&self) -> usize {
      self.writes.load(Ordering::SeqCst)
    }

    fn ids(&self) -> Vec<String> {
      self
        .inner
        .get_list::<Request>(REQUESTS_KEY)
        .unwrap()
        .map(|list| list.entities.into_iter().map(|r| r.id).collect())
        .unwrap_or_default()
    }
  }

  impl CacheStorage for SharedStorage {
    fn store_list<T: Cacheable>(&self, key: &str, entities: &[T]) -> Result<()> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      self.inner.store_list(key, entities)
    }

    fn get_list<T: Cacheable>(&self, key: &str) -> Result<Option<CachedList<T>>> {
      self.inner.get_list(key)
    }
  }

  fn fields() -> NewRequest {
    NewRequest {
      animal_type: "cat".to_string(),
      urgency: "High".to_string(),
      location: "Sector 15".to_string(),
      contact_name: "Rahul".to_string(),
      contact_phone: "+91-87654-32109".to_string(),
      contact_email: None,
      description: "Kitten stuck on a tree".to_string(),
    }
  }

  fn remote_request(id: &str, status: Status) -> Request {
    let mut request = fields().normalized().into_request(id.to_string(), Utc::now());
    request.status = status;
    if status != Status::Pending {
      request.helper = Some(Helper::new("Volunteer", "", None));
    }
    request
  }

  fn local_request(id: &str, status: Status) -> Request {
    let mut request = remote_request(id, status);
    request.description = "cached copy".to_string();
    request
  }

  fn helper() -> Helper {
    Helper::new("Dr. Amit", "+91-99887-76543", None)
  }

  async fn loaded(
    remote: FakeRemote,
    storage: SharedStorage,
  ) -> SyncCoordinator<FakeRemote, SharedStorage> {
    let mut sync = SyncCoordinator::new(remote, storage, SyncOptions::default());
    sync.load().await;
    sync
  }

  fn find<'a>(sync: &'a SyncCoordinator<FakeRemote, SharedStorage>, id: &str) -> Option<&'a Request> {
    sync.records().iter().find(|r| r.id == id)
  }

  // ==========================================================================
  // Loading
  // ==========================================================================

  #[tokio::test]
  async fn test_connected_load_merges_remote_and_local() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let storage = SharedStorage::with_requests(&[local_request("L1", Status::Pending)]);

    let mut sync = SyncCoordinator::new(remote, storage.clone(), SyncOptions::default());
    let report = sync.load().await;

    assert_eq!(report.source, CacheSource::Network);
    assert_eq!(sync.mode(), Mode::Connected);
    let ids: Vec<&str> = sync.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["R1", "L1"]);
    assert_eq!(storage.ids(), vec!["R1", "L1"]);
  }

  #[tokio::test]
  async fn test_remote_fields_win_on_shared_id() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let storage = SharedStorage::with_requests(&[local_request("R1", Status::Pending)]);

    let sync = loaded(remote, storage).await;
    assert_eq!(sync.records().len(), 1);
    assert_eq!(sync.records()[0].description, "Kitten stuck on a tree");
  }

  #[tokio::test]
  async fn test_reload_is_idempotent() {
    let remote = FakeRemote::online().with(|s| {
      s.pending = vec![remote_request("R1", Status::Pending)];
      s.accepted = vec![remote_request("R2", Status::Accepted)];
    });
    let storage = SharedStorage::with_requests(&[local_request("L1", Status::Pending)]);

    let mut sync = loaded(remote, storage).await;
    let first = sync.records().to_vec();
    sync.load().await;
    assert_eq!(sync.records(), first.as_slice());
  }

  #[tokio::test]
  async fn test_disconnected_empty_cache_seeds_sample() {
    let storage = SharedStorage::default();
    let mut sync = SyncCoordinator::new(FakeRemote::offline(), storage.clone(), SyncOptions::default());
    let report = sync.load().await;

    assert_eq!(report.source, CacheSource::Offline);
    assert!(report.seeded);
    assert_eq!(sync.mode(), Mode::Disconnected);
    assert_eq!(sync.records().len(), 1);
    assert_eq!(sync.records()[0].id, SAMPLE_REQUEST_ID);
    assert_eq!(sync.records()[0].status, Status::Pending);
    assert_eq!(storage.ids(), vec![SAMPLE_REQUEST_ID]);
  }

  #[tokio::test]
  async fn test_disconnected_uses_cache_without_remote_lists() {
    let remote = FakeRemote::offline();
    let storage = SharedStorage::with_requests(&[local_request("L1", Status::Pending)]);
    let sync = loaded(remote.clone(), storage).await;

    assert_eq!(sync.records()[0].id, "L1");
    assert_eq!(remote.calls(), vec!["health"]);
  }

  #[tokio::test]
  async fn test_offline_option_skips_probe() {
    let remote = FakeRemote::online();
    let options = SyncOptions {
      offline: true,
      ..SyncOptions::default()
    };
    let mut sync = SyncCoordinator::new(remote.clone(), SharedStorage::default(), options);
    sync.load().await;

    assert_eq!(sync.mode(), Mode::Disconnected);
    assert!(remote.calls().is_empty());
  }

  #[tokio::test]
  async fn test_probe_times_out() {
    let remote = FakeRemote::online().with(|s| s.hang_health = true);
    let options = SyncOptions {
      probe_timeout: Duration::from_millis(20),
      offline: false,
    };
    let mut sync = SyncCoordinator::new(remote, SharedStorage::default(), options);
    let report = sync.load().await;

    assert_eq!(sync.mode(), Mode::Disconnected);
    assert_eq!(report.source, CacheSource::Offline);
  }

  #[tokio::test]
  async fn test_connected_with_failing_lists_uses_cache() {
    let remote = FakeRemote::online().with(|s| s.fail_lists = true);
    let storage = SharedStorage::with_requests(&[local_request("L1", Status::Pending)]);
    let mut sync = SyncCoordinator::new(remote, storage, SyncOptions::default());
    let report = sync.load().await;

    assert_eq!(report.source, CacheSource::Cache);
    assert_eq!(sync.mode(), Mode::Connected);
    assert_eq!(sync.records()[0].id, "L1");
  }

  #[tokio::test]
  async fn test_connected_empty_lists_with_empty_cache_seeds_sample() {
    let storage = SharedStorage::default();
    let mut sync = SyncCoordinator::new(FakeRemote::online(), storage.clone(), SyncOptions::default());
    let report = sync.load().await;

    assert_eq!(report.source, CacheSource::Cache);
    assert!(report.seeded);
    assert_eq!(sync.mode(), Mode::Connected);
    assert_eq!(sync.records().len(), 1);
    assert_eq!(sync.records()[0].id, SAMPLE_REQUEST_ID);
    assert_eq!(storage.ids(), vec![SAMPLE_REQUEST_ID]);
  }

  #[tokio::test]
  async fn test_connected_empty_lists_keep_cache_verbatim() {
    let cached = vec![
      local_request("L1", Status::Pending),
      local_request("L2", Status::Accepted),
    ];
    let storage = SharedStorage::with_requests(&cached);
    let mut sync = SyncCoordinator::new(FakeRemote::online(), storage.clone(), SyncOptions::default());
    let report = sync.load().await;

    assert_eq!(report.source, CacheSource::Cache);
    assert!(!report.seeded);
    assert_eq!(sync.mode(), Mode::Connected);
    assert_eq!(sync.records(), cached.as_slice());
    assert_eq!(storage.writes(), 1);
    assert_eq!(storage.ids(), vec!["L1", "L2"]);
  }

  #[tokio::test]
  async fn test_malformed_cached_record_does_not_lose_the_rest() {
    let storage = SharedStorage::default();
    let good = serde_json::to_value(local_request("L1", Status::Pending)).unwrap();
    let raw = serde_json::json!([good, { "id": "broken" }]);
    storage.inner.insert_raw(REQUESTS_KEY, raw.to_string().as_bytes());

    let mut sync = SyncCoordinator::new(FakeRemote::offline(), storage.clone(), SyncOptions::default());
    let report = sync.load().await;

    assert!(!report.seeded);
    assert_eq!(storage.ids(), vec!["L1"]);
    assert_eq!(sync.records().len(), 1);
  }

  #[tokio::test]
  async fn test_unreadable_cache_is_not_replaced_by_seed() {
    let storage = SharedStorage::default();
    storage.inner.insert_raw(REQUESTS_KEY, b"{truncated");

    let mut sync = SyncCoordinator::new(FakeRemote::offline(), storage.clone(), SyncOptions::default());
    sync.load().await;
    sync.submit(fields()).await.unwrap();

    assert_eq!(storage.writes(), 0);
    assert!(storage.inner.get_list::<Request>(REQUESTS_KEY).is_err());
  }

  #[tokio::test]
  async fn test_sorted_records_newest_first() {
    let mut old = local_request("OLD", Status::Pending);
    old.timestamp = Utc::now() - ChronoDuration::days(1);
    let storage = SharedStorage::with_requests(&[old, local_request("NEW", Status::Pending)]);
    let sync = loaded(FakeRemote::offline(), storage).await;

    let sorted: Vec<String> = sync.sorted_records().into_iter().map(|r| r.id).collect();
    assert_eq!(sorted, vec!["NEW", "OLD"]);
    assert_eq!(sync.records()[0].id, "OLD");
  }

  // ==========================================================================
  // Submit
  // ==========================================================================

  #[tokio::test]
  async fn test_submit_offline_prepends_local_record() {
    let mut earlier = local_request("L1", Status::Pending);
    earlier.timestamp = Utc::now() - ChronoDuration::minutes(5);
    let storage = SharedStorage::with_requests(&[earlier]);
    let mut sync = loaded(FakeRemote::offline(), storage.clone()).await;

    let created = sync.submit(fields()).await.unwrap();
    assert_eq!(created.path, SyncPath::Local);
    assert!(created.value.is_local());
    assert_eq!(created.value.urgency, "high");
    assert_eq!(created.value.status, Status::Pending);
    assert_eq!(sync.records()[0].id, created.value.id);
    assert_eq!(storage.ids(), vec![created.value.id.clone(), "L1".to_string()]);

    let sorted: Vec<String> = sync.sorted_records().into_iter().map(|r| r.id).collect();
    assert_eq!(sorted, vec![created.value.id.clone(), "L1".to_string()]);
    assert!(created.value.timestamp > sync.sorted_records()[1].timestamp);
  }

  #[tokio::test]
  async fn test_submit_connected_uses_server_id() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let mut sync = loaded(remote, SharedStorage::default()).await;

    let created = sync.submit(fields()).await.unwrap();
    assert_eq!(created.path, SyncPath::Remote);
    assert_eq!(created.value.id, "srv-1");
    assert_eq!(sync.records()[0].id, "srv-1");
  }

  #[tokio::test]
  async fn test_submit_falls_back_when_remote_fails() {
    let remote = FakeRemote::online().with(|s| {
      s.pending = vec![remote_request("R1", Status::Pending)];
      s.fail_mutations = true;
    });
    let mut sync = loaded(remote, SharedStorage::default()).await;

    let created = sync.submit(fields()).await.unwrap();
    assert_eq!(created.path, SyncPath::Local);
    assert!(created.value.is_local());
  }

  #[tokio::test]
  async fn test_submit_validation_reports_first_missing() {
    let storage = SharedStorage::default();
    let mut sync = loaded(FakeRemote::offline(), storage.clone()).await;
    let writes = storage.writes();

    let mut missing = fields();
    missing.contact_phone = "  ".to_string();
    let err = sync.submit(missing).await.unwrap_err();

    assert_eq!(
      err,
      SyncError::Validation {
        field: "contactPhone"
      }
    );
    assert_eq!(sync.records().len(), 1);
    assert_eq!(storage.writes(), writes);
  }

  // ==========================================================================
  // Accept
  // ==========================================================================

  #[tokio::test]
  async fn test_accept_offline_adds_system_message() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;

    let accepted = sync.accept(SAMPLE_REQUEST_ID, helper()).await.unwrap();
    assert_eq!(accepted.path, SyncPath::Local);
    assert_eq!(accepted.value.status, Status::Accepted);
    assert_eq!(accepted.value.helper.as_ref().unwrap().name, "Dr. Amit");

    let message = accepted.value.chat_messages.last().unwrap();
    assert_eq!(message.sender, Sender::System);
    assert_eq!(
      message.message,
      "Dr. Amit has accepted this rescue request and will be in touch soon."
    );
  }

  #[tokio::test]
  async fn test_accept_twice_fails_and_leaves_record() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    sync.accept(SAMPLE_REQUEST_ID, helper()).await.unwrap();
    let before = find(&sync, SAMPLE_REQUEST_ID).cloned();

    let err = sync
      .accept(SAMPLE_REQUEST_ID, Helper::new("Other", "1", None))
      .await
      .unwrap_err();
    assert_eq!(err, SyncError::AlreadyAccepted(SAMPLE_REQUEST_ID.to_string()));
    assert_eq!(find(&sync, SAMPLE_REQUEST_ID).cloned(), before);
  }

  #[tokio::test]
  async fn test_accept_requires_helper_fields() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    let err = sync
      .accept(SAMPLE_REQUEST_ID, Helper::new("Dr. Amit", " ", None))
      .await
      .unwrap_err();
    assert_eq!(
      err,
      SyncError::Validation {
        field: "helperPhone"
      }
    );
    assert_eq!(find(&sync, SAMPLE_REQUEST_ID).unwrap().status, Status::Pending);
  }

  #[tokio::test]
  async fn test_accept_unknown_id() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    let err = sync.accept("nope", helper()).await.unwrap_err();
    assert_eq!(err, SyncError::NotFound("nope".to_string()));
  }

  #[tokio::test]
  async fn test_accept_connected_volunteer_assigns_remotely() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let mut sync = loaded(remote.clone(), SharedStorage::default()).await;
    sync.login("asha", "secret").await.unwrap();

    let accepted = sync.accept("R1", helper()).await.unwrap();
    assert_eq!(accepted.path, SyncPath::Remote);
    assert_eq!(accepted.value.helper.unwrap().remote_id, Some(7));
    assert!(accepted.value.chat_messages.is_empty());
    assert!(remote.calls().contains(&"assign:R1:7".to_string()));
  }

  #[tokio::test]
  async fn test_accept_connected_without_session_is_local() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let mut sync = loaded(remote.clone(), SharedStorage::default()).await;

    let accepted = sync.accept("R1", helper()).await.unwrap();
    assert_eq!(accepted.path, SyncPath::Local);
    assert!(!remote.calls().iter().any(|c| c.starts_with("assign")));
  }

  // ==========================================================================
  // Complete
  // ==========================================================================

  #[tokio::test]
  async fn test_complete_requires_connection() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    sync.accept(SAMPLE_REQUEST_ID, helper()).await.unwrap();

    let err = sync.complete(SAMPLE_REQUEST_ID).await.unwrap_err();
    assert_eq!(err, SyncError::RequiresConnection);
    assert_eq!(find(&sync, SAMPLE_REQUEST_ID).unwrap().status, Status::Accepted);
  }

  #[tokio::test]
  async fn test_complete_pending_is_invalid() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    let err = sync.complete(SAMPLE_REQUEST_ID).await.unwrap_err();
    assert_eq!(
      err,
      SyncError::InvalidTransition {
        id: SAMPLE_REQUEST_ID.to_string(),
        status: Status::Pending
      }
    );
  }

  #[tokio::test]
  async fn test_complete_connected_marks_completed() {
    let remote = FakeRemote::online().with(|s| s.accepted = vec![remote_request("R2", Status::Accepted)]);
    let storage = SharedStorage::default();
    let mut sync = loaded(remote, storage.clone()).await;

    let done = sync.complete("R2").await.unwrap();
    assert_eq!(done.status, Status::Completed);
    assert_eq!(sync.counts().completed, 1);

    let cached = storage.inner.get_list::<Request>(REQUESTS_KEY).unwrap().unwrap();
    assert_eq!(cached.entities[0].status, Status::Completed);
  }

  #[tokio::test]
  async fn test_complete_remote_failure_is_surfaced() {
    let remote = FakeRemote::online().with(|s| {
      s.accepted = vec![remote_request("R2", Status::Accepted)];
      s.fail_mutations = true;
    });
    let mut sync = loaded(remote, SharedStorage::default()).await;

    let err = sync.complete("R2").await.unwrap_err();
    assert_eq!(err, SyncError::Connectivity("Request not found".to_string()));
    assert_eq!(find(&sync, "R2").unwrap().status, Status::Accepted);
  }

  // ==========================================================================
  // Chat
  // ==========================================================================

  #[tokio::test]
  async fn test_blank_message_is_noop() {
    let storage = SharedStorage::default();
    let mut sync = loaded(FakeRemote::offline(), storage.clone()).await;
    let writes = storage.writes();

    assert_eq!(sync.send_message("X", "").await, Ok(None));
    assert_eq!(sync.send_message(SAMPLE_REQUEST_ID, "   ").await, Ok(None));
    assert!(find(&sync, SAMPLE_REQUEST_ID).unwrap().chat_messages.is_empty());
    assert_eq!(storage.writes(), writes);
  }

  #[tokio::test]
  async fn test_message_offline_is_tagged_user() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;

    let sent = sync
      .send_message(SAMPLE_REQUEST_ID, "  On my way ")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(sent.path, SyncPath::Local);
    assert_eq!(sent.value.sender, Sender::User);
    assert_eq!(sent.value.message, "On my way");
    assert_eq!(find(&sync, SAMPLE_REQUEST_ID).unwrap().chat_messages.len(), 1);
  }

  #[tokio::test]
  async fn test_message_unknown_id() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    let err = sync.send_message("X", "hello").await.unwrap_err();
    assert_eq!(err, SyncError::NotFound("X".to_string()));
  }

  #[tokio::test]
  async fn test_open_chat_connected_requires_login() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let mut sync = loaded(remote, SharedStorage::default()).await;

    assert_eq!(sync.open_chat("R1").await, Err(SyncError::LoginRequired));
  }

  #[tokio::test]
  async fn test_open_chat_offline_returns_stored_messages() {
    let mut sync = loaded(FakeRemote::offline(), SharedStorage::default()).await;
    sync.accept(SAMPLE_REQUEST_ID, helper()).await.unwrap();

    let chat = sync.open_chat(SAMPLE_REQUEST_ID).await.unwrap();
    assert!(!chat.remote);
    assert_eq!(chat.partner, "Dr. Amit");
    assert_eq!(chat.messages.len(), 1);
  }

  #[tokio::test]
  async fn test_open_chat_creates_room_and_routes_messages() {
    let remote = FakeRemote::online().with(|s| {
      s.pending = vec![remote_request("R1", Status::Pending)];
      s.messages = vec![ChatMessage::new(Sender::Party("user".to_string()), "Help!", Utc::now())];
    });
    let storage = SharedStorage::default();
    let mut sync = loaded(remote.clone(), storage.clone()).await;
    sync.login("asha", "secret").await.unwrap();

    let chat = sync.open_chat("R1").await.unwrap();
    assert!(chat.remote);
    assert_eq!(chat.room_id, Some(11));
    assert_eq!(chat.messages.len(), 1);
    assert!(remote.calls().contains(&"create-room:R1".to_string()));

    let sent = sync.send_message("R1", "Coming").await.unwrap().unwrap();
    assert_eq!(sent.path, SyncPath::Remote);
    assert_eq!(sent.value.sender, Sender::Party("volunteer".to_string()));

    let cached = storage.inner.get_list::<Request>(REQUESTS_KEY).unwrap().unwrap();
    assert_eq!(cached.entities[0].chat_room_id, Some(11));
    assert_eq!(cached.entities[0].chat_messages.len(), 2);
  }

  #[tokio::test]
  async fn test_open_chat_keeps_messages_stored_before_room() {
    let remote = FakeRemote::online().with(|s| {
      s.pending = vec![remote_request("R1", Status::Pending)];
      s.messages = vec![ChatMessage::new(
        Sender::Party("volunteer".to_string()),
        "Who is nearby?",
        Utc::now() - ChronoDuration::minutes(10),
      )];
    });
    let storage = SharedStorage::default();
    let mut sync = loaded(remote, storage.clone()).await;
    sync.login("asha", "secret").await.unwrap();

    let sent = sync.send_message("R1", "Bringing a crate").await.unwrap().unwrap();
    assert_eq!(sent.path, SyncPath::Local);

    let chat = sync.open_chat("R1").await.unwrap();
    let texts: Vec<&str> = chat.messages.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, vec!["Who is nearby?", "Bringing a crate"]);
    assert_eq!(find(&sync, "R1").unwrap().chat_messages.len(), 2);

    let cached = storage.inner.get_list::<Request>(REQUESTS_KEY).unwrap().unwrap();
    assert_eq!(cached.entities[0].chat_messages.len(), 2);

    // Reopening does not duplicate anything
    let again = sync.open_chat("R1").await.unwrap();
    assert_eq!(again.messages.len(), 2);
  }

  #[test]
  fn test_merge_messages_orders_by_timestamp() {
    let now = Utc::now();
    let remote = vec![ChatMessage::new(Sender::System, "b", now)];
    let stored = vec![
      ChatMessage::new(Sender::User, "c", now + ChronoDuration::seconds(1)),
      ChatMessage::new(Sender::System, "b", now),
      ChatMessage::new(Sender::User, "a", now - ChronoDuration::seconds(1)),
    ];

    let texts: Vec<String> = merge_messages(remote, stored)
      .into_iter()
      .map(|m| m.message)
      .collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  #[tokio::test]
  async fn test_login_sets_token_and_logout_clears_it() {
    let remote = FakeRemote::online().with(|s| s.pending = vec![remote_request("R1", Status::Pending)]);
    let mut sync = loaded(remote.clone(), SharedStorage::default()).await;

    let report = sync.login("asha", "secret").await.unwrap();
    assert_eq!(report.source, CacheSource::Network);
    assert_eq!(sync.session().unwrap().display_name(), "Asha Rao");
    assert_eq!(remote.state.lock().unwrap().token.as_deref(), Some("jwt"));

    sync.logout();
    assert!(sync.session().is_none());
    assert_eq!(remote.state.lock().unwrap().token, None);
  }

  #[tokio::test]
  async fn test_login_failure_is_connectivity_error() {
    let mut sync = loaded(FakeRemote::online(), SharedStorage::default()).await;
    let err = sync.login("asha", "wrong").await.unwrap_err();
    assert_eq!(err, SyncError::Connectivity("Invalid credentials".to_string()));
    assert!(sync.session().is_none());
  }

  #[test]
  fn test_accessors_on_fresh_coordinator() {
    let sync = SyncCoordinator::new(FakeRemote::offline(), SharedStorage::default(), SyncOptions::default());
    assert!(sync.records().is_empty());
    assert_eq!(sync.counts(), StatusCounts::default());
    assert_eq!(sync.mode(), Mode::Disconnected);
    assert_eq!(sync.source(), None);
  }
}
