//! Runs coordinator actions in the background.
//!
//! Each action is one spawned task that holds the coordinator lock for its whole
//! duration, so mutations never interleave. The task reports back with a fresh
//! [`Snapshot`] and a [`Notice`] over the event channel; views render from the
//! snapshot and never touch the coordinator directly.

use crate::cache::{CacheBackend, CacheSource};
use crate::event::Event;
use crate::rescue::{
  ChatSession, Helper, LoadReport, Mode, NewRequest, RescueClient, Request, StatusCounts,
  SyncCoordinator, SyncError, SyncPath,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

pub type Coordinator = SyncCoordinator<RescueClient, CacheBackend>;

/// How long a notice stays in the footer
const NOTICE_TTL: Duration = Duration::from_secs(5);

/// Actions views can ask for
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
  Refresh,
  Submit(NewRequest),
  Accept { id: String, helper: Helper },
  Complete(String),
  SendMessage { id: String, text: String },
  OpenChat(String),
  Login { username: String, password: String },
  Logout,
}

impl fmt::Debug for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::Refresh => f.write_str("Refresh"),
      Action::Submit(fields) => f.debug_tuple("Submit").field(fields).finish(),
      Action::Accept { id, helper } => f
        .debug_struct("Accept")
        .field("id", id)
        .field("helper", helper)
        .finish(),
      Action::Complete(id) => f.debug_tuple("Complete").field(id).finish(),
      Action::SendMessage { id, text } => f
        .debug_struct("SendMessage")
        .field("id", id)
        .field("text", text)
        .finish(),
      Action::OpenChat(id) => f.debug_tuple("OpenChat").field(id).finish(),
      Action::Login { username, .. } => f
        .debug_struct("Login")
        .field("username", username)
        .field("password", &"***")
        .finish(),
      Action::Logout => f.write_str("Logout"),
    }
  }
}

/// What an action produced besides the new coordinator state
#[derive(Default)]
struct Outcome {
  notice: Option<Notice>,
  chat: Option<ChatSession>,
}

impl From<Notice> for Outcome {
  fn from(notice: Notice) -> Self {
    Self {
      notice: Some(notice),
      chat: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
  Success,
  Warning,
  Error,
}

/// Outcome of an action, shown in the footer
#[derive(Debug, Clone)]
pub struct Notice {
  pub kind: NoticeKind,
  pub message: String,
  created: Instant,
}

impl Notice {
  pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      created: Instant::now(),
    }
  }

  pub fn success(message: impl Into<String>) -> Self {
    Self::new(NoticeKind::Success, message)
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self::new(NoticeKind::Warning, message)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(NoticeKind::Error, message)
  }

  pub fn is_expired(&self) -> bool {
    self.created.elapsed() > NOTICE_TTL
  }
}

impl From<SyncError> for Notice {
  fn from(e: SyncError) -> Self {
    match e {
      SyncError::RequiresConnection | SyncError::LoginRequired => Notice::warning(e.to_string()),
      _ => Notice::error(e.to_string()),
    }
  }
}

/// What views render from
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  /// Newest first
  pub records: Vec<Request>,
  pub counts: StatusCounts,
  pub mode: Mode,
  /// Where the last load came from
  pub source: Option<CacheSource>,
  /// Display name of the logged-in user
  pub user: Option<String>,
  /// Accept form defaults taken from the session
  pub helper: Option<Helper>,
  /// Set until the first load finishes
  pub loading: bool,
}

impl Snapshot {
  pub fn loading() -> Self {
    Self {
      loading: true,
      ..Self::default()
    }
  }

  pub fn capture(sync: &Coordinator) -> Self {
    let session = sync.session();
    Self {
      records: sync.sorted_records(),
      counts: sync.counts(),
      mode: sync.mode(),
      source: sync.source(),
      user: session.map(|s| s.display_name().to_string()),
      helper: session.map(|s| Helper::new(s.display_name(), "", s.email.clone())),
      loading: false,
    }
  }

  pub fn get(&self, id: &str) -> Option<&Request> {
    self.records.iter().find(|r| r.id == id)
  }
}

/// Cloneable handle for dispatching actions
#[derive(Clone)]
pub struct Desk {
  sync: Arc<Mutex<Coordinator>>,
  tx: mpsc::UnboundedSender<Event>,
}

impl Desk {
  pub fn new(sync: Coordinator, tx: mpsc::UnboundedSender<Event>) -> Self {
    Self {
      sync: Arc::new(Mutex::new(sync)),
      tx,
    }
  }

  /// Initial load, followed by a login when credentials are configured
  pub fn start(&self, credentials: Option<(String, String)>) {
    let desk = self.clone();
    tokio::spawn(async move {
      let mut sync = desk.sync.lock().await;
      let report = sync.load().await;
      info!(
        source = ?report.source,
        count = report.count,
        seeded = report.seeded,
        "initial load finished"
      );
      let mut notice = load_notice(&report, sync.mode());

      if let Some((username, password)) = credentials {
        notice = Some(login(&mut sync, username, &password).await);
      }

      desk.publish(&sync, notice);
    });
  }

  /// Run an action in the background
  pub fn dispatch(&self, action: Action) {
    debug!(?action, "dispatching action");
    let desk = self.clone();
    tokio::spawn(async move {
      let mut sync = desk.sync.lock().await;
      let outcome = desk.run(&mut sync, action).await;
      // Snapshot before any view the outcome opens
      desk.publish(&sync, outcome.notice);
      if let Some(chat) = outcome.chat {
        let _ = desk.tx.send(Event::ChatOpened(chat));
      }
    });
  }

  async fn run(&self, sync: &mut Coordinator, action: Action) -> Outcome {
    match action {
      Action::Refresh => {
        let report = sync.load().await;
        load_notice(&report, sync.mode())
          .unwrap_or_else(|| {
            Notice::success(format!(
              "Synced {} requests ({})",
              report.count,
              report.source.label()
            ))
          })
          .into()
      }
      Action::Submit(fields) => match sync.submit(fields).await {
        Ok(created) => {
          info!(id = %created.value.id, path = ?created.path, "request submitted");
          match created.path {
            SyncPath::Remote => {
              Notice::success("Emergency request submitted successfully to our rescue team!")
            }
            SyncPath::Local => Notice::success(
              "Emergency request saved locally. Will sync when server is available.",
            ),
          }
        }
        Err(e) => Notice::from(e),
      }
      .into(),
      Action::Accept { id, helper } => match sync.accept(&id, helper).await {
        Ok(accepted) => {
          info!(id = %accepted.value.id, path = ?accepted.path, "request accepted");
          match accepted.path {
            SyncPath::Remote => {
              Notice::success("Thank you for volunteering! The request owner will be notified.")
            }
            SyncPath::Local => Notice::success("Thank you for volunteering to help! (Local mode)"),
          }
        }
        Err(e) => Notice::from(e),
      }
      .into(),
      Action::Complete(id) => match sync.complete(&id).await {
        Ok(_) => Notice::success("Request marked as completed!"),
        Err(e) => Notice::from(e),
      }
      .into(),
      Action::SendMessage { id, text } => match sync.send_message(&id, &text).await {
        Ok(_) => Outcome::default(),
        Err(e) => Notice::error(format!("Error sending message: {}", e)).into(),
      },
      Action::OpenChat(id) => match sync.open_chat(&id).await {
        Ok(chat) => Outcome {
          notice: None,
          chat: Some(chat),
        },
        Err(e) => Notice::from(e).into(),
      },
      Action::Login { username, password } => login(sync, username, &password).await.into(),
      Action::Logout => {
        sync.logout();
        Notice::success("Logged out").into()
      }
    }
  }

  fn publish(&self, sync: &Coordinator, notice: Option<Notice>) {
    let snapshot = Snapshot::capture(sync);
    let _ = self.tx.send(Event::Synced(Box::new(snapshot), notice));
  }
}

/// Sign in and describe the result
async fn login(sync: &mut Coordinator, username: String, password: &str) -> Notice {
  match sync.login(&username, password).await {
    Ok(_) => {
      let name = sync
        .session()
        .map(|s| s.display_name().to_string())
        .unwrap_or(username);
      Notice::success(format!("Welcome back, {}!", name))
    }
    Err(e) => Notice::error(format!("Login failed: {}", e)),
  }
}

/// Notice for a load, only when something worth mentioning happened
fn load_notice(report: &LoadReport, mode: Mode) -> Option<Notice> {
  match (report.source, mode) {
    (CacheSource::Offline, _) => Some(Notice::warning(
      "Backend server not available. Running in offline mode.",
    )),
    (CacheSource::Cache, Mode::Connected) => Some(Notice::warning(
      "Connected, but no requests came from the server. Showing cached requests.",
    )),
    _ => None,
  }
}
