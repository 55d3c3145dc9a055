use crate::config::Config;
use crate::desk::{Action, Desk, Notice, Snapshot};
use crate::event::{Event, EventHandler};
use crate::rescue::Helper;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{ChatView, LoginFormView, RequestListView, SubmitFormView, Tab};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use tracing::{debug, info, warn};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,

  /// `:` command palette
  command: CommandInput,

  /// Latest coordinator state
  snapshot: Snapshot,

  /// Outcome of the last action, cleared once it expires
  notice: Option<Notice>,

  desk: Desk,

  /// Application configuration
  config: Config,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, desk: Desk) -> Self {
    let volunteer = volunteer_profile(&config);
    Self {
      views: vec![Box::new(RequestListView::new(Tab::Pending, volunteer))],
      command: CommandInput::new(),
      snapshot: Snapshot::loading(),
      notice: None,
      desk,
      config,
      should_quit: false,
    }
  }

  pub async fn run(&mut self, mut events: EventHandler) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    self.start();

    // Main loop
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  /// Initial load, logging in when a username is configured
  fn start(&mut self) {
    let credentials = match &self.config.api.username {
      Some(username) => match Config::get_password() {
        Ok(password) => Some((username.clone(), password)),
        Err(e) => {
          warn!(error = %e, "skipping login");
          self.notice = Some(Notice::warning(e.to_string()));
          None
        }
      },
      None => None,
    };
    info!(login = credentials.is_some(), "starting desk");
    self.desk.start(credentials);
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if self.notice.as_ref().is_some_and(Notice::is_expired) {
          self.notice = None;
        }
      }
      Event::Synced(snapshot, notice) => {
        self.snapshot = *snapshot;
        if notice.is_some() {
          self.notice = notice;
        }
      }
      Event::ChatOpened(chat) => self.views.push(Box::new(ChatView::new(chat))),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // The palette only opens when the view is not taking text
    if self.command.is_active() || !self.is_editing() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.views.last_mut() else {
      return;
    };
    let action = view.handle_key(key, &self.snapshot);
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.views.push(view),
      ViewAction::Pop => self.pop_view(),
      ViewAction::Dispatch(action) => self.dispatch(action),
      ViewAction::Finish(action) => {
        self.pop_view();
        self.dispatch(action);
      }
    }
  }

  fn pop_view(&mut self) {
    if self.views.len() > 1 {
      self.views.pop();
    } else {
      self.should_quit = true;
    }
  }

  fn dispatch(&mut self, action: Action) {
    if matches!(action, Action::Refresh) {
      self.snapshot.loading = true;
    }
    self.desk.dispatch(action);
  }

  fn execute_command(&mut self, cmd: &str) {
    debug!(cmd, "executing command");
    match cmd {
      "pending" => self.show_tab(Tab::Pending),
      "accepted" => self.show_tab(Tab::Accepted),
      "new" => self.views.push(Box::new(SubmitFormView::new())),
      "refresh" => self.dispatch(Action::Refresh),
      "login" => {
        let form = LoginFormView::new(self.config.api.username.as_deref());
        self.views.push(Box::new(form));
      }
      "logout" => self.dispatch(Action::Logout),
      "quit" => self.should_quit = true,
      "" => {}
      other => self.notice = Some(Notice::warning(format!("Unknown command: {}", other))),
    }
  }

  /// Replace the whole stack with the request list on `tab`
  fn show_tab(&mut self, tab: Tab) {
    self.views.clear();
    self.views.push(Box::new(RequestListView::new(
      tab,
      volunteer_profile(&self.config),
    )));
  }

  fn is_editing(&self) -> bool {
    self.views.last().is_some_and(|v| v.is_editing())
  }

  // Accessors for UI rendering
  pub fn render_view(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.views.last_mut() {
      view.render(frame, area, &self.snapshot);
    }
  }

  pub fn title(&self) -> &str {
    self.config.title()
  }

  pub fn snapshot(&self) -> &Snapshot {
    &self.snapshot
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self.views.last().map(|v| v.shortcuts()).unwrap_or_default()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }
}

/// Volunteer details from the config file, used to pre-fill the accept form
fn volunteer_profile(config: &Config) -> Option<Helper> {
  config
    .volunteer
    .as_ref()
    .map(|v| Helper::new(v.name.clone(), v.phone.clone(), v.email.clone()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheBackend, MemoryStorage};
  use crate::config::ApiConfig;
  use crate::desk::NoticeKind;
  use crate::rescue::{RescueClient, SyncCoordinator, SyncOptions};
  use serde_json::{json, Value};
  use tokio::sync::mpsc;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn app() -> (App, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = RescueClient::new(&ApiConfig::default()).unwrap();
    let sync = SyncCoordinator::new(
      client,
      CacheBackend::Memory(MemoryStorage::new()),
      SyncOptions {
        offline: true,
        ..SyncOptions::default()
      },
    );
    (App::new(Config::default(), Desk::new(sync, tx)), rx)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_command(app: &mut App, cmd: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in cmd.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_q_on_root_quits() {
    let (mut app, _rx) = app();
    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_new_command_pushes_form() {
    let (mut app, _rx) = app();
    type_command(&mut app, "new");
    assert_eq!(app.view_breadcrumb(), vec!["Pending", "New request"]);

    // The form takes ':' as text instead of opening the palette
    app.handle_key(key(KeyCode::Char(':')));
    assert!(!app.command.is_active());

    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.view_breadcrumb(), vec!["Pending"]);
  }

  #[tokio::test]
  async fn test_accepted_command_resets_stack() {
    let (mut app, _rx) = app();
    type_command(&mut app, "new");
    app.handle_key(key(KeyCode::Esc));
    type_command(&mut app, "accepted");
    assert_eq!(app.view_breadcrumb(), vec!["Accepted"]);
  }

  #[tokio::test]
  async fn test_unknown_command_warns() {
    let (mut app, _rx) = app();
    type_command(&mut app, "zzz");
    assert_eq!(
      app.notice().map(|n| n.message.as_str()),
      Some("Unknown command: zzz")
    );
  }

  /// Feed the next background event into the app
  async fn pump(app: &mut App, rx: &mut mpsc::UnboundedReceiver<Event>) {
    let event = rx.recv().await.expect("desk event");
    app.handle_event(event);
  }

  async fn backend() -> MockServer {
    let ok = |data: Value| {
      ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
    };
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/test/health"))
      .respond_with(ok(json!({ "status": "UP" })))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/api/auth/signin"))
      .and(body_partial_json(json!({ "username": "asha", "password": "pw" })))
      .respond_with(ok(json!({
        "token": "jwt",
        "id": 3,
        "username": "asha",
        "fullName": "Asha Rao",
        "role": "VOLUNTEER"
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/emergency/pending"))
      .respond_with(ok(json!([{
        "id": "R1",
        "animalType": "cow",
        "urgency": "HIGH",
        "location": "Village Road",
        "contactName": "Sunita",
        "contactPhone": "765",
        "description": "Fell in a ditch",
        "status": "PENDING",
        "createdAt": "2024-06-01T12:00:00"
      }])))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/emergency/status/ACCEPTED"))
      .respond_with(ok(json!([])))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/chat/room/emergency/R1"))
      .and(header("Authorization", "Bearer jwt"))
      .respond_with(ok(json!({ "id": 5 })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/chat/room/5/messages"))
      .respond_with(ok(json!([
        { "message": "On my way", "senderType": "VOLUNTEER", "createdAt": "2024-06-01T12:05:00" }
      ])))
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn test_log_back_in_then_open_chat() {
    let server = backend().await;
    let config = Config {
      api: ApiConfig {
        url: format!("{}/api", server.uri()),
        username: Some("asha".to_string()),
        ..ApiConfig::default()
      },
      ..Config::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = RescueClient::new(&config.api).unwrap();
    let sync = SyncCoordinator::new(
      client,
      CacheBackend::Memory(MemoryStorage::new()),
      SyncOptions::default(),
    );
    let mut app = App::new(config, Desk::new(sync, tx));

    app.desk.start(Some(("asha".to_string(), "pw".to_string())));
    pump(&mut app, &mut rx).await;
    assert_eq!(app.snapshot().user.as_deref(), Some("Asha Rao"));

    type_command(&mut app, "logout");
    pump(&mut app, &mut rx).await;
    assert_eq!(app.snapshot().user, None);

    // Connected without a session, chat needs a login
    app.dispatch(Action::OpenChat("R1".to_string()));
    pump(&mut app, &mut rx).await;
    assert_eq!(app.notice().map(|n| n.kind), Some(NoticeKind::Warning));
    assert_eq!(app.view_breadcrumb(), vec!["Pending"]);

    type_command(&mut app, "login");
    assert_eq!(app.view_breadcrumb(), vec!["Pending", "Login"]);
    for c in "pw".chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.view_breadcrumb(), vec!["Pending"]);

    pump(&mut app, &mut rx).await;
    assert_eq!(app.snapshot().user.as_deref(), Some("Asha Rao"));
    assert_eq!(
      app.notice().map(|n| n.message.as_str()),
      Some("Welcome back, Asha Rao!")
    );

    app.dispatch(Action::OpenChat("R1".to_string()));
    pump(&mut app, &mut rx).await;
    assert_eq!(app.snapshot().get("R1").unwrap().chat_room_id, Some(5));
    pump(&mut app, &mut rx).await;
    assert_eq!(app.view_breadcrumb(), vec!["Pending", "Chat R1"]);
  }

  #[tokio::test]
  async fn test_login_command_prefills_configured_user() {
    let (mut app, _rx) = app();
    type_command(&mut app, "signin");
    assert_eq!(app.view_breadcrumb(), vec!["Pending", "Login"]);
    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.view_breadcrumb(), vec!["Pending"]);
  }

  #[tokio::test]
  async fn test_refresh_publishes_snapshot() {
    let (mut app, mut rx) = app();
    type_command(&mut app, "refresh");
    assert!(app.snapshot().loading);

    match rx.recv().await {
      Some(Event::Synced(snapshot, _)) => {
        app.handle_event(Event::Synced(snapshot, None));
        assert!(!app.snapshot().loading);
        assert_eq!(app.snapshot().records.len(), 1);
      }
      _ => panic!("expected synced event"),
    }
  }
}
