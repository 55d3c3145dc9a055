use crate::desk::{Action, Snapshot};
use crate::ui::components::{Form, FormEvent, FormField, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

const USERNAME: usize = 0;
const PASSWORD: usize = 1;

/// Sign in to the backend mid-session
pub struct LoginFormView {
  form: Form,
}

impl LoginFormView {
  /// Username pre-filled from the config, focus on the first empty field
  pub fn new(username: Option<&str>) -> Self {
    let mut form = Form::new(vec![
      FormField::required("Username").with_value(username.unwrap_or_default()),
      FormField::required("Password").masked(),
    ]);
    if username.is_some_and(|u| !u.trim().is_empty()) {
      form.focus(PASSWORD);
    }
    Self { form }
  }

  fn validate(&mut self) -> Option<Action> {
    let username = self.form.value(USERNAME);
    if username.is_empty() {
      self.form.set_error("Username is required.");
      self.form.focus(USERNAME);
      return None;
    }

    let password = self.form.raw_value(PASSWORD);
    if password.is_empty() {
      self.form.set_error("Password is required.");
      self.form.focus(PASSWORD);
      return None;
    }

    Some(Action::Login { username, password })
  }
}

impl View for LoginFormView {
  fn handle_key(&mut self, key: KeyEvent, _snapshot: &Snapshot) -> ViewAction {
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Cancelled) => ViewAction::Pop,
      KeyResult::Event(FormEvent::Submitted) => match self.validate() {
        Some(action) => ViewAction::Finish(action),
        None => ViewAction::None,
      },
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let block = Block::default()
      .title(" Sign in ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2),
        Constraint::Length(self.form.height()),
        Constraint::Min(0),
      ])
      .split(inner);

    let intro = match &snapshot.user {
      Some(user) => format!("Signed in as {}. Signing in again replaces the session.", user),
      None => "Sign in to accept requests and chat through the backend.".to_string(),
    };
    frame.render_widget(
      Paragraph::new(intro).style(Style::default().fg(Color::DarkGray)),
      chunks[0],
    );
    self.form.render(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Login".to_string()
  }

  fn is_editing(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(10),
      ShortcutInfo::new("enter", "sign in").with_priority(20),
      ShortcutInfo::new("esc", "cancel").with_priority(90),
    ]
  }
}
