use super::helper_prefill;
use crate::desk::{Action, Snapshot};
use crate::rescue::{Helper, Request, Status};
use crate::ui::components::{AcceptDialog, AcceptEvent, KeyResult};
use crate::ui::renderfns::{status_color, time_ago, urgency_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::{Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Full view of a single request
pub struct RequestDetailView {
  id: String,
  accept: AcceptDialog,
  volunteer: Option<Helper>,
  scroll: u16,
}

impl RequestDetailView {
  pub fn new(id: String, volunteer: Option<Helper>) -> Self {
    Self {
      id,
      accept: AcceptDialog::new(),
      volunteer,
      scroll: 0,
    }
  }

  fn lines(request: &Request) -> Vec<Line<'static>> {
    let label = |text: &str| Span::styled(format!("{:<12}", text), Style::default().fg(Color::DarkGray));
    let field = |name: &str, value: String| Line::from(vec![label(name), Span::raw(value)]);

    let mut lines = vec![
      Line::from(vec![
        label("Animal"),
        Span::styled(request.animal_type.clone(), Style::default().fg(Color::Cyan).bold()),
      ]),
      Line::from(vec![
        label("Urgency"),
        Span::styled(
          request.urgency.to_uppercase(),
          Style::default().fg(urgency_color(&request.urgency)).bold(),
        ),
      ]),
      Line::from(vec![
        label("Status"),
        Span::styled(
          request.status.to_string(),
          Style::default().fg(status_color(request.status)),
        ),
      ]),
      field(
        "Reported",
        format!(
          "{} ({})",
          request.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
          time_ago(request.timestamp, Utc::now())
        ),
      ),
      field("Location", request.location.clone()),
      Line::default(),
      field("Contact", request.contact_name.clone()),
      field("Phone", request.contact_phone.clone()),
    ];
    if let Some(email) = request.contact_email() {
      lines.push(field("Email", email.to_string()));
    }

    lines.push(Line::default());
    match &request.helper {
      Some(helper) => {
        lines.push(field("Helper", helper.name.clone()));
        if !helper.phone.is_empty() {
          lines.push(field("Helper phone", helper.phone.clone()));
        }
        if let Some(email) = &helper.email {
          lines.push(field("Helper email", email.clone()));
        }
      }
      None => lines.push(Line::from(vec![
        label("Helper"),
        Span::styled("none yet", Style::default().fg(Color::DarkGray).italic()),
      ])),
    }

    lines.push(Line::default());
    lines.push(Line::styled("Description", Style::default().fg(Color::DarkGray)));
    lines.push(Line::raw(request.description.clone()));
    lines.push(Line::default());
    lines.push(field("Chat", format!("{} messages", request.chat_messages.len())));
    if request.is_local() {
      lines.push(Line::styled(
        "Stored on this device only",
        Style::default().fg(Color::Yellow),
      ));
    }
    lines
  }
}

impl View for RequestDetailView {
  fn handle_key(&mut self, key: KeyEvent, snapshot: &Snapshot) -> ViewAction {
    if self.accept.is_active() {
      if let KeyResult::Event(AcceptEvent::Confirmed { id, helper }) = self.accept.handle_key(key) {
        return ViewAction::Dispatch(Action::Accept { id, helper });
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('a') => match snapshot.get(&self.id).map(|r| r.status) {
        Some(Status::Pending) => {
          let prefill = helper_prefill(snapshot, self.volunteer.as_ref());
          self.accept.show(&self.id, prefill.as_ref());
        }
        Some(_) => {
          return ViewAction::Dispatch(Action::Accept {
            id: self.id.clone(),
            helper: Helper::new("", "", None),
          })
        }
        None => {}
      },
      KeyCode::Char('x') => return ViewAction::Dispatch(Action::Complete(self.id.clone())),
      KeyCode::Char('c') => return ViewAction::Dispatch(Action::OpenChat(self.id.clone())),
      KeyCode::Char('r') => return ViewAction::Dispatch(Action::Refresh),
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let block = Block::default()
      .title(format!(" Request {} ", self.id))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = match snapshot.get(&self.id) {
      Some(request) => Paragraph::new(Self::lines(request))
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
      None => Paragraph::new("This request is no longer available.")
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block), area);
    self.accept.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.id.clone()
  }

  fn is_editing(&self) -> bool {
    self.accept.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "accept").with_priority(20),
      ShortcutInfo::new("x", "complete").with_priority(30),
      ShortcutInfo::new("c", "chat").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
