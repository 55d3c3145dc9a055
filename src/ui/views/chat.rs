use crate::desk::{Action, Snapshot};
use crate::rescue::{ChatMessage, ChatSession, Sender};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::Local;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

const CHAT_WELCOME: &str = "Chat started. You can now communicate about this emergency request.";

/// Conversation about one request
pub struct ChatView {
  chat: ChatSession,
  input: TextInput,
}

impl ChatView {
  pub fn new(chat: ChatSession) -> Self {
    Self {
      chat,
      input: TextInput::new(),
    }
  }

  /// Latest messages: the stored request wins over the copy taken when the chat opened
  fn messages<'a>(&'a self, snapshot: &'a Snapshot) -> &'a [ChatMessage] {
    snapshot
      .get(&self.chat.request_id)
      .map(|r| r.chat_messages.as_slice())
      .unwrap_or(&self.chat.messages)
  }

  fn message_line(message: &ChatMessage) -> Line<'static> {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let time = Span::styled(format!("[{}] ", time), Style::default().fg(Color::DarkGray));

    match &message.sender {
      Sender::System => Line::from(vec![
        time,
        Span::styled(
          message.message.clone(),
          Style::default().fg(Color::DarkGray).italic(),
        ),
      ]),
      sender => {
        let color = if *sender == Sender::User {
          Color::Cyan
        } else {
          Color::Magenta
        };
        Line::from(vec![
          time,
          Span::styled(format!("{}: ", sender.label()), Style::default().fg(color).bold()),
          Span::raw(message.message.clone()),
        ])
      }
    }
  }
}

impl View for ChatView {
  fn handle_key(&mut self, key: KeyEvent, _snapshot: &Snapshot) -> ViewAction {
    match self.input.handle_key(key) {
      InputResult::Cancelled => ViewAction::Pop,
      InputResult::Submitted(text) => {
        if text.trim().is_empty() {
          return ViewAction::None;
        }
        self.input.clear();
        ViewAction::Dispatch(Action::SendMessage {
          id: self.chat.request_id.clone(),
          text,
        })
      }
      InputResult::Consumed | InputResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(3)])
      .split(area);

    let (origin, origin_color) = match (self.chat.remote, self.chat.room_id) {
      (true, Some(room)) => (format!("live, room {}", room), Color::Green),
      (true, None) => ("live".to_string(), Color::Green),
      (false, _) => ("local".to_string(), Color::Yellow),
    };
    let title = Line::from(vec![
      Span::raw(format!(" Chat with {} ", self.chat.partner)),
      Span::styled(format!("({}) ", origin), Style::default().fg(origin_color)),
    ]);
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let messages = self.messages(snapshot);
    let lines: Vec<Line> = if messages.is_empty() {
      vec![Line::styled(
        CHAT_WELCOME,
        Style::default().fg(Color::DarkGray).italic(),
      )]
    } else {
      messages.iter().map(Self::message_line).collect()
    };

    // Keep the newest messages in view
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;
    let history = Paragraph::new(lines)
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((scroll, 0));
    frame.render_widget(history, chunks[0]);

    let input = Paragraph::new(self.input.value()).block(
      Block::default()
        .title(" Message ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(input, chunks[1]);

    let cursor_x = chunks[1].x + 1 + self.input.cursor_position() as u16;
    frame.set_cursor_position((
      cursor_x.min(chunks[1].right().saturating_sub(2)),
      chunks[1].y + 1,
    ));
  }

  fn breadcrumb_label(&self) -> String {
    format!("Chat {}", self.chat.request_id)
  }

  fn is_editing(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "send").with_priority(10),
      ShortcutInfo::new("esc", "back").with_priority(90),
    ]
  }
}
