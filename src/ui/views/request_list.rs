use super::{helper_prefill, RequestDetailView, SubmitFormView};
use crate::desk::{Action, Snapshot};
use crate::rescue::{Helper, Request, Status};
use crate::ui::components::{AcceptDialog, AcceptEvent, KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{status_color, time_ago, truncate, urgency_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Dashboard tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
  Pending,
  /// Accepted and completed requests
  Accepted,
}

impl Tab {
  pub fn includes(&self, status: Status) -> bool {
    match self {
      Tab::Pending => status == Status::Pending,
      Tab::Accepted => status != Status::Pending,
    }
  }

  fn label(&self) -> &'static str {
    match self {
      Tab::Pending => "Pending",
      Tab::Accepted => "Accepted",
    }
  }

  fn other(&self) -> Tab {
    match self {
      Tab::Pending => Tab::Accepted,
      Tab::Accepted => Tab::Pending,
    }
  }
}

/// Root view: requests split into pending and accepted tabs
pub struct RequestListView {
  tab: Tab,
  list_state: ListState,
  search: SearchInput,
  filter: String,
  accept: AcceptDialog,
  volunteer: Option<Helper>,
}

impl RequestListView {
  pub fn new(tab: Tab, volunteer: Option<Helper>) -> Self {
    Self {
      tab,
      list_state: ListState::default(),
      search: SearchInput::new(),
      filter: String::new(),
      accept: AcceptDialog::new(),
      volunteer,
    }
  }

  /// Switch to `tab`, resetting the selection when it changes
  pub fn select_tab(&mut self, tab: Tab) {
    if self.tab != tab {
      self.tab = tab;
      self.list_state.select(Some(0));
    }
  }

  /// Requests on the current tab matching the search filter, newest first
  fn visible<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a Request> {
    snapshot
      .records
      .iter()
      .filter(|r| self.tab.includes(r.status) && r.matches(&self.filter))
      .collect()
  }

  fn selected<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a Request> {
    let idx = self.list_state.selected()?;
    self.visible(snapshot).get(idx).copied()
  }

  fn render_tabs(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let counts = snapshot.counts;
    let tab_span = |tab: Tab, key: &str, count: usize| {
      let style = if tab == self.tab {
        Style::default().fg(Color::Black).bg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      Span::styled(format!(" [{}] {} ({}) ", key, tab.label(), count), style)
    };

    let line = Line::from(vec![
      Span::raw(" "),
      tab_span(Tab::Pending, "1", counts.pending),
      Span::raw(" "),
      tab_span(Tab::Accepted, "2", counts.accepted + counts.completed),
    ]);
    frame.render_widget(Paragraph::new(line), area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let visible = self.visible(snapshot);
    ensure_valid_selection(&mut self.list_state, visible.len());

    let filter_indicator = if self.filter.is_empty() {
      String::new()
    } else {
      format!(" [/{}]", self.filter)
    };
    let title = if snapshot.loading {
      format!(" {} requests (loading...) ", self.tab.label())
    } else {
      format!(
        " {} requests ({}){} ",
        self.tab.label(),
        visible.len(),
        filter_indicator
      )
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if visible.is_empty() {
      let content = if snapshot.loading {
        "Loading requests..."
      } else if !self.filter.is_empty() {
        "No requests match the search."
      } else {
        match self.tab {
          Tab::Pending => "No pending requests. Press 'n' to report an emergency.",
          Tab::Accepted => "No accepted requests yet.",
        }
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = visible
      .iter()
      .map(|request| {
        let mut spans = vec![
          Span::styled(
            format!("{:<9}", request.urgency.to_uppercase()),
            Style::default().fg(urgency_color(&request.urgency)).bold(),
          ),
          Span::styled(
            format!("{:<10}", truncate(&request.animal_type, 10)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(format!("{:<42}", truncate(&request.location, 40))),
          Span::styled(
            format!("{:<16}", time_ago(request.timestamp, now)),
            Style::default().fg(Color::DarkGray),
          ),
        ];

        if self.tab == Tab::Accepted {
          spans.push(Span::styled(
            format!("{:<10}", request.status),
            Style::default().fg(status_color(request.status)),
          ));
          if let Some(helper) = &request.helper {
            spans.push(Span::raw(truncate(&helper.name, 20)));
          }
        }
        if request.is_local() {
          spans.push(Span::styled(" (local)", Style::default().fg(Color::DarkGray)));
        }

        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for RequestListView {
  fn handle_key(&mut self, key: KeyEvent, snapshot: &Snapshot) -> ViewAction {
    if self.accept.is_active() {
      if let KeyResult::Event(AcceptEvent::Confirmed { id, helper }) = self.accept.handle_key(key) {
        return ViewAction::Dispatch(Action::Accept { id, helper });
      }
      return ViewAction::None;
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(query)) => {
        self.filter = query;
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    let selected = self.selected(snapshot).map(|r| (r.id.clone(), r.status));

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('1') => self.select_tab(Tab::Pending),
      KeyCode::Char('2') => self.select_tab(Tab::Accepted),
      KeyCode::Tab | KeyCode::Left | KeyCode::Right => self.select_tab(self.tab.other()),
      KeyCode::Char('r') => return ViewAction::Dispatch(Action::Refresh),
      KeyCode::Char('n') => return ViewAction::Push(Box::new(SubmitFormView::new())),
      KeyCode::Enter => {
        if let Some((id, _)) = selected {
          return ViewAction::Push(Box::new(RequestDetailView::new(
            id,
            self.volunteer.clone(),
          )));
        }
      }
      KeyCode::Char('a') => match selected {
        Some((id, Status::Pending)) => {
          let prefill = helper_prefill(snapshot, self.volunteer.as_ref());
          self.accept.show(&id, prefill.as_ref());
        }
        // Let the coordinator report why it cannot be accepted
        Some((id, _)) => {
          return ViewAction::Dispatch(Action::Accept {
            id,
            helper: Helper::new("", "", None),
          })
        }
        None => {}
      },
      KeyCode::Char('x') => {
        if let Some((id, _)) = selected {
          return ViewAction::Dispatch(Action::Complete(id));
        }
      }
      KeyCode::Char('c') => {
        if let Some((id, _)) = selected {
          return ViewAction::Dispatch(Action::OpenChat(id));
        }
      }
      KeyCode::Esc if !self.filter.is_empty() => {
        self.filter.clear();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(1)])
      .split(area);

    self.render_tabs(frame, chunks[0], snapshot);
    self.render_list(frame, chunks[1], snapshot);
    self.search.render_overlay(frame, chunks[1]);
    self.accept.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.tab.label().to_string()
  }

  fn is_editing(&self) -> bool {
    self.search.is_active() || self.accept.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("n", "new").with_priority(30),
      ShortcutInfo::new("a", "accept").with_priority(40),
      ShortcutInfo::new("x", "complete").with_priority(50),
      ShortcutInfo::new("c", "chat").with_priority(60),
      ShortcutInfo::new("r", "sync").with_priority(70),
    ]
  }
}
