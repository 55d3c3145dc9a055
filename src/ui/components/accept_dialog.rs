use super::form::{Form, FormEvent, FormField};
use super::KeyResult;
use crate::rescue::Helper;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear};

const NAME: usize = 0;
const PHONE: usize = 1;
const EMAIL: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptEvent {
  Confirmed { id: String, helper: Helper },
  Cancelled,
}

/// Overlay asking for the helper's contact details before accepting a request
#[derive(Debug, Clone, Default)]
pub struct AcceptDialog {
  request_id: Option<String>,
  form: Form,
}

impl AcceptDialog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.request_id.is_some()
  }

  /// Open the dialog for `id`, pre-filled from `prefill`
  pub fn show(&mut self, id: &str, prefill: Option<&Helper>) {
    let name = prefill.map(|h| h.name.as_str()).unwrap_or("");
    let phone = prefill.map(|h| h.phone.as_str()).unwrap_or("");
    let email = prefill.and_then(|h| h.email.as_deref()).unwrap_or("");

    self.form = Form::new(vec![
      FormField::required("Your name").with_value(name),
      FormField::required("Phone").with_value(phone),
      FormField::optional("Email").with_value(email),
    ]);
    // Start on the first field that still needs input
    if !name.is_empty() {
      self.form.focus(if phone.is_empty() { PHONE } else { EMAIL });
    }
    self.request_id = Some(id.to_string());
  }

  fn hide(&mut self) {
    self.request_id = None;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<AcceptEvent> {
    if !self.is_active() {
      return KeyResult::NotHandled;
    }

    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Cancelled) => {
        self.hide();
        KeyResult::Event(AcceptEvent::Cancelled)
      }
      KeyResult::Event(FormEvent::Submitted) => self.confirm(),
      // Modal: nothing leaks to the view behind
      _ => KeyResult::Handled,
    }
  }

  fn confirm(&mut self) -> KeyResult<AcceptEvent> {
    if self.form.value(NAME).is_empty() {
      self.form.set_error("Name is required to accept this request.");
      self.form.focus(NAME);
      return KeyResult::Handled;
    }
    if self.form.value(PHONE).is_empty() {
      self
        .form
        .set_error("Phone number is required to accept this request.");
      self.form.focus(PHONE);
      return KeyResult::Handled;
    }

    let helper = Helper::new(
      self.form.value(NAME),
      self.form.value(PHONE),
      self.form.optional_value(EMAIL),
    );
    match self.request_id.take() {
      Some(id) => KeyResult::Event(AcceptEvent::Confirmed { id, helper }),
      None => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some(id) = &self.request_id else {
      return;
    };

    let width = 60.min(area.width.saturating_sub(4)).max(20).min(area.width);
    let height = (self.form.height() + 2).min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" Accept {} ", id));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);
    self.form.render(frame, inner);
  }
}
