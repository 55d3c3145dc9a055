use crate::desk::{Action, Snapshot};
use crate::rescue::NewRequest;
use crate::ui::components::{Form, FormEvent, FormField, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

const ANIMAL: usize = 0;
const URGENCY: usize = 1;
const LOCATION: usize = 2;
const NAME: usize = 3;
const PHONE: usize = 4;
const EMAIL: usize = 5;
const DESCRIPTION: usize = 6;

const URGENCY_LEVELS: [&str; 4] = ["low", "medium", "high", "critical"];

/// Form for reporting a new emergency
pub struct SubmitFormView {
  form: Form,
}

impl SubmitFormView {
  pub fn new() -> Self {
    Self {
      form: Form::new(vec![
        FormField::required("Animal type").with_hint("dog, cat, bird..."),
        FormField::required("Urgency").with_hint("low / medium / high / critical"),
        FormField::required("Location"),
        FormField::required("Your name"),
        FormField::required("Phone"),
        FormField::optional("Email"),
        FormField::required("Description"),
      ]),
    }
  }

  fn request(&self) -> NewRequest {
    NewRequest {
      animal_type: self.form.value(ANIMAL),
      urgency: self.form.value(URGENCY),
      location: self.form.value(LOCATION),
      contact_name: self.form.value(NAME),
      contact_phone: self.form.value(PHONE),
      contact_email: self.form.optional_value(EMAIL),
      description: self.form.value(DESCRIPTION),
    }
  }

  /// Check the form, pointing at the first offending field on failure
  fn validate(&mut self) -> Option<NewRequest> {
    let request = self.request();

    if let Some(missing) = request.first_missing() {
      let (index, label) = match missing {
        "animalType" => (ANIMAL, "Animal type"),
        "urgency" => (URGENCY, "Urgency"),
        "location" => (LOCATION, "Location"),
        "contactName" => (NAME, "Your name"),
        "contactPhone" => (PHONE, "Phone"),
        _ => (DESCRIPTION, "Description"),
      };
      self.form.set_error(format!("{} is required.", label));
      self.form.focus(index);
      return None;
    }

    if !URGENCY_LEVELS.contains(&request.urgency.to_lowercase().as_str()) {
      self
        .form
        .set_error(format!("Urgency must be one of: {}.", URGENCY_LEVELS.join(", ")));
      self.form.focus(URGENCY);
      return None;
    }

    Some(request.normalized())
  }
}

impl View for SubmitFormView {
  fn handle_key(&mut self, key: KeyEvent, _snapshot: &Snapshot) -> ViewAction {
    // Ctrl-S submits from any field
    let submit = key.modifiers.contains(KeyModifiers::CONTROL)
      && key.code == KeyCode::Char('s');

    let event = if submit {
      KeyResult::Event(FormEvent::Submitted)
    } else {
      self.form.handle_key(key)
    };

    match event {
      KeyResult::Event(FormEvent::Cancelled) => ViewAction::Pop,
      KeyResult::Event(FormEvent::Submitted) => match self.validate() {
        Some(request) => ViewAction::Finish(Action::Submit(request)),
        None => ViewAction::None,
      },
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, _snapshot: &Snapshot) {
    let block = Block::default()
      .title(" Report an emergency ")
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

    let intro = Paragraph::new(
      "Describe the animal and where to find it. Fields marked * are required.",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(intro, chunks[0]);
    self.form.render(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "New request".to_string()
  }

  fn is_editing(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(10),
      ShortcutInfo::new("enter", "submit").with_priority(20),
      ShortcutInfo::new("esc", "cancel").with_priority(90),
    ]
  }
}
