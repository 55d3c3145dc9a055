use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Events emitted by a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Enter pressed on any field
  Submitted,
  Cancelled,
}

#[derive(Debug, Clone)]
pub struct FormField {
  label: &'static str,
  input: TextInput,
  required: bool,
  masked: bool,
  hint: Option<&'static str>,
}

impl FormField {
  pub fn required(label: &'static str) -> Self {
    Self {
      label,
      input: TextInput::new(),
      required: true,
      masked: false,
      hint: None,
    }
  }

  pub fn optional(label: &'static str) -> Self {
    Self {
      required: false,
      ..Self::required(label)
    }
  }

  pub fn with_hint(mut self, hint: &'static str) -> Self {
    self.hint = Some(hint);
    self
  }

  pub fn with_value(mut self, value: &str) -> Self {
    self.input = TextInput::with_value(value);
    self
  }

  /// Render the value as asterisks
  pub fn masked(mut self) -> Self {
    self.masked = true;
    self
  }

  fn display_value(&self) -> String {
    if self.masked {
      "*".repeat(self.input.value().chars().count())
    } else {
      self.input.value().to_string()
    }
  }
}

/// Vertical list of labelled text inputs.
///
/// Tab/Down and BackTab/Up move between fields; Enter submits from anywhere.
#[derive(Debug, Clone, Default)]
pub struct Form {
  fields: Vec<FormField>,
  focused: usize,
  error: Option<String>,
}

impl Form {
  pub fn new(fields: Vec<FormField>) -> Self {
    Self {
      fields,
      focused: 0,
      error: None,
    }
  }

  /// Trimmed value of field `index`
  pub fn value(&self, index: usize) -> String {
    self
      .fields
      .get(index)
      .map(|f| f.input.value().trim().to_string())
      .unwrap_or_default()
  }

  /// Value of field `index` exactly as typed
  pub fn raw_value(&self, index: usize) -> String {
    self
      .fields
      .get(index)
      .map(|f| f.input.value().to_string())
      .unwrap_or_default()
  }

  /// Trimmed value, `None` when blank
  pub fn optional_value(&self, index: usize) -> Option<String> {
    Some(self.value(index)).filter(|v| !v.is_empty())
  }

  pub fn focus(&mut self, index: usize) {
    if index < self.fields.len() {
      self.focused = index;
    }
  }

  pub fn set_error(&mut self, error: impl Into<String>) {
    self.error = Some(error.into());
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    let count = self.fields.len();
    match key.code {
      KeyCode::Tab | KeyCode::Down if count > 0 => {
        self.focused = (self.focused + 1) % count;
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up if count > 0 => {
        self.focused = (self.focused + count - 1) % count;
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focused) else {
      return KeyResult::NotHandled;
    };

    match field.input.handle_key(key) {
      InputResult::Submitted(_) => KeyResult::Event(FormEvent::Submitted),
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Consumed => {
        self.error = None;
        KeyResult::Handled
      }
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Rows needed to render every field plus the error line
  pub fn height(&self) -> u16 {
    self.fields.len() as u16 + 2
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.len() + usize::from(f.required))
      .max()
      .unwrap_or(0)
      + 2;

    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let focused = i == self.focused;
        let label = format!(
          "{:<width$}",
          format!("{}{}:", field.label, if field.required { "*" } else { "" }),
          width = label_width
        );
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::DarkGray)
        };

        let mut spans = vec![
          Span::styled(label, label_style),
          Span::raw(field.display_value()),
        ];
        if focused {
          spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        }
        if field.input.is_empty() {
          if let Some(hint) = field.hint {
            spans.push(Span::styled(
              format!(" {}", hint),
              Style::default().fg(Color::DarkGray).italic(),
            ));
          }
        }
        Line::from(spans)
      })
      .collect();

    lines.push(Line::raw(""));
    match &self.error {
      Some(error) => lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red))),
      None => lines.push(Line::styled(
        "Tab: next field  Enter: submit  Esc: cancel",
        Style::default().fg(Color::DarkGray),
      )),
    }

    frame.render_widget(Paragraph::new(lines), area);
  }
}
