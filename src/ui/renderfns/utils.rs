use crate::rescue::Status;
use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a request status
pub fn status_color(status: Status) -> Color {
  match status {
    Status::Pending => Color::Yellow,
    Status::Accepted => Color::Cyan,
    Status::Completed => Color::Green,
  }
}

/// Get the display color for an urgency level
pub fn urgency_color(urgency: &str) -> Color {
  match urgency {
    "critical" => Color::Red,
    "high" => Color::LightRed,
    "medium" => Color::Yellow,
    "low" => Color::Green,
    _ => Color::White,
  }
}

/// Relative age: "Just now", "5 minutes ago", "1 hour ago", "3 days ago"
pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let minutes = (now - timestamp).num_minutes();
  if minutes < 1 {
    return "Just now".to_string();
  }

  let (value, unit) = if minutes < 60 {
    (minutes, "minute")
  } else if minutes < 60 * 24 {
    (minutes / 60, "hour")
  } else {
    (minutes / (60 * 24), "day")
  };

  format!("{} {}{} ago", value, unit, if value == 1 { "" } else { "s" })
}
