use crate::cache::CacheSource;
use crate::desk::Snapshot;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with title, connection state, counts and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  snapshot: &Snapshot,
  shortcuts: &[ShortcutInfo],
) {
  let sep = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let (badge, badge_color) = connection_badge(snapshot);

  let mut spans = vec![
    Span::styled(" pawdesk ", Style::default().fg(Color::Cyan).bold()),
    sep(),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    sep(),
    Span::styled(format!(" {} ", badge), Style::default().fg(badge_color).bold()),
    sep(),
  ];

  if let Some(user) = &snapshot.user {
    spans.push(Span::styled(
      format!(" {} ", user),
      Style::default().fg(Color::Magenta),
    ));
    spans.push(sep());
  }

  let counts = snapshot.counts;
  spans.extend([
    Span::styled(
      format!(" {} pending", counts.pending),
      Style::default().fg(Color::Yellow),
    ),
    Span::styled(
      format!("  {} accepted", counts.accepted),
      Style::default().fg(Color::Cyan),
    ),
    Span::styled(
      format!("  {} completed ", counts.completed),
      Style::default().fg(Color::Green),
    ),
    Span::raw(" "),
  ]);

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    // Keys and brackets highlighted, descriptions dimmed
    spans.push(Span::styled(
      format!(" <{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn connection_badge(snapshot: &Snapshot) -> (&'static str, Color) {
  if snapshot.loading {
    ("Connecting...", Color::DarkGray)
  } else if snapshot.mode.is_connected() {
    match snapshot.source {
      Some(CacheSource::Cache) => ("Live (cached)", Color::Yellow),
      _ => ("Live", Color::Green),
    }
  } else {
    ("Offline", Color::Yellow)
  }
}
