/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "pending",
    aliases: &["p", "open"],
    description: "Requests waiting for a helper",
  },
  Command {
    name: "accepted",
    aliases: &["a", "active", "completed"],
    description: "Accepted and completed requests",
  },
  Command {
    name: "new",
    aliases: &["n", "submit", "report"],
    description: "Report a new emergency",
  },
  Command {
    name: "refresh",
    aliases: &["r", "sync", "reload"],
    description: "Re-sync with the backend",
  },
  Command {
    name: "login",
    aliases: &["signin"],
    description: "Sign in to the backend",
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "End the backend session",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit pawdesk",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
