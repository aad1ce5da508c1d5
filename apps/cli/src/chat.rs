//! Line parsing for the interactive `chat` session.

/// Help text shown for `/help`.
pub(crate) const HELP: &str = "\
Commands:
  /web       Toggle web search on or off
  /history   Show the conversation so far
  /clear     Clear the conversation
  /help      Show this help
  /quit      Exit (also Ctrl-D)
Anything else is sent as a question.";

/// One line of user input, classified.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ChatInput {
    Empty,
    Quit,
    Help,
    ToggleWeb,
    Clear,
    History,
    Unknown(String),
    Query(String),
}

pub(crate) fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return ChatInput::Query(trimmed.to_string());
    };

    match command.to_ascii_lowercase().as_str() {
        "quit" | "exit" | "q" => ChatInput::Quit,
        "help" | "?" => ChatInput::Help,
        "web" => ChatInput::ToggleWeb,
        "clear" => ChatInput::Clear,
        "history" => ChatInput::History,
        _ => ChatInput::Unknown(trimmed.to_string()),
    }
}

pub(crate) fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
