//! Chat screen with the question input, web search toggle and conversation.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use researcher_shared::Exchange;

use crate::widgets::toggle;

/// What the app loop should do after a key press.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    /// Send this question to the pipeline.
    Submit(String),
    Quit,
}

pub(crate) struct ChatScreen {
    input: String,
    web: bool,
    history: Vec<Exchange>,
    /// Lines scrolled down from the newest message. Up moves toward newer
    /// messages, Down toward older ones.
    scroll: u16,
}

impl ChatScreen {
    pub(crate) fn new(web: bool) -> Self {
        Self {
            input: String::new(),
            web,
            history: Vec::new(),
            scroll: 0,
        }
    }

    pub(crate) fn web_enabled(&self) -> bool {
        self.web
    }

    pub(crate) fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub(crate) fn input(&self) -> &str {
        &self.input
    }

    /// Put a question back into an empty input box after a failed request.
    pub(crate) fn restore_input(&mut self, query: String) {
        if self.input.is_empty() {
            self.input = query;
        }
    }

    /// Record a finished exchange and jump back to the newest message.
    pub(crate) fn push_exchange(&mut self, exchange: Exchange) {
        self.history.push(exchange);
        self.scroll = 0;
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Action {
        if modifiers.contains(KeyModifiers::CONTROL) {
            return match code {
                KeyCode::Char('c') | KeyCode::Char('q') => Action::Quit,
                KeyCode::Char('w') => {
                    self.web = !self.web;
                    Action::None
                }
                KeyCode::Char('l') => {
                    self.history.clear();
                    self.scroll = 0;
                    Action::None
                }
                KeyCode::Char('u') => {
                    self.input.clear();
                    Action::None
                }
                _ => Action::None,
            };
        }

        match code {
            KeyCode::Enter => {
                if self.input.trim().is_empty() {
                    Action::None
                } else {
                    Action::Submit(std::mem::take(&mut self.input))
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
                Action::None
            }
            KeyCode::Esc => {
                self.input.clear();
                Action::None
            }
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                Action::None
            }
            KeyCode::Down => {
                self.scroll = self.scroll.saturating_add(1);
                Action::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
                Action::None
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                Action::None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Toggle
                Constraint::Length(3), // Input
                Constraint::Min(1),    // Conversation
            ])
            .split(area);

        // Toggle
        let toggle_line = Line::from(vec![
            Span::raw(" "),
            toggle("Enable web search", self.web),
            Span::styled("  (Ctrl-W)", Style::default().fg(Color::DarkGray)),
        ]);
        f.render_widget(Paragraph::new(toggle_line), chunks[0]);

        // Input
        let input_block = Block::default()
            .borders(Borders::ALL)
            .title(" You: ")
            .border_style(Style::default().fg(Color::Yellow));
        let input = Paragraph::new(self.input.as_str()).block(input_block);
        f.render_widget(input, chunks[1]);
        f.set_cursor_position(Position::new(
            chunks[1].x + 1 + self.input.chars().count() as u16,
            chunks[1].y + 1,
        ));

        // Conversation, most recent first
        let conversation = Paragraph::new(self.conversation_lines())
            .block(Block::default().borders(Borders::ALL).title(" Conversation "))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        f.render_widget(conversation, chunks[2]);
    }

    fn conversation_lines(&self) -> Vec<Line<'_>> {
        if self.history.is_empty() {
            return vec![Line::styled(
                "Ask anything. Enter sends, Ctrl-L clears the chat.",
                Style::default().fg(Color::DarkGray),
            )];
        }

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = Vec::new();
        for exchange in self.history.iter().rev() {
            lines.push(Line::from(vec![
                Span::styled("You: ", bold.fg(Color::Cyan)),
                Span::raw(exchange.query.as_str()),
            ]));
            lines.push(Line::styled("AI:", bold.fg(Color::Green)));
            lines.extend(exchange.response.lines().map(Line::raw));
            lines.push(Line::styled("─".repeat(40), Style::default().fg(Color::DarkGray)));
        }
        lines
    }
}
