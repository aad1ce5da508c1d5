//! Reusable TUI widgets.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom status bar. Errors get a red background.
pub(crate) fn status_bar(msg: &str, is_error: bool) -> Paragraph<'_> {
    let bg = if is_error { Color::Red } else { Color::DarkGray };
    Paragraph::new(format!(" {msg}"))
        .style(
            Style::default()
                .bg(bg)
                .fg(Color::White),
        )
}

/// Toggle rendered as `[x] label` / `[ ] label`.
pub(crate) fn toggle(label: &str, on: bool) -> Span<'static> {
    let mark = if on { "[x]" } else { "[ ]" };
    let style = if on {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Span::styled(format!("{mark} {label}"), style)
}
