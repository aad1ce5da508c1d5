//! Core TUI application state and event loop.

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use researcher_core::{PipelineOutput, PipelineProgress, ResponsePipeline};
use researcher_shared::{Exchange, config_dir, load_config, validate_config};
use tracing::{info, warn};

use crate::screens::{Action, ChatScreen};
use crate::widgets::status_bar;

const READY: &str = "Ready — F1 for help";

/// How often the screen is redrawn while a request is in flight.
const BUSY_REDRAW: Duration = Duration::from_millis(100);

/// Holds the latest pipeline phase until the event loop shows it.
#[derive(Default)]
struct StatusProgress {
    phase: Mutex<Option<String>>,
}

impl StatusProgress {
    fn take(&self) -> Option<String> {
        self.phase.lock().ok().and_then(|mut phase| phase.take())
    }
}

impl PipelineProgress for StatusProgress {
    fn phase(&self, name: &str) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = Some(name.to_string());
        }
    }
}

/// Application state.
pub(crate) struct App {
    /// The chat page.
    pub screen: ChatScreen,
    /// Pipeline answering submitted questions.
    pub pipeline: ResponsePipeline,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether the status is an error message.
    pub status_is_error: bool,
    /// Whether help overlay is visible.
    pub show_help: bool,
}

impl App {
    pub(crate) fn new(pipeline: ResponsePipeline) -> Self {
        Self {
            screen: ChatScreen::new(false),
            pipeline,
            should_quit: false,
            status: READY.to_string(),
            status_is_error: false,
            show_help: false,
        }
    }

    fn set_status(&mut self, msg: impl Into<String>, is_error: bool) {
        self.status = msg.into();
        self.status_is_error = is_error;
    }

    /// Record the outcome of one request. A failed question goes back into
    /// the input box.
    fn finish_request(
        &mut self,
        query: String,
        web: bool,
        result: researcher_shared::Result<PipelineOutput>,
    ) {
        match result {
            Ok(output) => {
                let status = if web {
                    format!("Answered using {} web results", output.sources.len())
                } else {
                    READY.to_string()
                };
                self.screen.push_exchange(Exchange::new(query, output.response));
                self.set_status(status, false);
            }
            Err(e) => {
                warn!(error = %e, "request failed");
                self.screen.restore_input(query);
                self.set_status(
                    format!("Sorry, there was an error generating a response: {e}"),
                    true,
                );
            }
        }
    }
}

/// Answer one question, calling `redraw` while it runs so the status bar
/// follows the pipeline phases.
async fn submit<F>(app: &mut App, query: String, mut redraw: F) -> Result<()>
where
    F: FnMut(&App) -> Result<()>,
{
    let progress = StatusProgress::default();
    let web = app.screen.web_enabled();

    let result = {
        let request = app
            .pipeline
            .respond(&query, web, app.screen.history(), &progress);
        tokio::pin!(request);

        loop {
            tokio::select! {
                result = &mut request => break result,
                _ = tokio::time::sleep(BUSY_REDRAW) => {
                    if let Some(phase) = progress.take() {
                        app.status = phase;
                        app.status_is_error = false;
                    }
                    redraw(&*app)?;
                }
            }
        }
    };

    app.finish_request(query, web, result);
    Ok(())
}

/// Send logs to `~/.researcher/researcher-tui.log`; stderr would corrupt the
/// alternate screen. Logging is skipped if the file cannot be opened.
pub(crate) fn init_tracing() {
    use std::sync::Mutex;
    use tracing_subscriber::{EnvFilter, fmt};

    let Ok(dir) = config_dir() else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("researcher-tui.log"))
    else {
        return;
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("researcher=info"));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

/// Entry point: load config, set up the terminal, run the event loop, restore.
pub(crate) async fn run() -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;
    let pipeline = ResponsePipeline::from_app_config(&config)?;
    info!(model = %config.inference.model, "starting TUI");

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let mut app = App::new(pipeline);
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(query) = handle_key(app, key.code, key.modifiers) {
                    submit(app, query, |app| {
                        terminal.draw(|f| draw(f, app))?;
                        Ok(())
                    })
                    .await?;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Route a key press. Returns a question to submit, if any.
fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return None;
    }

    if code == KeyCode::F(1) {
        app.show_help = true;
        return None;
    }

    match app.screen.handle_key(code, modifiers) {
        Action::Quit => {
            app.should_quit = true;
            None
        }
        Action::Submit(query) => Some(query),
        Action::None => {
            if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('l') {
                app.set_status("Chat cleared", false);
            }
            None
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Title
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "AI Research Assistant",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  ·  model {}", app.pipeline.config().model),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Researcher "));
    f.render_widget(title, chunks[0]);

    // Content area, delegated to the screen
    app.screen.draw(f, chunks[1]);

    // Status bar
    let bar = status_bar(&app.status, app.status_is_error);
    f.render_widget(bar, chunks[2]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  Enter        Send question"),
        Line::from("  Ctrl-W       Toggle web search"),
        Line::from("  Ctrl-L       Clear chat"),
        Line::from("  Esc / Ctrl-U Clear input"),
        Line::from("  ↑/↓ PgUp/Dn  Scroll newer / older"),
        Line::from("  F1           Toggle this help"),
        Line::from("  Ctrl-C       Quit"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help — press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
