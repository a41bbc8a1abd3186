use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use parking_lot::RwLock;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal};
use scopeguard::defer;
use std::collections::HashMap;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::export::export_csv_file;
use crate::registry::VantagePoint;
use crate::run::{ProbeClient, RunEngine};
use crate::safety::{classify_host, GateState, SafetyValidator};
use crate::sim::Simulation;
use crate::state::{Session, TargetSpec};
use crate::tui::theme::Theme;
use crate::tui::views::{HelpView, MapView, TableView};

/// UI state
#[derive(Default)]
pub struct UiState {
    /// Host input buffer (target bar)
    pub host_input: String,
    /// Whether the target bar is in edit mode
    pub editing: bool,
    /// Show help overlay
    pub show_help: bool,
    /// Status message to display
    pub status_message: Option<(String, Instant)>,
    /// Current theme index
    pub theme_index: usize,
    /// Schedule token of the running engine, if any
    pub schedule: Option<CancellationToken>,
    /// Last observed sent counter per vantage point, for packet spawning
    pub seen_sent: HashMap<String, u64>,
}

impl UiState {
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    pub fn clear_old_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.schedule.is_some()
    }
}

/// Run the TUI application. Returns the final theme name for persistence.
#[allow(clippy::too_many_arguments)]
pub async fn run_tui(
    config: Config,
    vps: Vec<&'static VantagePoint>,
    session: Arc<RwLock<Session>>,
    client: Arc<ProbeClient>,
    validator: Arc<SafetyValidator>,
    cancel: CancellationToken,
    initial_theme: Theme,
) -> Result<String> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    // Ensure terminal is restored on any exit (success, error, or panic)
    defer! {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let theme_names = Theme::list();
    let initial_index = theme_names
        .iter()
        .position(|&name| name == initial_theme.name())
        .unwrap_or(0);

    let mut ui_state = UiState {
        host_input: session.read().target.host.clone(),
        theme_index: initial_index,
        ..Default::default()
    };

    // The simulation surface lives as long as the view does
    let mut sim = Simulation::new();
    let tick_rate = Duration::from_millis(100);

    run_app(
        &mut terminal,
        &config,
        &vps,
        session,
        client,
        validator,
        &mut ui_state,
        &mut sim,
        cancel,
        tick_rate,
    )
    .await?;

    Ok(theme_names[ui_state.theme_index].to_string())
}

#[allow(clippy::too_many_arguments)]
async fn run_app<B>(
    terminal: &mut Terminal<B>,
    config: &Config,
    vps: &[&'static VantagePoint],
    session: Arc<RwLock<Session>>,
    client: Arc<ProbeClient>,
    validator: Arc<SafetyValidator>,
    ui_state: &mut UiState,
    sim: &mut Simulation,
    cancel: CancellationToken,
    tick_rate: Duration,
) -> Result<()>
where
    B: ratatui::backend::Backend,
{
    let theme_names = Theme::list();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        ui_state.clear_old_status();

        let now = Instant::now();
        if sim.is_active() {
            sim.advance(now);
        }
        spawn_new_packets(config, &session, ui_state, sim, now);

        let theme = Theme::by_name(theme_names[ui_state.theme_index]);
        let gate = validator.state();

        terminal.draw(|f| {
            let session = session.read();
            draw_ui(f, &session, sim, ui_state, &gate, &theme, now);
        })?;

        // Handle input with timeout
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if ui_state.show_help {
                    ui_state.show_help = false;
                    continue;
                }

                if ui_state.editing {
                    handle_edit_key(key.code, ui_state, &validator);
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') => {
                        stop(ui_state);
                        cancel.cancel();
                        break;
                    }
                    KeyCode::Char('?') | KeyCode::Char('h') => {
                        ui_state.show_help = true;
                    }
                    KeyCode::Char('e') => {
                        ui_state.editing = true;
                    }
                    KeyCode::Char('s') => {
                        if ui_state.is_running() {
                            stop(ui_state);
                            ui_state.set_status("Stopped (in-flight probes still land)");
                        } else {
                            try_start(config, vps, &session, &client, &validator, ui_state);
                        }
                    }
                    KeyCode::Char('p') => {
                        let mut session = session.write();
                        session.paused = !session.paused;
                        let msg = if session.paused { "Paused" } else { "Resumed" };
                        drop(session);
                        ui_state.set_status(msg);
                    }
                    KeyCode::Char('c') => {
                        stop(ui_state);
                        session.write().clear();
                        ui_state.seen_sent.clear();
                        ui_state.set_status("Cleared");
                    }
                    KeyCode::Char('t') => {
                        ui_state.theme_index = (ui_state.theme_index + 1) % theme_names.len();
                        ui_state.set_status(format!("Theme: {}", theme_names[ui_state.theme_index]));
                    }
                    KeyCode::Char('w') => {
                        write_csv(&session, ui_state);
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

/// Every keystroke in the target bar re-triggers the debounced safety check
fn handle_edit_key(code: KeyCode, ui_state: &mut UiState, validator: &Arc<SafetyValidator>) {
    match code {
        KeyCode::Esc | KeyCode::Enter => {
            ui_state.editing = false;
        }
        KeyCode::Backspace => {
            ui_state.host_input.pop();
            validator.submit(ui_state.host_input.clone());
        }
        KeyCode::Char(c) if !c.is_whitespace() => {
            ui_state.host_input.push(c);
            validator.submit(ui_state.host_input.clone());
        }
        _ => {}
    }
}

/// Gate and launch a run: valid host syntax, settled safety check, not
/// already running
fn try_start(
    config: &Config,
    vps: &[&'static VantagePoint],
    session: &Arc<RwLock<Session>>,
    client: &Arc<ProbeClient>,
    validator: &Arc<SafetyValidator>,
    ui_state: &mut UiState,
) {
    let host = ui_state.host_input.trim().to_string();
    if host.is_empty() {
        ui_state.set_status("Enter a target host first (e)");
        return;
    }
    if classify_host(&host).is_none() {
        ui_state.set_status(format!("Invalid host: {}", host));
        return;
    }

    let gate = validator.state();
    if gate.validating {
        ui_state.set_status("Validating target, try again in a moment");
        return;
    }
    if let Some(error) = gate.error {
        ui_state.set_status(error);
        return;
    }

    let port = session.read().target.port;
    *session.write() = Session::new(TargetSpec::new(host, port), config.clone(), vps);
    ui_state.seen_sent.clear();

    ui_state.schedule = Some(RunEngine::spawn(
        config.clone(),
        vps.to_vec(),
        session.clone(),
        client.clone(),
    ));
    ui_state.set_status("Probing started");
}

/// Cancel the recurring schedule only; outstanding requests keep running
fn stop(ui_state: &mut UiState) {
    if let Some(schedule) = ui_state.schedule.take() {
        schedule.cancel();
    }
}

/// Compare each record's sent counter against the last observed value and
/// spawn one packet per newly arrived result. The simulation only ever
/// reads orchestration state.
fn spawn_new_packets(
    config: &Config,
    session: &Arc<RwLock<Session>>,
    ui_state: &mut UiState,
    sim: &mut Simulation,
    now: Instant,
) {
    let session = session.read();
    for record in &session.records {
        let seen = ui_state.seen_sent.get(&record.id).copied().unwrap_or(0);
        if record.sent <= seen {
            continue;
        }

        if let Some(vp) = crate::registry::get(&record.id) {
            let failed = record.status == crate::state::RegionStatus::Failed;
            let latency = if failed { None } else { record.last_ms() };
            for _ in seen..record.sent {
                sim.spawn_packet(vp, latency, config.origin, config.target_coord, failed, now);
            }
        }
        ui_state.seen_sent.insert(record.id.clone(), record.sent);
    }
}

fn write_csv(session: &Arc<RwLock<Session>>, ui_state: &mut UiState) {
    let session = session.read();
    let filename = format!(
        "edgeping-{}-{}.csv",
        session.target.host.replace(['/', ':'], "_"),
        session.started_at.format("%Y%m%d-%H%M%S")
    );
    match export_csv_file(&session, std::path::Path::new(&filename)) {
        Ok(()) => ui_state.set_status(format!("Wrote {}", filename)),
        Err(e) => ui_state.set_status(format!("Export failed: {}", e)),
    }
}

fn draw_ui(
    f: &mut Frame,
    session: &Session,
    sim: &Simulation,
    ui_state: &UiState,
    gate: &GateState,
    theme: &Theme,
    now: Instant,
) {
    let table_height = (session.records.len() as u16 + 3).min(f.area().height / 2);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(table_height),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_target_bar(f, chunks[0], session, ui_state, gate, theme);
    f.render_widget(MapView::new(session, sim, theme, now), chunks[1]);
    f.render_widget(TableView::new(session, theme), chunks[2]);
    draw_status_bar(f, chunks[3], ui_state, theme);

    if ui_state.show_help {
        f.render_widget(HelpView::new(theme), f.area());
    }
}

fn draw_target_bar(
    f: &mut Frame,
    area: Rect,
    session: &Session,
    ui_state: &UiState,
    gate: &GateState,
    theme: &Theme,
) {
    let mut spans = vec![
        Span::styled(" Target ", Style::default().fg(theme.header).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("{}:{}", ui_state.host_input, session.target.port),
            Style::default().fg(theme.text),
        ),
    ];

    if ui_state.editing {
        spans.push(Span::styled("▏", Style::default().fg(theme.shortcut)));
        spans.push(Span::styled(
            "  (editing, Enter to confirm)",
            Style::default().fg(theme.text_dim),
        ));
    } else if gate.validating {
        spans.push(Span::styled(
            "  validating…",
            Style::default().fg(theme.warning),
        ));
    } else if let Some(error) = &gate.error {
        spans.push(Span::styled(
            format!("  ✕ {}", error),
            Style::default().fg(theme.error),
        ));
    } else if ui_state.is_running() {
        spans.push(Span::styled("  ● running", Style::default().fg(theme.success)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_status_bar(f: &mut Frame, area: Rect, ui_state: &UiState, theme: &Theme) {
    let line = if let Some((msg, _)) = &ui_state.status_message {
        Line::from(Span::styled(
            format!(" {}", msg),
            Style::default().fg(theme.warning),
        ))
    } else {
        Line::from(vec![
            Span::styled(" s", Style::default().fg(theme.shortcut)),
            Span::styled(" start/stop ", Style::default().fg(theme.text_dim)),
            Span::styled("e", Style::default().fg(theme.shortcut)),
            Span::styled(" target ", Style::default().fg(theme.text_dim)),
            Span::styled("c", Style::default().fg(theme.shortcut)),
            Span::styled(" clear ", Style::default().fg(theme.text_dim)),
            Span::styled("w", Style::default().fg(theme.shortcut)),
            Span::styled(" csv ", Style::default().fg(theme.text_dim)),
            Span::styled("?", Style::default().fg(theme.shortcut)),
            Span::styled(" help ", Style::default().fg(theme.text_dim)),
            Span::styled("q", Style::default().fg(theme.shortcut)),
            Span::styled(" quit", Style::default().fg(theme.text_dim)),
        ])
    };

    f.render_widget(Paragraph::new(line), area);
}
