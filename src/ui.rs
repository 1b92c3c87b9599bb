use crate::{
    client::RoundView,
    round::{
        Phase,
        format_multiplier,
    },
    synchronizer::BetSlip,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;

const CHICKEN_SPRITE: [&str; 3] = [" (o> ", "//|\\ ", " ^ ^ "];
const CHICKEN_WIDTH: u16 = 5;
const BOB_PERIOD_SECS: f64 = 0.8;
pub const CRASH_EFFECT_SECS: f64 = 0.8;
const DISCLAIMER: &str = "Provably-fair seed on server. This is a demo; not real gambling.";
const AMBER: Color = Color::Rgb(252, 211, 77);
const EMERALD: Color = Color::Rgb(52, 211, 153);

pub type InputEventReceiver = EventStream;

#[derive(Debug, PartialEq)]
pub enum UserEvent {
    Quit,
    PlaceBet,
    CashOut,
    NextRound,
    Redraw,
}

#[derive(Default)]
pub struct UiState {
    slip: BetSlip,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl UiState {
    pub fn slip(&self) -> &BetSlip {
        &self.slip
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, view: &RoundView) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let res = term.draw(|f| render(f, state, view)).map(|_| ());
        state.terminal = Some(term);
        res?;
    }
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        _ => return None,
    };
    // raw mode swallows SIGINT, so Ctrl-C arrives as a key
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    Some(match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UserEvent::Quit,
        KeyCode::Char('b') => UserEvent::PlaceBet,
        KeyCode::Char('c') => UserEvent::CashOut,
        KeyCode::Char('n') => UserEvent::NextRound,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
            state.slip.adjust_amount(1);
            UserEvent::Redraw
        }
        KeyCode::Char('-') | KeyCode::Down => {
            state.slip.adjust_amount(-1);
            UserEvent::Redraw
        }
        KeyCode::Char(']') | KeyCode::Right => {
            state.slip.adjust_auto_cashout(1);
            UserEvent::Redraw
        }
        KeyCode::Char('[') | KeyCode::Left => {
            state.slip.adjust_auto_cashout(-1);
            UserEvent::Redraw
        }
        _ => return None,
    })
}

/// Share of the road covered: `min(1, multiplier / crash_at)`, 0 without a round.
pub fn track_progress(multiplier: f64, crash_at: Option<f64>) -> f64 {
    match crash_at {
        Some(crash_at) if crash_at > 0.0 => (multiplier / crash_at).min(1.0),
        _ => 0.0,
    }
}

/// Column of the chicken's left edge: 2% margin plus 92% of the road.
fn chicken_column(progress: f64, road_width: u16) -> u16 {
    let fraction = progress.clamp(0.0, 1.0) * 0.92 + 0.02;
    let column = (fraction * f64::from(road_width)).floor() as u16;
    column.min(road_width.saturating_sub(CHICKEN_WIDTH))
}

/// One row of lift during the middle half of each bob period.
fn bob_lift(running_secs: f64) -> u16 {
    let phase = (running_secs.max(0.0) % BOB_PERIOD_SECS) / BOB_PERIOD_SECS;
    u16::from((0.25..0.75).contains(&phase))
}

/// Overlay scale keyframes 0.6 -> 1.4 -> 1.0 over the crash effect.
fn crash_scale(since_crash_secs: f64) -> f64 {
    let t = (since_crash_secs / CRASH_EFFECT_SECS).clamp(0.0, 1.0);
    if t <= 0.4 {
        0.6 + 0.8 * (t / 0.4)
    } else {
        1.4 - 0.4 * ((t - 0.4) / 0.6)
    }
}

fn render(f: &mut Frame, state: &UiState, view: &RoundView) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title + multiplier
            Constraint::Min(9),    // road
            Constraint::Length(5), // controls + status
            Constraint::Length(4), // help + disclaimer
        ])
        .split(f.area());

    draw_header(f, chunks[0], view);
    draw_road(f, chunks[1], view);
    draw_controls(f, chunks[2], state, view);
    draw_footer(f, chunks[3], view);
    if view.phase == Phase::Crashed {
        draw_crash_effect(f, chunks[1], view.crashed_secs.unwrap_or(CRASH_EFFECT_SECS));
    }
}

fn draw_header(f: &mut Frame, area: Rect, view: &RoundView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(14)])
        .split(area);
    let title = Paragraph::new(Line::from(vec![
        Span::styled("🐔 ", Style::default().fg(AMBER)),
        Span::styled(
            "Chicken Road Crash",
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, cols[0]);

    let readout = Paragraph::new(format_multiplier(view.multiplier))
        .alignment(Alignment::Right)
        .style(Style::default().fg(EMERALD).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(readout, cols[1]);
}

fn draw_road(f: &mut Frame, area: Rect, view: &RoundView) {
    let block = Block::default().borders(Borders::ALL).title("Road");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < 5 || inner.width < CHICKEN_WIDTH {
        return;
    }

    // lane markings sit just below the chicken's feet
    let lane_y = inner.y + inner.height / 2 + 2;
    if lane_y < inner.y + inner.height {
        let dashes: String = "━━━   "
            .chars()
            .cycle()
            .take(usize::from(inner.width))
            .collect();
        f.render_widget(
            Paragraph::new(dashes).style(Style::default().fg(Color::DarkGray)),
            Rect::new(inner.x, lane_y, inner.width, 1),
        );
    }

    let progress = track_progress(view.multiplier, view.crash_at);
    let column = chicken_column(progress, inner.width);
    let lift = if view.phase == Phase::Running {
        bob_lift(view.running_secs)
    } else {
        0
    };
    let sprite_top = (lane_y - 3).saturating_sub(lift).max(inner.y + 1);
    let color = if view.phase == Phase::Crashed {
        Color::Red
    } else {
        AMBER
    };

    let badge = format_multiplier(view.multiplier);
    let badge_width = (badge.chars().count() as u16).min(inner.width);
    let badge_x = (inner.x + column).min(inner.x + inner.width - badge_width);
    f.render_widget(
        Paragraph::new(badge).style(Style::default().fg(EMERALD)),
        Rect::new(badge_x, sprite_top - 1, badge_width, 1),
    );

    let sprite: Vec<Line> = CHICKEN_SPRITE
        .iter()
        .map(|row| Line::styled(*row, Style::default().fg(color)))
        .collect();
    f.render_widget(
        Paragraph::new(sprite),
        Rect::new(inner.x + column, sprite_top, CHICKEN_WIDTH, 3),
    );
}

fn draw_controls(f: &mut Frame, area: Rect, state: &UiState, view: &RoundView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(25),
            Constraint::Percentage(35),
        ])
        .split(area);

    let bet = Paragraph::new(format!("{:.1}", state.slip.amount))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title("Bet (+/-)"));
    f.render_widget(bet, cols[0]);

    let auto = Paragraph::new(format_multiplier(state.slip.auto_cashout))
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title("Auto ([/])"));
    f.render_widget(auto, cols[1]);

    let (label, enabled, accent) = if view.has_bet {
        ("▣ [c] Cashout", view.can_cash_out, AMBER)
    } else {
        ("▶ [b] Place Bet", view.can_place_bet, EMERALD)
    };
    let style = if enabled {
        Style::default().fg(accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let action = Paragraph::new(label)
        .style(style)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(style));
    f.render_widget(action, cols[2]);

    let mut lines = vec![Line::styled(
        view.phase.label(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if let Some(at) = view.cashout_at {
        lines.push(Line::styled(
            format!("Cashed out at {}", format_multiplier(at)),
            Style::default().fg(EMERALD),
        ));
    } else if view.can_request_next {
        lines.push(Line::styled(
            "[n] Next round",
            Style::default().fg(Color::DarkGray),
        ));
    }
    let status = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Round status"));
    f.render_widget(status, cols[3]);
}

fn draw_footer(f: &mut Frame, area: Rect, view: &RoundView) {
    let round = view
        .round_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let lines = vec![
        Line::from(
            "b bet | c cashout | n next round | +/- amount | [/] auto cashout | q quit",
        ),
        Line::styled(
            format!(
                "{DISCLAIMER}  Round {round} | Backend {} | Player {}",
                view.backend, view.player_id
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    let help =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_crash_effect(f: &mut Frame, road: Rect, since_crash_secs: f64) {
    let scale = crash_scale(since_crash_secs);
    let w = ((30.0 * scale).round() as u16).clamp(10, 100);
    let h = ((50.0 * scale).round() as u16).clamp(10, 100);
    let rect = centered_rect(w, h, road);
    if rect.height < 3 {
        return;
    }
    let style = Style::default()
        .fg(Color::White)
        .bg(Color::Red)
        .add_modifier(Modifier::BOLD);
    let boom = Paragraph::new(Line::from("CRASH!"))
        .alignment(Alignment::Center)
        .style(style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
    f.render_widget(Clear, rect);
    f.render_widget(boom, rect);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
