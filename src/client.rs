use crate::{
    backend::{
        BackendClient,
        RoundApi,
    },
    config::AppConfig,
    frame::{
        EffectTicker,
        FrameTicker,
    },
    round::{
        Phase,
        RoundId,
    },
    session,
    synchronizer::{
        Clock,
        RoundSynchronizer,
        SyncEvent,
        SystemClock,
    },
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::Instant,
};

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug)]
pub struct RoundView {
    pub phase: Phase,
    pub multiplier: f64,
    pub crash_at: Option<f64>,
    pub round_id: Option<RoundId>,
    pub has_bet: bool,
    pub can_place_bet: bool,
    pub can_cash_out: bool,
    pub can_request_next: bool,
    pub cashout_at: Option<f64>,
    /// Seconds since the round entered `Running`, drives the bob animation.
    pub running_secs: f64,
    /// Seconds since the crash was detected, drives the crash effect.
    pub crashed_secs: Option<f64>,
    pub backend: String,
    pub player_id: String,
}

impl RoundView {
    pub fn capture<A: RoundApi, C: Clock>(
        sync: &RoundSynchronizer<A, C>,
        backend: &str,
        now: Instant,
    ) -> Self {
        let since = |at: Instant| now.saturating_duration_since(at).as_secs_f64();
        let round = sync.round();
        RoundView {
            phase: sync.phase(),
            multiplier: sync.multiplier(),
            crash_at: round.map(|r| r.crash_at),
            round_id: round.map(|r| r.id.clone()),
            has_bet: sync.has_bet(),
            can_place_bet: sync.can_place_bet(),
            can_cash_out: sync.can_cash_out(),
            can_request_next: sync.can_request_next_round(),
            cashout_at: sync.cashout_at(),
            running_secs: sync.running_since().map(since).unwrap_or(0.0),
            crashed_secs: sync.crashed_since().map(since),
            backend: backend.to_string(),
            player_id: sync.player_id().to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Exit,
}

/// Forwards a user intent to the synchronizer. Intents the current phase
/// does not allow are dropped there.
fn dispatch<A: RoundApi, C: Clock>(
    sync: &mut RoundSynchronizer<A, C>,
    ui_state: &ui::UiState,
    event: ui::UserEvent,
) -> LoopControl {
    match event {
        ui::UserEvent::Quit => return LoopControl::Exit,
        ui::UserEvent::PlaceBet => {
            if !sync.place_bet(ui_state.slip()) {
                tracing::debug!(phase = %sync.phase(), "bet not allowed now");
            }
        }
        ui::UserEvent::CashOut => {
            if !sync.cash_out() {
                tracing::debug!(phase = %sync.phase(), "cashout not allowed now");
            }
        }
        ui::UserEvent::NextRound => {
            sync.request_next_round();
        }
        ui::UserEvent::Redraw => {}
    }
    LoopControl::Continue
}

/// Keeps the crash overlay animating after the frame ticks are released.
fn sync_effects(effects: &mut EffectTicker, crashed_since: Option<Instant>, now: Instant) {
    match crashed_since {
        Some(since) => {
            let deadline = since + Duration::from_secs_f64(ui::CRASH_EFFECT_SECS);
            effects.play_until(deadline, now);
        }
        None => effects.stop(),
    }
}

/// Runs the game until the user quits. Expects [`session::init`] to have
/// installed the player id.
pub async fn run_app(config: &AppConfig) -> Result<()> {
    let player_id = session::player_id()
        .cloned()
        .ok_or_else(|| eyre!("player id not initialised; call session::init first"))?;
    let api = BackendClient::new(config.backend_url.as_str())?;
    let backend = api.base_url().to_string();
    let (mut sync, sync_events) = RoundSynchronizer::new(api, SystemClock, player_id);
    let mut frames = FrameTicker::new(config.fps);
    let mut effects = EffectTicker::new(config.fps);
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!(%backend, player_id = %sync.player_id(), "Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    sync.fetch_current_round();
    let res = run_loop(
        &mut sync,
        sync_events,
        &mut frames,
        &mut effects,
        &mut ui_state,
        &mut input_events,
        &backend,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<A: RoundApi, C: Clock>(
    sync: &mut RoundSynchronizer<A, C>,
    mut sync_events: mpsc::UnboundedReceiver<SyncEvent>,
    frames: &mut FrameTicker,
    effects: &mut EffectTicker,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    backend: &str,
) -> Result<()> {
    tracing::info!("Running app loop");
    ui::draw(ui_state, &RoundView::capture(sync, backend, Instant::now()))
        .wrap_err("initial draw failed")?;

    loop {
        let redraw = tokio::select! {
            maybe_event = sync_events.recv() => {
                match maybe_event {
                    Some(event) => sync.handle_event(event),
                    None => {
                        tracing::warn!("synchronizer channel closed");
                        break;
                    }
                }
            }
            now = frames.next_frame() => {
                sync.on_frame(now);
                true
            }
            _ = effects.next_frame() => true,
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                if dispatch(sync, ui_state, ev) == LoopControl::Exit {
                    break;
                }
                true
            }
        };
        frames.sync(sync.phase());
        sync_effects(effects, sync.crashed_since(), Instant::now());
        if redraw {
            let view = RoundView::capture(sync, backend, Instant::now());
            ui::draw(ui_state, &view).wrap_err("draw failed")?;
        }
    }
    tracing::info!("app loop finished");
    Ok(())
}
