//! Local view of the backend's current round.
//!
//! The synchronizer owns the round snapshot, the phase and the per-session bet
//! flags. Network calls and the betting -> running timer run as spawned tasks
//! that report back through [`SyncEvent`]s; only [`RoundSynchronizer::handle_event`]
//! and the frame/intent methods mutate state, so everything is evaluated
//! against a single round snapshot.

use crate::{
    backend::{
        BetRequest,
        CashoutReceipt,
        RoundApi,
    },
    round::{
        Phase,
        Round,
        RoundId,
        check_crash,
        compute_multiplier,
        format_multiplier,
    },
    session::PlayerId,
};
use chrono::Utc;
use color_eyre::eyre::Result;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        Instant,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

pub const MIN_BET_AMOUNT: f64 = 0.1;
pub const BET_AMOUNT_STEP: f64 = 0.1;
pub const MIN_AUTO_CASHOUT: f64 = 1.01;
pub const AUTO_CASHOUT_STEP: f64 = 0.01;

/// Wall-clock source used to compare against the backend's `start_time`.
pub trait Clock: Send + Sync + 'static {
    fn now_epoch_secs(&self) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

/// The editable bet form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BetSlip {
    pub amount: f64,
    pub auto_cashout: f64,
}

impl Default for BetSlip {
    fn default() -> Self {
        BetSlip {
            amount: 1.0,
            auto_cashout: 2.0,
        }
    }
}

impl BetSlip {
    pub fn adjust_amount(&mut self, steps: i32) {
        let next = self.amount + f64::from(steps) * BET_AMOUNT_STEP;
        self.amount = round_to(next.max(MIN_BET_AMOUNT), 1);
    }

    pub fn adjust_auto_cashout(&mut self, steps: i32) {
        let next = self.auto_cashout + f64::from(steps) * AUTO_CASHOUT_STEP;
        self.auto_cashout = round_to(next.max(MIN_AUTO_CASHOUT), 2);
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundSource {
    Current,
    Next,
}

#[derive(Debug)]
pub enum SyncEvent {
    RoundLoaded {
        request: u64,
        source: RoundSource,
        result: Result<Round>,
    },
    StartTimerFired {
        round_id: RoundId,
    },
    BetSettled {
        round_id: RoundId,
        result: Result<()>,
    },
    CashoutSettled {
        round_id: RoundId,
        at_multiplier: f64,
        result: Result<CashoutReceipt>,
    },
}

/// One-shot betting -> running transition armed for a specific round.
/// Dropping it aborts the sleeping task.
struct StartTimer {
    round_id: RoundId,
    handle: JoinHandle<()>,
}

impl Drop for StartTimer {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!(round_id = %self.round_id, "cancelling start timer");
        }
        self.handle.abort();
    }
}

pub struct RoundSynchronizer<A, C = SystemClock> {
    api: A,
    clock: C,
    player_id: PlayerId,
    events_tx: mpsc::UnboundedSender<SyncEvent>,
    round: Option<Round>,
    phase: Phase,
    has_bet: bool,
    bet_pending: bool,
    cashout_at: Option<f64>,
    cashout_pending: bool,
    multiplier: f64,
    running_since: Option<Instant>,
    crashed_since: Option<Instant>,
    start_timer: Option<StartTimer>,
    round_request: u64,
}

impl<A: RoundApi, C: Clock> RoundSynchronizer<A, C> {
    pub fn new(
        api: A,
        clock: C,
        player_id: PlayerId,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let synchronizer = Self {
            api,
            clock,
            player_id,
            events_tx,
            round: None,
            phase: Phase::Loading,
            has_bet: false,
            bet_pending: false,
            cashout_at: None,
            cashout_pending: false,
            multiplier: 1.0,
            running_since: None,
            crashed_since: None,
            start_timer: None,
            round_request: 0,
        };
        (synchronizer, events_rx)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn has_bet(&self) -> bool {
        self.has_bet
    }

    pub fn cashout_at(&self) -> Option<f64> {
        self.cashout_at
    }

    /// Multiplier as of the last frame.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn crashed_since(&self) -> Option<Instant> {
        self.crashed_since
    }

    pub fn running_since(&self) -> Option<Instant> {
        self.running_since
    }

    pub fn can_place_bet(&self) -> bool {
        self.phase == Phase::Betting
            && self.round.is_some()
            && !self.has_bet
            && !self.bet_pending
    }

    pub fn can_cash_out(&self) -> bool {
        self.phase == Phase::Running
            && self.round.is_some()
            && self.has_bet
            && self.cashout_at.is_none()
            && !self.cashout_pending
    }

    pub fn can_request_next_round(&self) -> bool {
        matches!(self.phase, Phase::Crashed | Phase::Loading)
    }

    pub fn fetch_current_round(&mut self) {
        let request = self.next_round_request();
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        debug!(request, "fetching current round");
        tokio::spawn(async move {
            let result = api.current_round().await;
            let _ = tx.send(SyncEvent::RoundLoaded {
                request,
                source: RoundSource::Current,
                result,
            });
        });
    }

    /// Moves to `Loading`, clears the bet flags and asks the backend for a new
    /// round. Returns `false` if a round is still in progress.
    pub fn request_next_round(&mut self) -> bool {
        if !self.can_request_next_round() {
            debug!(phase = %self.phase, "next round ignored while round in progress");
            return false;
        }
        self.phase = Phase::Loading;
        self.has_bet = false;
        self.bet_pending = false;
        self.cashout_at = None;
        self.cashout_pending = false;
        self.start_timer = None;
        self.running_since = None;
        self.crashed_since = None;

        let request = self.next_round_request();
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        info!(request, "requesting next round");
        tokio::spawn(async move {
            let result = api.next_round().await;
            let _ = tx.send(SyncEvent::RoundLoaded {
                request,
                source: RoundSource::Next,
                result,
            });
        });
        true
    }

    pub fn place_bet(&mut self, slip: &BetSlip) -> bool {
        if !self.can_place_bet() {
            return false;
        }
        let Some(round_id) = self.round.as_ref().map(|round| round.id.clone()) else {
            return false;
        };
        self.bet_pending = true;
        let bet = BetRequest {
            player_id: self.player_id.clone(),
            amount: slip.amount,
            auto_cashout: slip.auto_cashout,
        };
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        info!(%round_id, amount = bet.amount, auto_cashout = bet.auto_cashout, "placing bet");
        tokio::spawn(async move {
            let result = api.place_bet(&round_id, &bet).await;
            let _ = tx.send(SyncEvent::BetSettled { round_id, result });
        });
        true
    }

    pub fn cash_out(&mut self) -> bool {
        if !self.can_cash_out() {
            return false;
        }
        let Some(round_id) = self.round.as_ref().map(|round| round.id.clone()) else {
            return false;
        };
        self.cashout_pending = true;
        let at_multiplier = self.multiplier;
        let player_id = self.player_id.clone();
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        info!(%round_id, at = %format_multiplier(at_multiplier), "cashing out");
        tokio::spawn(async move {
            let result = api.cash_out(&round_id, &player_id, at_multiplier).await;
            let _ = tx.send(SyncEvent::CashoutSettled {
                round_id,
                at_multiplier,
                result,
            });
        });
        true
    }

    /// Recomputes the multiplier for this frame and detects the crash.
    /// Outside `Running` the last value is kept.
    pub fn on_frame(&mut self, now: Instant) -> f64 {
        if self.phase != Phase::Running {
            return self.multiplier;
        }
        let (Some(round), Some(since)) = (self.round.as_ref(), self.running_since) else {
            return self.multiplier;
        };
        let elapsed = now.saturating_duration_since(since).as_secs_f64();
        let multiplier = compute_multiplier(round, elapsed);
        self.multiplier = multiplier;
        if check_crash(multiplier, round) {
            info!(round_id = %round.id, crash_at = round.crash_at, "round crashed");
            self.phase = Phase::Crashed;
            self.crashed_since = Some(now);
            self.cashout_pending = false;
        }
        multiplier
    }

    /// Applies a completion event. Returns whether visible state changed.
    pub fn handle_event(&mut self, event: SyncEvent) -> bool {
        match event {
            SyncEvent::RoundLoaded {
                request,
                source,
                result,
            } => {
                if request != self.round_request {
                    debug!(request, latest = self.round_request, "dropping stale round response");
                    return false;
                }
                match result {
                    Ok(round) => {
                        self.apply_round(round);
                        true
                    }
                    Err(err) => {
                        error!(?err, ?source, "loading round failed");
                        false
                    }
                }
            }
            SyncEvent::StartTimerFired { round_id } => {
                let is_current = self
                    .round
                    .as_ref()
                    .is_some_and(|round| round.id == round_id);
                if !is_current || self.phase != Phase::Betting {
                    debug!(%round_id, phase = %self.phase, "ignoring stale start timer");
                    return false;
                }
                self.start_timer = None;
                self.enter_running();
                true
            }
            SyncEvent::BetSettled { round_id, result } => {
                if !self.is_current_round(&round_id) {
                    debug!(%round_id, "ignoring bet result for replaced round");
                    return false;
                }
                if let Err(err) = result {
                    error!(?err, %round_id, "placing bet failed");
                }
                self.bet_pending = false;
                self.has_bet = true;
                true
            }
            SyncEvent::CashoutSettled {
                round_id,
                at_multiplier,
                result,
            } => {
                if !self.is_current_round(&round_id) {
                    debug!(%round_id, "ignoring cashout result for replaced round");
                    return false;
                }
                self.cashout_pending = false;
                match result {
                    Ok(receipt) if receipt.is_confirmed() => {
                        info!(%round_id, at = %format_multiplier(at_multiplier), "cashout confirmed");
                        self.cashout_at = Some(at_multiplier);
                    }
                    Ok(receipt) => {
                        warn!(%round_id, profit = ?receipt.profit, "cashout not confirmed");
                    }
                    Err(err) => {
                        error!(?err, %round_id, "cashing out failed");
                    }
                }
                true
            }
        }
    }

    fn is_current_round(&self, round_id: &RoundId) -> bool {
        self.round.as_ref().is_some_and(|round| &round.id == round_id)
    }

    fn next_round_request(&mut self) -> u64 {
        self.round_request += 1;
        self.round_request
    }

    fn apply_round(&mut self, round: Round) {
        self.start_timer = None;
        self.multiplier = 1.0;
        self.running_since = None;
        self.crashed_since = None;
        let now = self.clock.now_epoch_secs();
        let delay = round.seconds_until_start(now);
        info!(
            round_id = %round.id,
            start_time = round.start_time,
            crash_at = round.crash_at,
            k = round.growth_rate(),
            "round loaded"
        );
        let round_id = round.id.clone();
        self.round = Some(round);
        match delay {
            Some(delay) => {
                self.phase = Phase::Betting;
                self.arm_start_timer(round_id, delay);
            }
            None => self.enter_running(),
        }
    }

    fn arm_start_timer(&mut self, round_id: RoundId, delay_secs: f64) {
        let delay = Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX);
        let tx = self.events_tx.clone();
        let fired_id = round_id.clone();
        debug!(%round_id, delay_secs, "arming start timer");
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(SyncEvent::StartTimerFired { round_id: fired_id });
        });
        self.start_timer = Some(StartTimer { round_id, handle });
    }

    fn enter_running(&mut self) {
        if let Some(round) = self.round.as_ref() {
            info!(round_id = %round.id, "round running");
        }
        self.phase = Phase::Running;
        self.multiplier = 1.0;
        self.running_since = Some(Instant::now());
    }

    #[cfg(test)]
    fn armed_timer_round(&self) -> Option<&RoundId> {
        self.start_timer.as_ref().map(|timer| &timer.round_id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use color_eyre::eyre::eyre;
    use std::{
        collections::VecDeque,
        sync::{
            Arc,
            Mutex,
        },
    };

    const NOW: f64 = 1_700_000_000.0;

    #[derive(Clone)]
    struct FixedClock(f64);

    impl Clock for FixedClock {
        fn now_epoch_secs(&self) -> f64 {
            self.0
        }
    }

    #[derive(Clone, Default)]
    struct FakeRoundApi {
        current: Arc<Mutex<VecDeque<Option<Round>>>>,
        next: Arc<Mutex<VecDeque<Option<Round>>>>,
        bets: Arc<Mutex<Vec<(RoundId, BetRequest)>>>,
        fail_bets: bool,
        cashouts: Arc<Mutex<Vec<(RoundId, PlayerId, f64)>>>,
        cashout_receipt: Option<CashoutReceipt>,
    }

    impl FakeRoundApi {
        fn with_current(self, round: Option<Round>) -> Self {
            self.current.lock().unwrap().push_back(round);
            self
        }

        fn with_next(self, round: Option<Round>) -> Self {
            self.next.lock().unwrap().push_back(round);
            self
        }
    }

    impl RoundApi for FakeRoundApi {
        async fn current_round(&self) -> Result<Round> {
            self.current
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .ok_or_else(|| eyre!("connection refused"))
        }

        async fn next_round(&self) -> Result<Round> {
            self.next
                .lock()
                .unwrap()
                .pop_front()
                .flatten()
                .ok_or_else(|| eyre!("connection refused"))
        }

        async fn place_bet(&self, round_id: &RoundId, bet: &BetRequest) -> Result<()> {
            self.bets
                .lock()
                .unwrap()
                .push((round_id.clone(), bet.clone()));
            if self.fail_bets {
                return Err(eyre!("connection reset"));
            }
            Ok(())
        }

        async fn cash_out(
            &self,
            round_id: &RoundId,
            player_id: &PlayerId,
            at_multiplier: f64,
        ) -> Result<CashoutReceipt> {
            self.cashouts.lock().unwrap().push((
                round_id.clone(),
                player_id.clone(),
                at_multiplier,
            ));
            self.cashout_receipt
                .ok_or_else(|| eyre!("connection reset"))
        }
    }

    fn receipt(profit: Option<f64>) -> CashoutReceipt {
        CashoutReceipt {
            profit: Some(profit),
        }
    }

    fn round(id: &str, start_offset: f64, crash_at: f64) -> Round {
        Round {
            id: RoundId::new(id),
            start_time: NOW + start_offset,
            crash_at,
            k: Some(0.25),
        }
    }

    fn synchronizer(
        api: FakeRoundApi,
    ) -> (
        RoundSynchronizer<FakeRoundApi, FixedClock>,
        mpsc::UnboundedReceiver<SyncEvent>,
    ) {
        RoundSynchronizer::new(api, FixedClock(NOW), PlayerId::from_raw("player-1"))
    }

    async fn pump(
        sync: &mut RoundSynchronizer<FakeRoundApi, FixedClock>,
        rx: &mut mpsc::UnboundedReceiver<SyncEvent>,
    ) -> bool {
        let event = rx.recv().await.unwrap();
        sync.handle_event(event)
    }

    async fn running_round(
        api: FakeRoundApi,
    ) -> (
        RoundSynchronizer<FakeRoundApi, FixedClock>,
        mpsc::UnboundedReceiver<SyncEvent>,
    ) {
        let (mut sync, mut rx) = synchronizer(api);
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;
        assert_eq!(sync.phase(), Phase::Running);
        (sync, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_current_round__start_in_past__runs_immediately() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", -5.0, 3.0)));
        let (mut sync, mut rx) = synchronizer(api);

        // when
        sync.fetch_current_round();
        let changed = pump(&mut sync, &mut rx).await;

        // then
        assert!(changed);
        assert_eq!(sync.phase(), Phase::Running);
        assert!(sync.armed_timer_round().is_none());
        assert_eq!(sync.multiplier(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_current_round__start_in_future__bets_then_runs_at_start_time() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", 2.0, 3.0)));
        let (mut sync, mut rx) = synchronizer(api);
        let started = Instant::now();

        // when
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.phase(), Phase::Betting);
        assert_eq!(sync.armed_timer_round(), Some(&RoundId::new("r1")));

        // when
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.phase(), Phase::Running);
        let waited = Instant::now() - started;
        assert!(waited >= Duration::from_secs(2));
        assert!(waited < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_current_round__failure__leaves_phase_loading() {
        // given
        let api = FakeRoundApi::default().with_current(None);
        let (mut sync, mut rx) = synchronizer(api);

        // when
        sync.fetch_current_round();
        let changed = pump(&mut sync, &mut rx).await;

        // then
        assert!(!changed);
        assert_eq!(sync.phase(), Phase::Loading);
        assert!(sync.round().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scenario__betting_running_crash_timeline() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", 2.0, 3.0)));
        let (mut sync, mut rx) = synchronizer(api);
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;
        assert_eq!(sync.phase(), Phase::Betting);

        // when
        pump(&mut sync, &mut rx).await;
        let running_since = sync.running_since().unwrap();

        // then
        assert_eq!(sync.phase(), Phase::Running);
        let before_crash = sync.on_frame(running_since + Duration::from_secs_f64(4.3));
        assert!(before_crash < 3.0);
        assert_eq!(sync.phase(), Phase::Running);

        let at_crash = sync.on_frame(running_since + Duration::from_secs_f64(4.40));
        assert_eq!(at_crash, 3.0);
        assert_eq!(sync.phase(), Phase::Crashed);
    }

    #[tokio::test(start_paused = true)]
    async fn on_frame__after_crash__keeps_crashed_and_last_multiplier() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 1.5)));
        let (mut sync, _rx) = running_round(api).await;
        let since = sync.running_since().unwrap();
        sync.on_frame(since + Duration::from_secs(10));
        let crashed_since = sync.crashed_since();
        assert_eq!(sync.phase(), Phase::Crashed);

        // when
        let later = sync.on_frame(since + Duration::from_secs(20));

        // then
        assert_eq!(later, 1.5);
        assert_eq!(sync.phase(), Phase::Crashed);
        assert_eq!(sync.crashed_since(), crashed_since);
    }

    #[tokio::test(start_paused = true)]
    async fn on_frame__not_running__does_not_advance_multiplier() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", 30.0, 5.0)));
        let (mut sync, mut rx) = synchronizer(api);
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;

        // when
        let multiplier = sync.on_frame(Instant::now() + Duration::from_secs(10));

        // then
        assert_eq!(multiplier, 1.0);
        assert_eq!(sync.phase(), Phase::Betting);
    }

    #[tokio::test(start_paused = true)]
    async fn request_next_round__resets_bet_and_cashout() {
        // given
        let mut api = FakeRoundApi::default()
            .with_current(Some(round("r1", -1.0, 1.2)))
            .with_next(Some(round("r2", 5.0, 2.0)));
        api.cashout_receipt = Some(receipt(Some(0.5)));
        let (mut sync, mut rx) = running_round(api).await;
        sync.has_bet = true;
        assert!(sync.cash_out());
        pump(&mut sync, &mut rx).await;
        assert!(sync.cashout_at().is_some());
        let since = sync.running_since().unwrap();
        sync.on_frame(since + Duration::from_secs(5));
        assert_eq!(sync.phase(), Phase::Crashed);

        // when
        let accepted = sync.request_next_round();

        // then
        assert!(accepted);
        assert_eq!(sync.phase(), Phase::Loading);
        assert!(!sync.has_bet());
        assert_eq!(sync.cashout_at(), None);

        // when
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.phase(), Phase::Betting);
        assert_eq!(sync.round().unwrap().id, RoundId::new("r2"));
        assert_eq!(sync.multiplier(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_next_round__failure__stays_loading() {
        // given
        let api = FakeRoundApi::default()
            .with_current(Some(round("r1", -1.0, 1.0)))
            .with_next(None);
        let (mut sync, mut rx) = running_round(api).await;
        sync.on_frame(Instant::now());
        assert_eq!(sync.phase(), Phase::Crashed);

        // when
        sync.request_next_round();
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.phase(), Phase::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn request_next_round__while_running__is_ignored() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 50.0)));
        let (mut sync, _rx) = running_round(api).await;

        // when
        let accepted = sync.request_next_round();

        // then
        assert!(!accepted);
        assert_eq!(sync.phase(), Phase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn start_timer__stale_round_id__is_a_no_op() {
        // given
        let api = FakeRoundApi::default().with_next(Some(round("r2", 10.0, 2.0)));
        let (mut sync, mut rx) = synchronizer(api);
        sync.request_next_round();
        pump(&mut sync, &mut rx).await;
        assert_eq!(sync.phase(), Phase::Betting);

        // when
        let changed = sync.handle_event(SyncEvent::StartTimerFired {
            round_id: RoundId::new("r1"),
        });

        // then
        assert!(!changed);
        assert_eq!(sync.phase(), Phase::Betting);
    }

    #[tokio::test(start_paused = true)]
    async fn start_timer__fires_after_round_crashed__does_not_rerun() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 1.0)));
        let (mut sync, _rx) = running_round(api).await;
        sync.on_frame(Instant::now());
        assert_eq!(sync.phase(), Phase::Crashed);

        // when
        let changed = sync.handle_event(SyncEvent::StartTimerFired {
            round_id: RoundId::new("r1"),
        });

        // then
        assert!(!changed);
        assert_eq!(sync.phase(), Phase::Crashed);
    }

    #[tokio::test(start_paused = true)]
    async fn round_loaded__older_request__is_discarded() {
        // given
        let api = FakeRoundApi::default();
        let (mut sync, _rx) = synchronizer(api);
        sync.request_next_round();
        sync.request_next_round();

        // when
        let changed = sync.handle_event(SyncEvent::RoundLoaded {
            request: 1,
            source: RoundSource::Next,
            result: Ok(round("old", -1.0, 2.0)),
        });

        // then
        assert!(!changed);
        assert!(sync.round().is_none());
        assert_eq!(sync.phase(), Phase::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn place_bet__while_betting__posts_slip_and_sets_has_bet() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", 10.0, 2.0)));
        let bets = api.bets.clone();
        let (mut sync, mut rx) = synchronizer(api);
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;
        let slip = BetSlip {
            amount: 2.5,
            auto_cashout: 1.8,
        };

        // when
        assert!(sync.place_bet(&slip));
        pump(&mut sync, &mut rx).await;

        // then
        assert!(sync.has_bet());
        let bets = bets.lock().unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].0, RoundId::new("r1"));
        assert_eq!(
            bets[0].1,
            BetRequest {
                player_id: PlayerId::from_raw("player-1"),
                amount: 2.5,
                auto_cashout: 1.8,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn place_bet__network_failure__still_sets_has_bet() {
        // given
        let mut api = FakeRoundApi::default().with_current(Some(round("r1", 10.0, 2.0)));
        api.fail_bets = true;
        let (mut sync, mut rx) = synchronizer(api);
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;

        // when
        sync.place_bet(&BetSlip::default());
        pump(&mut sync, &mut rx).await;

        // then
        assert!(sync.has_bet());
    }

    #[tokio::test(start_paused = true)]
    async fn place_bet__outside_betting__is_rejected() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 20.0)));
        let bets = api.bets.clone();
        let (mut sync, _rx) = running_round(api).await;

        // when
        let accepted = sync.place_bet(&BetSlip::default());

        // then
        assert!(!accepted);
        assert!(!sync.has_bet());
        assert!(bets.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cash_out__null_profit__records_cashout_at_call_multiplier() {
        // given
        let mut api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 10.0)));
        api.cashout_receipt = Some(receipt(None));
        let cashouts = api.cashouts.clone();
        let (mut sync, mut rx) = running_round(api).await;
        sync.has_bet = true;
        let since = sync.running_since().unwrap();
        let at = sync.on_frame(since + Duration::from_secs(2));

        // when
        assert!(sync.cash_out());
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.cashout_at(), Some(at));
        let cashouts = cashouts.lock().unwrap();
        assert_eq!(cashouts.len(), 1);
        assert_eq!(cashouts[0].1, PlayerId::from_raw("player-1"));
        assert_eq!(cashouts[0].2, at);
    }

    #[tokio::test(start_paused = true)]
    async fn cash_out__negative_profit__does_not_record() {
        // given
        let mut api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 10.0)));
        api.cashout_receipt = Some(receipt(Some(-1.0)));
        let (mut sync, mut rx) = running_round(api).await;
        sync.has_bet = true;

        // when
        sync.cash_out();
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.cashout_at(), None);
        assert!(sync.can_cash_out());
    }

    #[tokio::test(start_paused = true)]
    async fn cash_out__response_without_profit__does_not_record() {
        // given
        let mut api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 10.0)));
        api.cashout_receipt = Some(CashoutReceipt { profit: None });
        let (mut sync, mut rx) = running_round(api).await;
        sync.has_bet = true;

        // when
        assert!(sync.cash_out());
        pump(&mut sync, &mut rx).await;

        // then
        assert_eq!(sync.cashout_at(), None);
        assert!(sync.can_cash_out());
    }

    #[tokio::test(start_paused = true)]
    async fn cash_out__after_recorded_cashout__is_rejected() {
        // given
        let mut api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 10.0)));
        api.cashout_receipt = Some(receipt(Some(1.0)));
        let cashouts = api.cashouts.clone();
        let (mut sync, mut rx) = running_round(api).await;
        sync.has_bet = true;
        sync.cash_out();
        pump(&mut sync, &mut rx).await;

        // when
        let accepted = sync.cash_out();

        // then
        assert!(!accepted);
        assert_eq!(cashouts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cash_out__without_bet__is_rejected() {
        // given
        let mut api = FakeRoundApi::default().with_current(Some(round("r1", -1.0, 10.0)));
        api.cashout_receipt = Some(receipt(None));
        let cashouts = api.cashouts.clone();
        let (mut sync, _rx) = running_round(api).await;
        assert!(!sync.has_bet());

        // when
        let accepted = sync.cash_out();

        // then
        assert!(!accepted);
        assert!(!sync.can_cash_out());
        assert!(cashouts.lock().unwrap().is_empty());
        assert_eq!(sync.cashout_at(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cash_out__while_betting__is_rejected() {
        // given
        let api = FakeRoundApi::default().with_current(Some(round("r1", 10.0, 10.0)));
        let (mut sync, mut rx) = synchronizer(api);
        sync.fetch_current_round();
        pump(&mut sync, &mut rx).await;

        // then
        assert!(!sync.cash_out());
    }

    #[test]
    fn bet_slip__adjustments__respect_minimums_and_steps() {
        // given
        let mut slip = BetSlip::default();

        // when
        slip.adjust_amount(3);
        slip.adjust_auto_cashout(-2);

        // then
        assert_eq!(slip.amount, 1.3);
        assert_eq!(slip.auto_cashout, 1.98);

        // when
        slip.adjust_amount(-100);
        slip.adjust_auto_cashout(-1000);

        // then
        assert_eq!(slip.amount, MIN_BET_AMOUNT);
        assert_eq!(slip.auto_cashout, MIN_AUTO_CASHOUT);
    }
}
