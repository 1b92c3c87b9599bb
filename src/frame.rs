use crate::round::Phase;
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
    Interval,
    MissedTickBehavior,
};

pub const DEFAULT_FPS: u32 = 60;

/// Per-frame tick that only exists while the round is running.
///
/// `sync` subscribes on entry to [`Phase::Running`] and drops the interval on
/// every exit, so no frame callbacks outlive the running phase.
#[derive(Debug)]
pub struct FrameTicker {
    period: Duration,
    interval: Option<Interval>,
}

impl FrameTicker {
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            period: Duration::from_secs(1) / fps,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_subscribed(&self) -> bool {
        self.interval.is_some()
    }

    pub fn sync(&mut self, phase: Phase) {
        let running = phase == Phase::Running;
        match (running, self.interval.is_some()) {
            (true, false) => {
                let mut interval = time::interval(self.period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.interval = Some(interval);
                tracing::debug!(period = ?self.period, "frame ticks subscribed");
            }
            (false, true) => {
                self.interval = None;
                tracing::debug!(%phase, "frame ticks released");
            }
            _ => {}
        }
    }

    /// Resolves on the next frame; pending forever while unsubscribed.
    pub async fn next_frame(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }
}

/// Redraw ticks for a fixed-length effect that plays after the running phase,
/// such as the crash overlay. Each deadline plays at most once.
#[derive(Debug)]
pub struct EffectTicker {
    period: Duration,
    until: Option<Instant>,
    interval: Option<Interval>,
}

impl EffectTicker {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / fps.max(1),
            until: None,
            interval: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.interval.is_some()
    }

    /// Ticks until `deadline`. A deadline already played, or already past
    /// at `now`, arms nothing.
    pub fn play_until(&mut self, deadline: Instant, now: Instant) {
        if self.until == Some(deadline) {
            return;
        }
        self.until = Some(deadline);
        if deadline <= now {
            self.interval = None;
            return;
        }
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(interval);
        tracing::debug!(remaining = ?(deadline - now), "effect ticks armed");
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Resolves on the next effect frame. The first tick at or past the
    /// deadline is delivered and ends the effect.
    pub async fn next_frame(&mut self) -> Instant {
        let Some(interval) = self.interval.as_mut() else {
            return std::future::pending().await;
        };
        let now = interval.tick().await;
        if self.until.is_none_or(|until| now >= until) {
            self.interval = None;
        }
        now
    }
}
