use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::fmt;

/// Growth rate used when the backend omits `k` (or sends a zero/NaN value).
pub const DEFAULT_GROWTH_RATE: f64 = 0.25;

/// Tolerance against float and frame-timing drift when detecting the crash.
pub const CRASH_EPSILON: f64 = 1e-3;

/// Opaque round identifier. The backend may send it as a string or a number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoundId(String);

impl RoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RoundId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => RoundId(text),
            RawId::Number(number) => RoundId(number.to_string()),
        })
    }
}

impl Serialize for RoundId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// A round as reported by the backend. Replaced wholesale on every fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    /// Epoch seconds at which betting closes and the multiplier starts growing.
    pub start_time: f64,
    pub crash_at: f64,
    #[serde(default)]
    pub k: Option<f64>,
}

impl Round {
    pub fn growth_rate(&self) -> f64 {
        match self.k {
            Some(k) if k != 0.0 && !k.is_nan() => k,
            _ => DEFAULT_GROWTH_RATE,
        }
    }

    /// Seconds until `start_time`, or `None` if the round already started.
    pub fn seconds_until_start(&self, now_epoch_secs: f64) -> Option<f64> {
        (now_epoch_secs < self.start_time).then(|| self.start_time - now_epoch_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Loading,
    Betting,
    Running,
    Crashed,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Loading => "Loading",
            Phase::Betting => "Betting",
            Phase::Running => "Running",
            Phase::Crashed => "Crashed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `min(crash_at, exp(k * max(0, elapsed)))`
pub fn compute_multiplier(round: &Round, elapsed_secs: f64) -> f64 {
    let elapsed = elapsed_secs.max(0.0);
    (round.growth_rate() * elapsed).exp().min(round.crash_at)
}

pub fn check_crash(multiplier: f64, round: &Round) -> bool {
    multiplier >= round.crash_at - CRASH_EPSILON
}

pub fn format_multiplier(multiplier: f64) -> String {
    format!("{multiplier:.2}x")
}
