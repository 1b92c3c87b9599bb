use std::{
    fmt,
    future::Future,
};

use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    de::DeserializeOwned,
};

use crate::{
    round::{
        Round,
        RoundId,
    },
    session::PlayerId,
};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BetRequest {
    pub player_id: PlayerId,
    pub amount: f64,
    pub auto_cashout: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct CashoutReceipt {
    /// `None` when the field is absent, `Some(None)` when it is `null`.
    #[serde(default, deserialize_with = "present_field")]
    pub profit: Option<Option<f64>>,
}

impl CashoutReceipt {
    /// A null profit or a non-negative one counts as a confirmed cashout.
    /// A response without `profit` does not.
    pub fn is_confirmed(&self) -> bool {
        match self.profit {
            Some(None) => true,
            Some(Some(profit)) => profit >= 0.0,
            None => false,
        }
    }
}

fn present_field<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

/// The four calls the client makes against the round backend.
pub trait RoundApi: Clone + Send + Sync + 'static {
    fn current_round(&self) -> impl Future<Output = Result<Round>> + Send;

    fn next_round(&self) -> impl Future<Output = Result<Round>> + Send;

    fn place_bet(
        &self,
        round_id: &RoundId,
        bet: &BetRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    fn cash_out(
        &self,
        round_id: &RoundId,
        player_id: &PlayerId,
        at_multiplier: f64,
    ) -> impl Future<Output = Result<CashoutReceipt>> + Send;
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct EmptyBody {}

#[derive(Serialize)]
struct CashoutBody<'a> {
    player_id: &'a PlayerId,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for backend")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_round_url(&self) -> String {
        format!("{}/api/round/current", self.base_url)
    }

    fn next_round_url(&self) -> String {
        format!("{}/api/round", self.base_url)
    }

    fn bet_url(&self, round_id: &RoundId) -> String {
        format!("{}/api/round/{}/bet", self.base_url, round_id)
    }

    fn cashout_url(&self, round_id: &RoundId, at_multiplier: f64) -> String {
        format!(
            "{}/api/round/{}/cashout?at_multiplier={}",
            self.base_url, round_id, at_multiplier
        )
    }

    async fn read_json<T: DeserializeOwned>(
        res: reqwest::Response,
        what: &'static str,
    ) -> Result<T> {
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read backend response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!("backend responded with {status} when {what}: {body}"));
        }
        serde_json::from_slice(&bytes)
            .wrap_err_with(|| format!("invalid backend payload when {what}"))
    }
}

impl RoundApi for BackendClient {
    async fn current_round(&self) -> Result<Round> {
        let res = self
            .http
            .get(self.current_round_url())
            .send()
            .await
            .wrap_err("backend request failed")?;
        Self::read_json(res, "fetching current round").await
    }

    async fn next_round(&self) -> Result<Round> {
        let res = self
            .http
            .post(self.next_round_url())
            .json(&EmptyBody {})
            .send()
            .await
            .wrap_err("backend request failed")?;
        Self::read_json(res, "creating next round").await
    }

    async fn place_bet(&self, round_id: &RoundId, bet: &BetRequest) -> Result<()> {
        let res = self
            .http
            .post(self.bet_url(round_id))
            .json(bet)
            .send()
            .await
            .wrap_err("backend request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(eyre!(
                "backend responded with {status} when placing bet on round {round_id}: {body}"
            ));
        }
        Ok(())
    }

    async fn cash_out(
        &self,
        round_id: &RoundId,
        player_id: &PlayerId,
        at_multiplier: f64,
    ) -> Result<CashoutReceipt> {
        let res = self
            .http
            .post(self.cashout_url(round_id, at_multiplier))
            .json(&CashoutBody { player_id })
            .send()
            .await
            .wrap_err("backend request failed")?;
        Self::read_json(res, "cashing out").await
    }
}

impl fmt::Display for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url)
    }
}
