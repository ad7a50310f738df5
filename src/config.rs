use anyhow::{bail, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Simulation constants. Every knob of the payoff/failure model lives here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimConfig {
    pub steps: u64,
    pub venue_count: usize,
    pub bets_per_agent: usize,
    /// Capital per bet-unit
    pub bet_size: f64,
    /// Risk parameter of the riskiest venue; the rest follow at +1 increments
    pub max_risk: f64,
    /// Exponent applied to the risk parameter to get the ruin odds denominator
    pub ruin_decay: f64,
    /// Exponent by which the premium falls off as the risk parameter grows
    pub premium_decay: f64,
    pub max_premium: f64,
    pub return_mean: f64,
    pub return_std: f64,
    /// Payoff delivered on the step a venue fails
    pub catastrophic_loss: f64,
    pub seed: Option<u64>,
    /// Emit a checkpoint log every N steps (0 disables)
    pub checkpoint_every: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            steps: 2600,
            venue_count: 8,
            bets_per_agent: 2,
            bet_size: 0.5,
            max_risk: 30.0,
            ruin_decay: 2.0,
            premium_decay: 2.6,
            max_premium: 0.0009,
            return_mean: 0.0,
            return_std: 0.007,
            catastrophic_loss: -10_000.0,
            seed: None,
            checkpoint_every: 0,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Self {
        let bets_per_agent: usize = std::env::var("BETS_PER_AGENT").ok().and_then(|v| v.parse().ok()).unwrap_or(2);
        // Total capital stays at 1.0 unless BET_SIZE overrides it.
        let default_bet = if bets_per_agent > 0 { 1.0 / bets_per_agent as f64 } else { 0.0 };
        Self {
            steps: std::env::var("STEPS").ok().and_then(|v| v.parse().ok()).unwrap_or(2600),
            venue_count: std::env::var("VENUES").ok().and_then(|v| v.parse().ok()).unwrap_or(8),
            bets_per_agent,
            bet_size: std::env::var("BET_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default_bet),
            max_risk: std::env::var("MAX_RISK").ok().and_then(|v| v.parse().ok()).unwrap_or(30.0),
            ruin_decay: std::env::var("RUIN_DECAY").ok().and_then(|v| v.parse().ok()).unwrap_or(2.0),
            premium_decay: std::env::var("PREMIUM_DECAY").ok().and_then(|v| v.parse().ok()).unwrap_or(2.6),
            max_premium: std::env::var("MAX_PREMIUM").ok().and_then(|v| v.parse().ok()).unwrap_or(0.0009),
            return_mean: std::env::var("RETURN_MEAN").ok().and_then(|v| v.parse().ok()).unwrap_or(0.0),
            return_std: std::env::var("RETURN_STD").ok().and_then(|v| v.parse().ok()).unwrap_or(0.007),
            catastrophic_loss: std::env::var("CATASTROPHIC_LOSS").ok().and_then(|v| v.parse().ok()).unwrap_or(-10_000.0),
            seed: std::env::var("SEED").ok().and_then(|v| v.parse().ok()),
            checkpoint_every: std::env::var("CHECKPOINT_EVERY").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
        }
    }

    /// Reject configurations the model cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.venue_count == 0 {
            bail!("venue_count must be at least 1");
        }
        if self.bets_per_agent == 0 {
            bail!("bets_per_agent must be at least 1");
        }
        if !self.max_risk.is_finite() || self.max_risk < 1.0 {
            bail!("max_risk must be a finite value >= 1, got {}", self.max_risk);
        }
        for (name, value) in [
            ("bet_size", self.bet_size),
            ("ruin_decay", self.ruin_decay),
            ("premium_decay", self.premium_decay),
            ("max_premium", self.max_premium),
            ("return_mean", self.return_mean),
        ] {
            if !value.is_finite() {
                bail!("{} must be finite, got {}", name, value);
            }
        }
        if self.bet_size < 0.0 {
            bail!("bet_size must be non-negative, got {}", self.bet_size);
        }
        // -inf is allowed.
        if self.catastrophic_loss.is_nan() || self.catastrophic_loss >= 0.0 {
            bail!("catastrophic_loss must be negative, got {}", self.catastrophic_loss);
        }
        if self.ruin_decay < 0.0 {
            bail!("ruin_decay must be non-negative, got {}", self.ruin_decay);
        }
        if !self.return_std.is_finite() || self.return_std < 0.0 {
            bail!("return_std must be a finite value >= 0, got {}", self.return_std);
        }
        Ok(())
    }

    /// Total capital each agent starts with.
    pub fn capital_per_agent(&self) -> f64 {
        self.bet_size * self.bets_per_agent as f64
    }

    /// sha256 over the serialized config, for correlating log lines with a parameter set.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }
}
