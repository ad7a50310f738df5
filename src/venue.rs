use anyhow::{anyhow, bail, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::SimConfig;
use crate::events::{AgentId, Notice, Payoff, TickReport, VenueId};

/// Premium for a venue given where its risk parameter sits in the venue range.
///
/// The riskiest venue (`risk_param == max_risk`) gets the full `max_premium`;
/// the premium falls off as `(1 - rank)^premium_decay` from there.
pub fn premium_for(risk_param: f64, venue_count: usize, max_risk: f64, premium_decay: f64, max_premium: f64) -> f64 {
    let rank = if venue_count > 1 {
        (risk_param - max_risk) / (venue_count - 1) as f64
    } else {
        0.0
    };
    (1.0 - rank).powf(premium_decay) * max_premium
}

#[derive(Debug, Clone)]
pub struct Venue {
    id: VenueId,
    risk_param: f64,
    premium: f64,
    ruin_bound: u64,
    returns: Normal<f64>,
    catastrophic_loss: f64,
    failed: bool,
    failed_at: Option<u64>,
    registered: Vec<AgentId>,
}

impl Venue {
    pub fn new(id: VenueId, risk_param: f64, cfg: &SimConfig) -> Result<Self> {
        if !risk_param.is_finite() || risk_param < 1.0 {
            bail!("venue {} risk parameter must be >= 1, got {}", id.0, risk_param);
        }
        let premium = premium_for(risk_param, cfg.venue_count, cfg.max_risk, cfg.premium_decay, cfg.max_premium);
        let returns = Normal::new(cfg.return_mean + premium, cfg.return_std)
            .map_err(|e| anyhow!("venue {} return distribution: {}", id.0, e))?;
        // risk_param >= 1 and ruin_decay >= 0 keep this >= 1; the cast saturates on overflow.
        let ruin_bound = (risk_param.powf(cfg.ruin_decay).floor() as u64).max(1);
        Ok(Self {
            id,
            risk_param,
            premium,
            ruin_bound,
            returns,
            catastrophic_loss: cfg.catastrophic_loss,
            failed: false,
            failed_at: None,
            registered: Vec::new(),
        })
    }

    pub fn id(&self) -> VenueId {
        self.id
    }

    pub fn risk_param(&self) -> f64 {
        self.risk_param
    }

    pub fn premium(&self) -> f64 {
        self.premium
    }

    /// Odds denominator: each live step fails with probability `1 / ruin_bound`.
    pub fn ruin_bound(&self) -> u64 {
        self.ruin_bound
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn failed_at(&self) -> Option<u64> {
        self.failed_at
    }

    pub fn registered(&self) -> &[AgentId] {
        &self.registered
    }

    /// Registering the same agent twice doubles its notifications.
    pub fn register_agent(&mut self, agent: AgentId) {
        self.registered.push(agent);
    }

    /// Resolve this step's outcome and address it to every registration.
    pub fn tick<R: Rng + ?Sized>(&mut self, step: u64, rng: &mut R) -> TickReport {
        let mut failed_now = false;
        let amount = if self.failed {
            0.0
        } else if rng.gen_range(0..self.ruin_bound) == 0 {
            self.failed = true;
            self.failed_at = Some(step);
            failed_now = true;
            self.catastrophic_loss
        } else {
            self.returns.sample(rng)
        };

        let payoff = Payoff {
            venue: self.id,
            risk_param: self.risk_param,
            amount,
            step,
            ruined: failed_now,
        };
        let notices = self
            .registered
            .iter()
            .map(|&agent| Notice { agent, payoff })
            .collect();

        TickReport {
            venue: self.id,
            step,
            amount,
            failed_now,
            notices,
        }
    }
}
