//! Final per-agent return series and per-venue status, the data handed to plotting.

use serde::Serialize;

use crate::logging::{log_agent_final, log_run_summary};
use crate::sim::Simulation;

#[derive(Debug, Clone, Serialize)]
pub struct VenueStatus {
    pub id: usize,
    pub risk_param: f64,
    pub premium: f64,
    pub failed: bool,
    pub failed_at_step: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSeries {
    pub id: usize,
    /// Risk parameter of each allocation slot, repeats included
    pub allocations: Vec<f64>,
    pub returns: Vec<f64>,
    pub final_return: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub config_hash: String,
    pub seed: u64,
    pub steps: u64,
    pub failed_venues: usize,
    pub wiped_agents: usize,
    pub venues: Vec<VenueStatus>,
    pub agents: Vec<AgentSeries>,
}

/// Largest peak-to-trough fall as a (non-positive) fraction of the peak.
pub fn max_drawdown(series: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for &equity in series {
        if equity > peak {
            peak = equity;
        }
        let drawdown = if peak > 0.0 { (equity - peak) / peak } else { 0.0 };
        if drawdown < worst {
            worst = drawdown;
        }
    }
    worst
}

impl SimulationReport {
    pub fn build(sim: &Simulation) -> Self {
        let venues: Vec<VenueStatus> = sim
            .venues()
            .iter()
            .map(|v| VenueStatus {
                id: v.id().0,
                risk_param: v.risk_param(),
                premium: v.premium(),
                failed: v.is_failed(),
                failed_at_step: v.failed_at(),
            })
            .collect();

        let agents: Vec<AgentSeries> = sim
            .agents()
            .iter()
            .map(|a| {
                let returns = a.returns();
                let final_return = returns.last().copied().unwrap_or(0.0);
                let dd = max_drawdown(&returns);
                log_agent_final(a.id().0, final_return, dd);
                AgentSeries {
                    id: a.id().0,
                    allocations: a
                        .allocations()
                        .iter()
                        .map(|v| sim.venues()[v.0].risk_param())
                        .collect(),
                    returns,
                    final_return,
                    max_drawdown: dd,
                }
            })
            .collect();

        let failed_venues = venues.iter().filter(|v| v.failed).count();
        let wiped_agents = agents.iter().filter(|a| a.final_return <= 0.0).count();
        let best = agents.iter().map(|a| a.final_return).fold(f64::NEG_INFINITY, f64::max);
        let worst = agents.iter().map(|a| a.final_return).fold(f64::INFINITY, f64::min);
        log_run_summary(sim.steps_run(), failed_venues, wiped_agents, best, worst);

        Self {
            run_id: crate::logging::run_id().to_string(),
            config_hash: sim.config().fingerprint(),
            seed: sim.seed(),
            steps: sim.steps_run(),
            failed_venues,
            wiped_agents,
            venues,
            agents,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_drawdown_tracks_peak() {
        let dd = max_drawdown(&[1.0, 1.2, 0.9, 1.5, 1.2]);
        assert!((dd - (-0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_total_loss() {
        assert_eq!(max_drawdown(&[1.0, 0.0, 0.0]), -1.0);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[0.0, 0.0]), 0.0);
    }
}
