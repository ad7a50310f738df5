//! Simulation driver: venue and agent setup plus the discrete step loop.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agent::Agent;
use crate::config::SimConfig;
use crate::events::{AgentId, TickReport, VenueId};
use crate::logging::{log_run_start, log_step_checkpoint, log_venue_failure, ProfileScope};
use crate::report::SimulationReport;
use crate::venue::Venue;

/// Venues with risk parameters `max_risk, max_risk + 1, ..`, riskiest first.
pub fn generate_venues(cfg: &SimConfig) -> Result<Vec<Venue>> {
    (0..cfg.venue_count)
        .map(|i| Venue::new(VenueId(i), cfg.max_risk + i as f64, cfg))
        .collect()
}

/// Each venue repeated `bets_per_agent` times in a row, in venue order.
pub fn flatten_allocations(venues: &[Venue], bets_per_agent: usize) -> Vec<VenueId> {
    venues
        .iter()
        .flat_map(|v| std::iter::repeat(v.id()).take(bets_per_agent))
        .collect()
}

/// One agent per stride-1 window of the flattened allocation list.
///
/// Windows overlap, so `n` venues yield `n * bets - bets + 1` agents.
pub fn generate_agents(venues: &mut [Venue], bets_per_agent: usize, bet_size: f64) -> Result<Vec<Agent>> {
    if bets_per_agent == 0 {
        bail!("bets_per_agent must be at least 1");
    }
    let flat = flatten_allocations(venues, bets_per_agent);
    if flat.len() < bets_per_agent {
        bail!("need at least one venue to allocate {} bets", bets_per_agent);
    }
    flat.windows(bets_per_agent)
        .enumerate()
        .map(|(i, window)| Agent::enroll(AgentId(i), window.to_vec(), bet_size, venues))
        .collect()
}

/// Tick every venue once, in order, delivering each venue's notices before the next ticks.
pub fn run_step<R: Rng + ?Sized>(venues: &mut [Venue], agents: &mut [Agent], step: u64, rng: &mut R) -> Vec<TickReport> {
    let mut reports = Vec::with_capacity(venues.len());
    for venue in venues.iter_mut() {
        let report = venue.tick(step, rng);
        for notice in &report.notices {
            if let Some(agent) = agents.get_mut(notice.agent.0) {
                agent.receive_payoff(&notice.payoff);
            }
        }
        if report.failed_now {
            log_venue_failure(report.venue.0, venue.risk_param(), step, report.notices.len());
        }
        reports.push(report);
    }
    reports
}

/// Run steps `0..steps` and flush every agent's final step.
pub fn run_simulation<R: Rng + ?Sized>(venues: &mut [Venue], agents: &mut [Agent], steps: u64, rng: &mut R) {
    for step in 0..steps {
        run_step(venues, agents, step, rng);
    }
    finalize_all(agents);
}

pub fn finalize_all(agents: &mut [Agent]) {
    for agent in agents.iter_mut() {
        agent.finalize();
    }
}

/// Owns one configured run: its venues, agents and seeded RNG.
pub struct Simulation {
    cfg: SimConfig,
    seed: u64,
    rng: StdRng,
    venues: Vec<Venue>,
    agents: Vec<Agent>,
    steps_run: u64,
    finished: bool,
}

impl Simulation {
    pub fn new(cfg: SimConfig) -> Result<Self> {
        cfg.validate()?;
        let seed = cfg.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut venues = generate_venues(&cfg)?;
        let agents = generate_agents(&mut venues, cfg.bets_per_agent, cfg.bet_size)?;
        Ok(Self {
            cfg,
            seed,
            rng: StdRng::seed_from_u64(seed),
            venues,
            agents,
            steps_run: 0,
            finished: false,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    /// Seed actually used, including one drawn from entropy.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn steps_run(&self) -> u64 {
        self.steps_run
    }

    /// Run the configured number of steps, finalize, and build the report.
    pub fn run(&mut self) -> Result<SimulationReport> {
        if self.finished {
            bail!("simulation already ran {} steps", self.steps_run);
        }
        log_run_start(
            &self.cfg.fingerprint(),
            self.seed,
            self.cfg.steps,
            self.venues.len(),
            self.agents.len(),
        );
        {
            let _scope = ProfileScope::with_context("run", &[("steps", serde_json::json!(self.cfg.steps))]);
            for step in 0..self.cfg.steps {
                run_step(&mut self.venues, &mut self.agents, step, &mut self.rng);
                self.steps_run = step + 1;
                if self.cfg.checkpoint_every > 0 && self.steps_run % self.cfg.checkpoint_every == 0 {
                    self.checkpoint(step);
                }
            }
            finalize_all(&mut self.agents);
        }
        self.finished = true;
        Ok(SimulationReport::build(self))
    }

    fn checkpoint(&self, step: u64) {
        let live = self.venues.iter().filter(|v| !v.is_failed()).count();
        let total: f64 = self
            .agents
            .iter()
            .flat_map(|a| a.venues().filter_map(move |v| a.balance(v)))
            .map(|b| b.max(0.0))
            .sum();
        let mean = if self.agents.is_empty() { 0.0 } else { total / self.agents.len() as f64 };
        log_step_checkpoint(step, live, mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_venue_cfg() -> SimConfig {
        SimConfig {
            venue_count: 2,
            bets_per_agent: 2,
            bet_size: 0.5,
            max_risk: 30.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_venues_risk_ladder() {
        let venues = generate_venues(&SimConfig::default()).unwrap();
        let risks: Vec<f64> = venues.iter().map(|v| v.risk_param()).collect();
        assert_eq!(risks, vec![30.0, 31.0, 32.0, 33.0, 34.0, 35.0, 36.0, 37.0]);
    }

    #[test]
    fn test_overlapping_windows_two_venues() {
        let cfg = two_venue_cfg();
        let mut venues = generate_venues(&cfg).unwrap();
        let agents = generate_agents(&mut venues, 2, 0.5).unwrap();
        assert_eq!(agents.len(), 3);
        assert_eq!(agents[0].allocations(), &[VenueId(0), VenueId(0)]);
        assert_eq!(agents[1].allocations(), &[VenueId(0), VenueId(1)]);
        assert_eq!(agents[2].allocations(), &[VenueId(1), VenueId(1)]);
        assert_eq!(venues[0].registered(), &[AgentId(0), AgentId(0), AgentId(1)]);
        assert_eq!(venues[1].registered(), &[AgentId(1), AgentId(2), AgentId(2)]);
    }

    #[test]
    fn test_agent_count_formula() {
        let cfg = SimConfig::default();
        let mut venues = generate_venues(&cfg).unwrap();
        let agents = generate_agents(&mut venues, 3, 1.0 / 3.0).unwrap();
        assert_eq!(agents.len(), 8 * 3 - 3 + 1);
    }

    #[test]
    fn test_generate_agents_rejects_zero_bets() {
        let mut venues = generate_venues(&two_venue_cfg()).unwrap();
        assert!(generate_agents(&mut venues, 0, 0.5).is_err());
        assert!(generate_agents(&mut [], 2, 0.5).is_err());
    }

    #[test]
    fn test_zero_steps_keeps_seed_only() {
        let cfg = two_venue_cfg();
        let mut venues = generate_venues(&cfg).unwrap();
        let mut agents = generate_agents(&mut venues, 2, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        run_simulation(&mut venues, &mut agents, 0, &mut rng);
        for agent in &agents {
            for v in agent.venues() {
                assert_eq!(agent.history(v).unwrap().len(), 1);
            }
            assert_eq!(agent.returns(), vec![1.0]);
        }
    }

    #[test]
    fn test_history_length_after_run() {
        let cfg = two_venue_cfg();
        let mut venues = generate_venues(&cfg).unwrap();
        let mut agents = generate_agents(&mut venues, 2, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        run_simulation(&mut venues, &mut agents, 25, &mut rng);
        for agent in &agents {
            assert_eq!(agent.returns().len(), 26);
            assert!((agent.returns()[0] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_run_step_reports_every_venue() {
        let cfg = two_venue_cfg();
        let mut venues = generate_venues(&cfg).unwrap();
        let mut agents = generate_agents(&mut venues, 2, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let reports = run_step(&mut venues, &mut agents, 0, &mut rng);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].venue, VenueId(0));
        assert_eq!(reports[1].venue, VenueId(1));
        assert_eq!(reports[0].notices.len(), 3);
    }

    #[test]
    fn test_simulation_runs_once() {
        let cfg = SimConfig {
            steps: 5,
            seed: Some(1),
            ..two_venue_cfg()
        };
        let mut sim = Simulation::new(cfg).unwrap();
        assert_eq!(sim.seed(), 1);
        sim.run().unwrap();
        assert_eq!(sim.steps_run(), 5);
        assert!(sim.run().is_err());
    }

    #[test]
    fn test_simulation_rejects_invalid_config() {
        let cfg = SimConfig {
            max_risk: 0.0,
            ..Default::default()
        };
        assert!(Simulation::new(cfg).is_err());
    }
}
