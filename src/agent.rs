use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::events::{AgentId, Payoff, VenueId};
use crate::venue::Venue;

/// Capital holder with one balance (and one balance history) per venue.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    allocations: Vec<VenueId>,
    balance: BTreeMap<VenueId, f64>,
    history: BTreeMap<VenueId, Vec<f64>>,
    last_step: u64,
    /// A payoff landed since the last `record_balances`
    pending: bool,
}

impl Agent {
    /// Build an agent holding `bet_size` per allocation entry. Does not register.
    pub fn new(id: AgentId, allocations: Vec<VenueId>, bet_size: f64) -> Self {
        let mut balance = BTreeMap::new();
        for venue in &allocations {
            *balance.entry(*venue).or_insert(0.0) += bet_size;
        }
        let history = balance.iter().map(|(venue, initial)| (*venue, vec![*initial])).collect();
        Self {
            id,
            allocations,
            balance,
            history,
            last_step: 0,
            pending: false,
        }
    }

    /// Build an agent and register it with each allocated venue, once per allocation entry.
    pub fn enroll(id: AgentId, allocations: Vec<VenueId>, bet_size: f64, venues: &mut [Venue]) -> Result<Self> {
        for venue in &allocations {
            if venue.0 >= venues.len() {
                return Err(anyhow!("agent {} allocated to unknown venue {}", id.0, venue.0));
            }
        }
        for venue in &allocations {
            venues[venue.0].register_agent(id);
        }
        Ok(Self::new(id, allocations, bet_size))
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn allocations(&self) -> &[VenueId] {
        &self.allocations
    }

    pub fn last_step(&self) -> u64 {
        self.last_step
    }

    /// Current (unsanitized) balance at a venue.
    pub fn balance(&self, venue: VenueId) -> Option<f64> {
        self.balance.get(&venue).copied()
    }

    pub fn history(&self, venue: VenueId) -> Option<&[f64]> {
        self.history.get(&venue).map(|h| h.as_slice())
    }

    pub fn venues(&self) -> impl Iterator<Item = VenueId> + '_ {
        self.balance.keys().copied()
    }

    /// Apply one venue payoff. Seeing a later step first closes out the previous one.
    /// A ruin payoff leaves the venue balance at or below zero whatever its size.
    pub fn receive_payoff(&mut self, payoff: &Payoff) {
        if payoff.step > self.last_step {
            self.record_balances();
            self.last_step = payoff.step;
        }
        if let Some(balance) = self.balance.get_mut(&payoff.venue) {
            *balance += payoff.amount;
            if payoff.ruined {
                *balance = balance.min(0.0);
            }
            self.pending = true;
        }
    }

    /// Clamp negative balances to zero and append every balance to its history.
    pub fn record_balances(&mut self) {
        for (venue, balance) in self.balance.iter_mut() {
            if *balance < 0.0 {
                *balance = 0.0;
            }
            if let Some(series) = self.history.get_mut(venue) {
                series.push(*balance);
            }
        }
        self.pending = false;
    }

    /// Flush the last observed step, which otherwise waits for a step that never comes.
    pub fn finalize(&mut self) {
        if self.pending {
            self.record_balances();
        }
    }

    /// Total capital per recorded step, summed across venues.
    pub fn returns(&self) -> Vec<f64> {
        let len = self.history.values().map(Vec::len).min().unwrap_or(0);
        (0..len)
            .map(|t| self.history.values().map(|series| series[t]).sum())
            .collect()
    }
}
