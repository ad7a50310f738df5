//! Messages passed from venues to agents.
//!
//! A venue never touches agent state. Each `tick` yields a [`TickReport`]
//! holding one [`Notice`] per registration, and the driver applies them in
//! order through [`crate::agent::Agent::receive_payoff`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VenueId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AgentId(pub usize);

/// One step's payoff from one venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payoff {
    pub venue: VenueId,
    pub risk_param: f64,
    pub amount: f64,
    pub step: u64,
    /// Set on the step the venue fails; holders lose everything at that venue
    pub ruined: bool,
}

/// A payoff addressed to a single registered agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Notice {
    pub agent: AgentId,
    pub payoff: Payoff,
}

/// Everything a venue resolved on one step.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub venue: VenueId,
    pub step: u64,
    pub amount: f64,
    /// True only on the step the failure draw fired
    pub failed_now: bool,
    pub notices: Vec<Notice>,
}
