//! Stochastic simulation of capital spread across venues whose risk premium
//! comes with a matching chance of irreversible ruin.

pub mod agent;
pub mod config;
pub mod events;
pub mod logging;
pub mod report;
pub mod sim;
pub mod venue;
