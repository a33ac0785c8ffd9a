//! LLM-backed agent team: a router that delegates to a query specialist and
//! a chart specialist, each running under its own per-invocation budget.

pub mod budget;
pub mod prompts;
pub mod role;
pub mod runner;
pub mod team;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use role::AgentRole;
pub use team::AgentTeam;
