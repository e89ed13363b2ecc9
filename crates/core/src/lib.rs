//! Core logic of the agent: the session loop, tool dispatch and the
//! per-session parameter accumulator.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod params;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentEvent, DEFAULT_MAX_ROUNDS, FinalAnswerMode,
    SessionError, SessionOutcome,
};
