//! A hotel search assistant.
//!
//! A question in natural language goes to a language model, which uses a
//! small catalogue of tools to pull search criteria out of it, resolve
//! place names to coordinates and query an Elasticsearch index. The answer
//! is built from the search results only.
//!
//! The crate ships the `hotel-agent` CLI and the `hotel-agent-load` bulk
//! loader, and can also be used as a library through [`Concierge`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod concierge;
pub mod config;
pub mod format;
pub mod ingest;
pub mod services;
pub mod tools;

pub use concierge::{Concierge, ConciergeBuilder};

/// Re-exports of [`hotel_agent_core`] crate.
pub mod core {
    pub use hotel_agent_core::*;
}
