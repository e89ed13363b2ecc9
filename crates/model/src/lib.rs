//! An abstraction layer for the language model backends.
//!
//! The agent talks to a local inference server and to hosted
//! OpenAI-compatible APIs through the same protocol, so the orchestration
//! loop never needs to know which backend answered.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the backend adapters should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
