//! Stage agents.
//!
//! The critic labels claims against retrieved knowledge; the reviser
//! rewrites the answer from the critique. Neither knows about the other;
//! the orchestrator owns the ordering.

mod critic;
mod reviser;
mod traits;

pub use critic::LlmCritic;
pub use reviser::{LlmReviser, SpanReviser};
pub use traits::{AgentError, CriticAgent, ReviserAgent};
