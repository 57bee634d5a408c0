//! The research agent: a bounded reason-act-observe loop.
//!
//! A session moves through **Reason → Act → Observe** until the model calls
//! `finish` and the finish guard approves, or a budget runs out:
//!
//! 1. **Reason**: the completion manager returns thought text plus tool calls
//! 2. **Act**: each call passes the tool policy, then runs on the connector
//! 3. **Observe**: formatted evidence goes back into the conversation
//!
//! Helpers are split by concern: argument repair, observation formatting,
//! tool-use policy, prompts, the finish guard and trace emission.

pub mod guard;
pub mod observation;
pub mod policy;
pub mod prompts;
pub mod repair;
pub mod researcher;
pub mod tracer;

#[cfg(test)]
mod test_helpers;

pub use guard::GuardVerdict;
pub use policy::{Coverage, RecencyIntent, ToolPolicy};
pub use researcher::ResearcherAgent;
pub use tracer::SessionTracer;
