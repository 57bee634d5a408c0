//! Cost estimation and trace sinks for sleuth.
//!
//! Each vendor adapter owns a [`PriceTable`] and turns token usage into a
//! USD estimate. Trace sinks implement [`sleuth_core::TraceEmitter`] so a
//! session can be recorded in memory or streamed to a JSON Lines file.

pub mod pricing;
pub mod recorder;

pub use pricing::{ModelPricing, PriceTable};
pub use recorder::{JsonlTraceWriter, TraceRecorder};
