//! `scanguard-runtime` – pipeline orchestration.
//!
//! Owns the mutable per-node state (history, window width, cycle count) and
//! connects the perception stages to the event bus.
//!
//! # Modules
//!
//! - [`pipeline`] – [`Pipeline`][pipeline::Pipeline]: smooth → buffer →
//!   aggregate → detect for each incoming scan, plus operator window tuning.
//!   [`SharedPipeline`][pipeline::SharedPipeline] is the lock-guarded handle
//!   shared between tasks.
//! - [`node`] – [`AvoidanceNode`][node::AvoidanceNode]: subscribes to scan and
//!   tuning events on the bus and publishes collision vectors and window
//!   reports.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.

pub mod node;
pub mod pipeline;
pub mod telemetry;

pub use node::AvoidanceNode;
pub use pipeline::{CycleOutput, Pipeline, PipelineState, SharedPipeline};
pub use telemetry::{TracerProviderGuard, init_tracing};
