//! Conductor Monitoring
//!
//! Centralized metrics collection for the orchestration platform. Trace
//! events recorded by the tracer are translated into prometheus series via
//! [`MetricsCollector::observe_trace_event`]; components that know precise
//! timings call the `record_*` methods directly.

mod collector;

pub use collector::{MetricsCollector, MetricsError};
