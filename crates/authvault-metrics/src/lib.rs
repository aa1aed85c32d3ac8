//! Request-scoped context propagation and the Prometheus metric surface
//! (spec.md §5 "Context propagation", §6 "Metrics").

pub mod context;
pub mod metrics;

pub use context::RequestContext;
pub use metrics::Metrics;
