//! Observability utilities.

mod subscriber;
mod timer;

pub use subscriber::{init_tracing, TracingConfig, LOG_ENV_VAR};
pub use timer::SpanTimer;
