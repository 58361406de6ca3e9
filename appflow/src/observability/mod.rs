//! Observability utilities: log initialisation and stage timing.

mod logging;
mod timing;

pub use logging::{init_logging, LogFormat};
pub use timing::{stage_span, workflow_span, SpanTimer};
