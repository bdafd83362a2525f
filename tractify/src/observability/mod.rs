//! Logging setup and timing helpers.

mod logging;

pub use logging::{init_logging, LoggingConfig, SpanTimer};
