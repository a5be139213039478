//! Shared utilities for faceid.

pub mod logging;

pub use logging::{init_logging, try_init_logging, LogFormat, LoggingError};
