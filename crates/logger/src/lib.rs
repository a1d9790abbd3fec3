//! Shared tracing setup for the netpulse binaries.

mod tracing;

pub use self::tracing::{LogFormat, init_tracing, init_tracing_with_level};
