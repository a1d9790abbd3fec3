//! Periodic network monitor: HTTP and ping probes per site, one stored
//! observation per site per cycle, with automatic retention.

pub mod config;
pub mod database;
pub mod health;
pub mod monitoring;
pub mod orchestrator;
pub mod pool;
pub mod validation;
