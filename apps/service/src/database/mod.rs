/// Database abstraction layer
///
/// Observations and site definitions live in a local LibSQL (SQLite)
/// file shared by the monitor and the status API.

pub mod repository;
pub mod migrations;
pub mod models;

#[cfg(test)]
mod tests;

pub use repository::{DatabaseImpl, SiteRepository, Store};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
