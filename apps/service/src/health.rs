//! Liveness probe for container health checks (`--health-check`).

use anyhow::Result;
use chrono::{Duration, Utc};
use std::path::Path;

use crate::database::{DatabaseImpl, Store};

/// Observations newer than this count as recent activity
pub const RECENT_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthReport {
    /// Database file does not exist
    Missing,
    /// Database exists but holds no observations
    Empty,
    /// Observations recorded within the recent window
    Recent(u64),
    /// Only older observations; the monitor may still be starting up
    Stale(u64),
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthReport::Recent(_) | HealthReport::Stale(_))
    }
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthReport::Missing => write!(f, "database not found"),
            HealthReport::Empty => write!(f, "no observations recorded"),
            HealthReport::Recent(n) => {
                write!(f, "healthy: {} observations in the last {} minutes", n, RECENT_WINDOW_MINUTES)
            }
            HealthReport::Stale(n) => write!(f, "healthy (startup grace): {} observations total", n),
        }
    }
}

/// Inspect the database at `path` without creating it
pub async fn check_health(path: impl AsRef<Path>) -> Result<HealthReport> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await? {
        return Ok(HealthReport::Missing);
    }

    let database = DatabaseImpl::open(path).await?;

    let recent = database.count_since(Utc::now() - Duration::minutes(RECENT_WINDOW_MINUTES)).await?;
    if recent > 0 {
        return Ok(HealthReport::Recent(recent));
    }

    match database.count_all().await? {
        0 => Ok(HealthReport::Empty),
        total => Ok(HealthReport::Stale(total)),
    }
}
