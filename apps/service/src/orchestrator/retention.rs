//! Automatic retention and cleanup of observations.
//!
//! Observations older than the retention horizon (30 days by default)
//! are deleted by a background task that runs independently of the
//! monitoring cadence, or on demand via `--cleanup`.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::database::Store;

/// How long observations are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Days to keep observations
    pub days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { days: 30 }
    }
}

impl RetentionPolicy {
    pub fn new(days: u32) -> Self {
        Self { days }
    }

    /// Retention horizon as a duration
    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days))
    }
}

/// Deletes expired observations
pub struct RetentionSweeper {
    store: Arc<dyn Store>,
    policy: RetentionPolicy,
}

impl RetentionSweeper {
    /// Create a new retention sweeper
    pub fn new(store: Arc<dyn Store>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Run one sweep, returning the number of observations deleted
    pub async fn sweep(&self) -> Result<u64> {
        info!("Cleaning up observations older than {} days", self.policy.days);

        let deleted = self.store.prune_older_than(self.policy.horizon()).await?;

        info!("Data cleanup completed: {} observations deleted", deleted);
        Ok(deleted)
    }

    /// Start background cleanup task. The first sweep runs immediately.
    pub fn start_periodic(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                match self.sweep().await {
                    Ok(count) => {
                        debug!("Periodic cleanup completed: {} deleted", count);
                    }
                    Err(e) => {
                        warn!("Periodic cleanup failed: {:#}", e);
                    }
                }
            }
        })
    }
}
