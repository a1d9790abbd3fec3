/// Orchestrator module - coordinates all components
///
/// The orchestrator is the core coordinator that:
/// - Opens the database and keeps the shared store alive
/// - Chooses the site provider and seeds the `sites` table
/// - Runs the scheduler in single-shot or continuous mode
/// - Starts the retention sweeper alongside continuous monitoring
pub mod retention;


pub use retention::{RetentionPolicy, RetentionSweeper};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, SiteSource};
use crate::database::models::SiteRecord;
use crate::database::{DatabaseImpl, SiteRepository};
use crate::monitoring::{
    CycleEvaluator, CycleLimit, DatabaseSiteProvider, FileSiteProvider, MonitoringScheduler,
    SiteProvider,
};

/// Aborts a background task when dropped
struct TaskGuard(tokio::task::JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Main orchestrator for the monitoring service
pub struct Orchestrator {
    config: Arc<Config>,
    /// Config file re-read every cycle when sites come from the file
    config_path: PathBuf,
    database: Arc<DatabaseImpl>,
}

impl Orchestrator {
    /// Open the configured database. Failing here is fatal for the process.
    pub async fn new(config: Config, config_path: impl Into<PathBuf>) -> Result<Self> {
        info!("Initializing database {}...", config.database.path);
        let database = DatabaseImpl::open(&config.database.path)
            .await
            .with_context(|| format!("failed to initialize database {}", config.database.path))?;

        Ok(Self {
            config: Arc::new(config),
            config_path: config_path.into(),
            database: Arc::new(database),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> Arc<DatabaseImpl> {
        self.database.clone()
    }

    /// Provider for the configured site source. The database source is
    /// seeded from `[[sites]]` when its table is empty.
    pub async fn site_provider(&self) -> Result<Arc<dyn SiteProvider>> {
        match self.config.monitor.site_source {
            SiteSource::File => {
                info!("Loading sites from {}", self.config_path.display());
                Ok(Arc::new(FileSiteProvider::new(&self.config_path)))
            }
            SiteSource::Database => {
                let site_set = self.config.site_set();
                for rejected in &site_set.rejected {
                    warn!("Not seeding invalid site: {}", rejected);
                }

                let records: Vec<SiteRecord> = site_set.sites.iter().map(SiteRecord::from_site).collect();
                let seeded = self.database.seed_sites(&records).await?;
                if seeded > 0 {
                    info!("Seeded {} sites into the database", seeded);
                }

                Ok(Arc::new(DatabaseSiteProvider::new(self.database.clone())))
            }
        }
    }

    /// Scheduler over the configured provider and the shared store
    pub async fn scheduler(&self, evaluator: Arc<CycleEvaluator>) -> Result<MonitoringScheduler> {
        let provider = self.site_provider().await?;
        Ok(MonitoringScheduler::new(
            provider,
            evaluator,
            self.database.clone(),
            Duration::from_secs(self.config.monitor.interval_seconds),
        ))
    }

    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.database.clone(), RetentionPolicy::new(self.config.retention.days))
    }

    /// Run with the real HTTP client and system ping
    pub async fn run(&self, limit: CycleLimit) -> Result<u64> {
        let evaluator = Arc::new(CycleEvaluator::from_settings(&self.config.monitor)?);
        self.run_with(evaluator, limit).await
    }

    /// Run `limit` cycles. Unbounded runs also sweep expired observations
    /// in the background until this future completes or is dropped.
    pub async fn run_with(&self, evaluator: Arc<CycleEvaluator>, limit: CycleLimit) -> Result<u64> {
        let scheduler = self.scheduler(evaluator).await?;

        let _retention = match limit {
            CycleLimit::Unbounded => {
                let every = Duration::from_secs(self.config.retention.sweep_interval_hours * 3600);
                info!(
                    "Starting retention sweeper: {} days, every {} hours",
                    self.config.retention.days, self.config.retention.sweep_interval_hours
                );
                Some(TaskGuard(Arc::new(self.retention_sweeper()).start_periodic(every)))
            }
            CycleLimit::Count(_) => None,
        };

        info!(
            "Starting network monitor with {} second interval",
            self.config.monitor.interval_seconds
        );
        let cycles = scheduler.run(limit).await;
        info!("Monitoring stopped after {} cycles", cycles);
        Ok(cycles)
    }

    /// One retention sweep, for `--cleanup`
    pub async fn cleanup(&self) -> Result<u64> {
        self.retention_sweeper().sweep().await
    }
}
