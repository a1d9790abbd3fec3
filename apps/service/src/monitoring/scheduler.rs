use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::executor::CycleEvaluator;
use super::provider::SiteProvider;
use super::types::Observation;
use crate::database::Store;

/// How many cycles a scheduler run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleLimit {
    /// Stop after this many cycles
    Count(u64),
    /// Run until the task is dropped
    Unbounded,
}

impl CycleLimit {
    /// Single-shot mode
    pub const ONCE: CycleLimit = CycleLimit::Count(1);

    fn reached(&self, completed: u64) -> bool {
        match self {
            CycleLimit::Count(max) => completed >= *max,
            CycleLimit::Unbounded => false,
        }
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Sites evaluated this cycle
    pub sites: usize,
    /// Site definitions excluded by validation
    pub rejected: usize,
    pub stored: usize,
    pub store_failures: usize,
    pub sites_up: usize,
}

/// Drives the evaluator over every configured site on a fixed cadence
pub struct MonitoringScheduler {
    provider: Arc<dyn SiteProvider>,
    evaluator: Arc<CycleEvaluator>,
    store: Arc<dyn Store>,
    interval: Duration,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        provider: Arc<dyn SiteProvider>,
        evaluator: Arc<CycleEvaluator>,
        store: Arc<dyn Store>,
        interval: Duration,
    ) -> Self {
        Self { provider, evaluator, store, interval }
    }

    /// Run cycles until `limit` is reached.
    ///
    /// A cycle that overruns the interval is followed immediately by the
    /// next one; cycles never overlap. Returns the number of cycles run.
    pub async fn run(&self, limit: CycleLimit) -> u64 {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut completed = 0;
        loop {
            timer.tick().await;
            completed += 1;

            let span = info_span!("cycle", number = completed, id = %Uuid::new_v4());
            match self.run_cycle(completed).instrument(span).await {
                Ok(report) => info!(
                    cycle = report.cycle,
                    sites = report.sites,
                    up = report.sites_up,
                    stored = report.stored,
                    store_failures = report.store_failures,
                    "Completed monitoring cycle, stored {} results",
                    report.stored
                ),
                Err(e) => error!("Error in monitoring cycle {}: {:#}", completed, e),
            }

            if limit.reached(completed) {
                return completed;
            }
        }
    }

    /// Evaluate every site once and commit the observations.
    ///
    /// Fails only when the site set cannot be loaded. Evaluation panics and
    /// store errors are isolated per site.
    pub async fn run_cycle(&self, cycle: u64) -> Result<CycleReport> {
        info!("Loading configurations...");
        let site_set = self.provider.load_sites().await?;
        for rejected in &site_set.rejected {
            error!("Skipping invalid site configuration: {}", rejected);
        }

        if site_set.is_empty() {
            warn!("No valid sites configured");
        }

        info!("Starting monitoring cycle over {} sites", site_set.len());
        let evaluations = site_set.sites.iter().cloned().map(|site| {
            let evaluator = self.evaluator.clone();
            tokio::spawn(async move { evaluator.evaluate(&site).await })
        });
        let outcomes = join_all(evaluations).await;

        let observations: Vec<Observation> = outcomes
            .into_iter()
            .zip(&site_set.sites)
            .map(|(outcome, site)| match outcome {
                Ok(observation) => observation,
                Err(e) => {
                    error!("Error monitoring {}: {}", site.name(), e);
                    Observation::failed(site, Utc::now())
                }
            })
            .collect();

        let mut report = CycleReport {
            cycle,
            sites: observations.len(),
            rejected: site_set.rejected.len(),
            ..CycleReport::default()
        };

        // Appends are sequential so a cycle's writes never interleave
        for observation in &observations {
            if observation.overall_success {
                report.sites_up += 1;
            }
            match self.store.append(observation).await {
                Ok(_) => report.stored += 1,
                Err(e) => {
                    report.store_failures += 1;
                    error!(site = %observation.site_name, "Failed to store observation: {:#}", e);
                }
            }
        }

        Ok(report)
    }
}
