use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::checker::{DEFAULT_USER_AGENT, HttpProbe, PingProbe, Probe};
use super::ping::SystemPing;
use super::types::{Observation, ProbeOutcome};
use crate::config::MonitorSettings;
use crate::validation::SiteConfig;

/// Evaluates one site against its enabled probes and folds the outcomes
/// into a single [`Observation`]. Does not touch the store.
pub struct CycleEvaluator {
    http_probe: Arc<dyn Probe>,
    ping_probe: Arc<dyn Probe>,
}

impl CycleEvaluator {
    /// Create an evaluator from arbitrary probes
    pub fn new(http_probe: Arc<dyn Probe>, ping_probe: Arc<dyn Probe>) -> Self {
        Self { http_probe, ping_probe }
    }

    /// Create an evaluator using the real HTTP client and system ping
    pub fn from_settings(settings: &MonitorSettings) -> Result<Self> {
        let user_agent = settings.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let http = HttpProbe::new(settings.http_timeout_seconds, user_agent)?;
        let ping = PingProbe::new(SystemPing::new(settings.ping_count, settings.ping_timeout_seconds));

        Ok(Self::new(Arc::new(http), Arc::new(ping)))
    }

    /// Evaluate a site. Never fails: probe problems are recorded as
    /// unsuccessful outcomes.
    pub async fn evaluate(&self, site: &SiteConfig) -> Observation {
        let timestamp = Utc::now();

        let http = async {
            match site.url() {
                Some(url) => self.http_probe.probe(url).await,
                None => ProbeOutcome::skipped(),
            }
        };
        let ping = async {
            match site.ping_host() {
                Some(host) => self.ping_probe.probe(host).await,
                None => ProbeOutcome::skipped(),
            }
        };
        let (http, ping) = tokio::join!(http, ping);

        let observation = Observation::new(site.name(), timestamp, http, ping);

        info!(
            site = site.name(),
            http = verdict(&observation.http),
            ping = verdict(&observation.ping),
            overall = observation.overall_success,
            "Monitored {}",
            site.name()
        );

        observation
    }
}

fn verdict(outcome: &ProbeOutcome) -> &'static str {
    match (outcome.attempted, outcome.success) {
        (false, _) => "skipped",
        (true, true) => "ok",
        (true, false) => "failed",
    }
}
