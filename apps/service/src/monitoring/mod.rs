pub mod checker;
/// Monitoring engine module - the per-cycle decision logic
///
/// This module is responsible for:
/// - Running HTTP and ping probes against a site
/// - Folding probe outcomes into one observation per site
/// - Scheduling cycles over the configured site set
/// - Loading site definitions fresh for every cycle
pub mod executor;
pub mod ping;
pub mod provider;
pub mod scheduler;
pub mod types;

pub use executor::CycleEvaluator;
pub use provider::{DatabaseSiteProvider, FileSiteProvider, SiteProvider, StaticSiteProvider};
pub use scheduler::{CycleLimit, CycleReport, MonitoringScheduler};
pub use types::{MonitorStatus, Observation, ProbeDetail, ProbeOutcome};
