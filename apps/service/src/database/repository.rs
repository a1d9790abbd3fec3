use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::{Row, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::models::{SiteRecord, SiteSummary, StatusCounts, millis_to_timestamp, timestamp_to_millis};
use crate::monitoring::types::{Observation, ProbeDetail, ProbeOutcome};
use crate::pool::{LibsqlManager, LibsqlPool, open_pool};

const OBSERVATION_COLUMNS: &str = "id, site_name, timestamp_ms, http_success, http_status_code, http_latency_ms, \
     ping_success, ping_packet_loss_percent, ping_latency_ms, overall_success, ping_min_ms, ping_max_ms";

const SITE_COLUMNS: &str =
    "id, name, url, ping_host, enabled, enable_http, enable_ping, created_at, updated_at";

/// Durable, append-only log of observations
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert one observation; flushed to disk before returning
    async fn append(&self, observation: &Observation) -> Result<i64>;

    /// Observations in `[since, until]` ordered by timestamp ascending.
    /// `site = None` covers every site; open bounds are unbounded.
    async fn query_range(
        &self,
        site: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Observation>>;

    /// Most recent observation of every site that has one
    async fn latest_per_site(&self) -> Result<Vec<Observation>>;

    /// Delete observations strictly older than `cutoff`
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Per-site aggregates since `since`, best uptime first
    async fn site_summary(&self, since: DateTime<Utc>) -> Result<Vec<SiteSummary>>;

    /// Number of observations at or after `since`
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Total number of observations
    async fn count_all(&self) -> Result<u64>;

    /// Delete observations older than `now - horizon`
    async fn prune_older_than(&self, horizon: Duration) -> Result<u64> {
        self.prune_before(Utc::now() - horizon).await
    }

    /// Total sites and sites currently up
    async fn status_counts(&self) -> Result<StatusCounts> {
        Ok(StatusCounts::from_latest(&self.latest_per_site().await?))
    }
}

/// Storage for site definitions written by the configuration UI
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// Every stored site ordered by name
    async fn list_sites(&self) -> Result<Vec<SiteRecord>>;

    /// Sites with `enabled = 1`, ordered by name
    async fn enabled_sites(&self) -> Result<Vec<SiteRecord>>;

    /// Insert (no id) or update (with id); validated first
    async fn save_site(&self, site: &SiteRecord) -> Result<i64>;

    /// Delete a site by id
    async fn delete_site(&self, id: i64) -> Result<()>;

    /// Insert `sites` only when the table is empty; returns rows inserted
    async fn seed_sites(&self, sites: &[SiteRecord]) -> Result<usize>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
    /// One writer at a time within this process
    write_lock: Arc<Mutex<()>>,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool, write_lock: Arc::new(Mutex::new(())) }
    }

    /// Open a database file, run migrations and return a ready store
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = open_pool(path).await?;
        {
            let conn = pool.get().await.context("failed to get database connection")?;
            super::initialize_database(&conn).await.context("failed to migrate database")?;
        }
        Ok(Self::new_from_pool(pool))
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn count(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}

fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

/// NULL success means "not attempted"
fn outcome_columns(outcome: &ProbeOutcome) -> Option<i64> {
    outcome.attempted.then(|| bool_to_i64(outcome.success))
}

fn read_outcome(
    success: Option<i64>,
    latency_ms: Option<f64>,
    detail: Option<ProbeDetail>,
) -> ProbeOutcome {
    match success {
        None => ProbeOutcome::skipped(),
        Some(success) => ProbeOutcome {
            success: success != 0,
            latency_ms,
            ..ProbeOutcome::failure(None, detail)
        },
    }
}

fn observation_from_row(row: &Row) -> Result<Observation> {
    let http = read_outcome(
        row.get::<Option<i64>>(3)?,
        row.get::<Option<f64>>(5)?,
        row.get::<Option<i64>>(4)?.map(|code| ProbeDetail::StatusCode(code as u16)),
    );
    let ping = read_outcome(
        row.get::<Option<i64>>(6)?,
        row.get::<Option<f64>>(8)?,
        row.get::<Option<f64>>(7)?.map(ProbeDetail::PacketLoss),
    )
    .with_latency_range(row.get::<Option<f64>>(10)?, row.get::<Option<f64>>(11)?);

    Ok(Observation {
        site_name: row.get(1)?,
        timestamp: millis_to_timestamp(row.get::<i64>(2)?),
        http,
        ping,
        overall_success: row.get::<i64>(9)? != 0,
    })
}

fn site_from_row(row: &Row) -> Result<SiteRecord> {
    Ok(SiteRecord {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        url: row.get(2)?,
        ping_host: row.get(3)?,
        enabled: row.get::<i64>(4)? != 0,
        enable_http: row.get::<i64>(5)? != 0,
        enable_ping: row.get::<i64>(6)? != 0,
        created_at: millis_to_timestamp(row.get::<i64>(7)?),
        updated_at: millis_to_timestamp(row.get::<i64>(8)?),
    })
}

async fn collect_rows<T>(
    mut rows: libsql::Rows,
    map: impl Fn(&Row) -> Result<T>,
) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(map(&row)?);
    }
    Ok(items)
}

#[async_trait]
impl Store for DatabaseImpl {
    async fn append(&self, observation: &Observation) -> Result<i64> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO observations (site_name, timestamp_ms, http_success, http_status_code, http_latency_ms, ping_success, ping_packet_loss_percent, ping_latency_ms, overall_success, ping_min_ms, ping_max_ms) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                observation.site_name.clone(),
                timestamp_to_millis(observation.timestamp),
                outcome_columns(&observation.http),
                observation.http.status_code().map(i64::from),
                observation.http.latency_ms,
                outcome_columns(&observation.ping),
                observation.ping.packet_loss(),
                observation.ping.latency_ms,
                bool_to_i64(observation.overall_success),
                observation.ping.min_latency_ms,
                observation.ping.max_latency_ms
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn query_range(
        &self,
        site: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Observation>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM observations \
             WHERE (?1 IS NULL OR site_name = ?1) AND timestamp_ms >= ?2 AND timestamp_ms <= ?3 \
             ORDER BY timestamp_ms ASC, id ASC"
        );

        let rows = conn
            .query(
                &sql,
                params![
                    site.map(str::to_string),
                    since.map(timestamp_to_millis).unwrap_or(i64::MIN),
                    until.map(timestamp_to_millis).unwrap_or(i64::MAX)
                ],
            )
            .await?;

        collect_rows(rows, observation_from_row).await
    }

    async fn latest_per_site(&self) -> Result<Vec<Observation>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS} FROM (
                SELECT *, ROW_NUMBER() OVER (PARTITION BY site_name ORDER BY timestamp_ms DESC, id DESC) AS rn
                FROM observations
            ) WHERE rn = 1 ORDER BY site_name"
        );

        let rows = conn.query(&sql, ()).await?;
        collect_rows(rows, observation_from_row).await
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute(
                "DELETE FROM observations WHERE timestamp_ms < ?",
                params![timestamp_to_millis(cutoff)],
            )
            .await?;

        Ok(deleted)
    }

    async fn site_summary(&self, since: DateTime<Utc>) -> Result<Vec<SiteSummary>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT site_name,
                        COUNT(*),
                        SUM(CASE WHEN overall_success = 1 THEN 1 ELSE 0 END),
                        AVG(http_latency_ms),
                        AVG(ping_latency_ms),
                        AVG(ping_packet_loss_percent)
                 FROM observations
                 WHERE timestamp_ms >= ?
                 GROUP BY site_name",
                params![timestamp_to_millis(since)],
            )
            .await?;

        let mut summaries = collect_rows(rows, |row| {
            let total_checks = row.get::<i64>(1)?.max(0) as u64;
            let successful_checks = row.get::<Option<i64>>(2)?.unwrap_or(0).max(0) as u64;
            let uptime_percent = if total_checks == 0 {
                0.0
            } else {
                successful_checks as f64 / total_checks as f64 * 100.0
            };

            Ok(SiteSummary {
                site_name: row.get(0)?,
                total_checks,
                successful_checks,
                uptime_percent,
                avg_http_latency_ms: row.get(3)?,
                avg_ping_latency_ms: row.get(4)?,
                avg_packet_loss_percent: row.get(5)?,
            })
        })
        .await?;

        summaries.sort_by(|a, b| {
            b.uptime_percent
                .total_cmp(&a.uptime_percent)
                .then_with(|| a.site_name.cmp(&b.site_name))
        });
        Ok(summaries)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM observations WHERE timestamp_ms >= ?",
            params![timestamp_to_millis(since)],
        )
        .await
    }

    async fn count_all(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM observations", ()).await
    }
}

#[async_trait]
impl SiteRepository for DatabaseImpl {
    async fn list_sites(&self) -> Result<Vec<SiteRecord>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY name"), ())
            .await?;
        collect_rows(rows, site_from_row).await
    }

    async fn enabled_sites(&self) -> Result<Vec<SiteRecord>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE enabled = 1 ORDER BY name"), ())
            .await?;
        collect_rows(rows, site_from_row).await
    }

    async fn save_site(&self, site: &SiteRecord) -> Result<i64> {
        site.validate()?;

        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let updated_at = timestamp_to_millis(Utc::now());

        if let Some(id) = site.id {
            conn.execute(
                "UPDATE sites SET name = ?, url = ?, ping_host = ?, enabled = ?, enable_http = ?, enable_ping = ?, updated_at = ? WHERE id = ?",
                params![
                    site.name.trim().to_string(),
                    site.url.clone(),
                    site.ping_host.clone(),
                    bool_to_i64(site.enabled),
                    bool_to_i64(site.enable_http),
                    bool_to_i64(site.enable_ping),
                    updated_at,
                    id
                ],
            )
            .await
            .with_context(|| format!("failed to update site '{}'", site.name))?;
            Ok(id)
        } else {
            conn.execute(
                "INSERT INTO sites (name, url, ping_host, enabled, enable_http, enable_ping, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    site.name.trim().to_string(),
                    site.url.clone(),
                    site.ping_host.clone(),
                    bool_to_i64(site.enabled),
                    bool_to_i64(site.enable_http),
                    bool_to_i64(site.enable_ping),
                    timestamp_to_millis(site.created_at),
                    updated_at
                ],
            )
            .await
            .with_context(|| format!("failed to insert site '{}'", site.name))?;
            Ok(conn.last_insert_rowid())
        }
    }

    async fn delete_site(&self, id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM sites WHERE id = ?", params![id]).await?;
        Ok(())
    }

    async fn seed_sites(&self, sites: &[SiteRecord]) -> Result<usize> {
        let existing = self.count("SELECT COUNT(*) FROM sites", ()).await?;
        if existing > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for site in sites {
            self.save_site(site).await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}
