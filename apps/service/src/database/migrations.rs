use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 3;

/// Run database migrations
///
/// Safe to call from every process that opens the database; already
/// applied versions are skipped.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    // Create schema_migrations table first (tracks applied migrations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    // Check current schema version
    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Observation log").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Site configuration table").await?;
    }

    if current_version < 3 {
        run_migration_v3(conn).await?;
        record_migration(conn, 3, "Ping min/max reply times").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: one row per site per cycle.
/// A NULL `*_success` column means the probe was not attempted.
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_name TEXT NOT NULL,
            timestamp_ms INTEGER NOT NULL,
            http_success INTEGER,
            http_status_code INTEGER,
            http_latency_ms REAL,
            ping_success INTEGER,
            ping_packet_loss_percent REAL,
            ping_latency_ms REAL,
            overall_success INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_observations_timestamp ON observations(timestamp_ms)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_observations_site ON observations(site_name)", ()).await?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_observations_site_timestamp ON observations(site_name, timestamp_ms DESC)",
        (),
    )
    .await?;

    Ok(())
}

/// Migration v2: site definitions managed outside the monitor
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            url TEXT,
            ping_host TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            enable_http INTEGER NOT NULL DEFAULT 1,
            enable_ping INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_sites_enabled ON sites(enabled)", ()).await?;

    Ok(())
}

/// Migration v3: fastest/slowest ping reply per observation
async fn run_migration_v3(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE observations ADD COLUMN ping_min_ms REAL", ()).await?;
    conn.execute("ALTER TABLE observations ADD COLUMN ping_max_ms REAL", ()).await?;
    Ok(())
}
