//! Sources of the monitored site set, consulted at the start of every cycle.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, default_sites};
use crate::database::SiteRepository;
use crate::validation::{SiteConfig, SiteSet};

/// Supplies the current site definitions. Must not cache: every call
/// reflects the latest configuration.
#[async_trait::async_trait]
pub trait SiteProvider: Send + Sync {
    async fn load_sites(&self) -> Result<SiteSet>;
}

/// Fixed list of sites
pub struct StaticSiteProvider {
    sites: Vec<SiteConfig>,
}

impl StaticSiteProvider {
    pub fn new(sites: Vec<SiteConfig>) -> Self {
        Self { sites }
    }
}

#[async_trait::async_trait]
impl SiteProvider for StaticSiteProvider {
    async fn load_sites(&self) -> Result<SiteSet> {
        Ok(SiteSet { sites: self.sites.clone(), rejected: Vec::new() })
    }
}

/// `[[sites]]` of the config file, re-read on every call
pub struct FileSiteProvider {
    path: PathBuf,
}

impl FileSiteProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl SiteProvider for FileSiteProvider {
    async fn load_sites(&self) -> Result<SiteSet> {
        let path = self.path.clone();
        let exists = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to check config file {}", path.display()))?;

        if !exists {
            tracing::warn!("Config file {} disappeared, using default sites", path.display());
            let config = Config { sites: default_sites(), ..Config::default() };
            return Ok(config.site_set());
        }

        let config = tokio::task::spawn_blocking(move || Config::read(&path)).await??;
        Ok(config.site_set())
    }
}

/// Enabled rows of the `sites` table
pub struct DatabaseSiteProvider {
    repository: Arc<dyn SiteRepository>,
}

impl DatabaseSiteProvider {
    pub fn new(repository: Arc<dyn SiteRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait::async_trait]
impl SiteProvider for DatabaseSiteProvider {
    async fn load_sites(&self) -> Result<SiteSet> {
        let records = self.repository.enabled_sites().await?;
        Ok(SiteSet::collect(records.iter().map(|record| record.to_site_config())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseImpl;
    use crate::database::models::SiteRecord;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_provider_rereads_changes() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[sites]]\nname = \"A\"\nurl = \"https://a.example\"\n")?;

        let provider = FileSiteProvider::new(&path);
        assert_eq!(provider.load_sites().await?.len(), 1);

        std::fs::write(
            &path,
            "[[sites]]\nname = \"A\"\nurl = \"https://a.example\"\n\n[[sites]]\nname = \"B\"\nping_host = \"1.1.1.1\"\n",
        )?;
        let set = provider.load_sites().await?;
        assert_eq!(set.len(), 2);
        assert_eq!(set.sites[1].name(), "B");
        Ok(())
    }

    #[tokio::test]
    async fn test_file_provider_reports_rejected_entries() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[sites]]\nname = \"Empty\"\nurl = false\nping_host = \"\"\n")?;

        let set = FileSiteProvider::new(&path).load_sites().await?;
        assert!(set.is_empty());
        assert_eq!(set.rejected.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_provider_missing_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let set = FileSiteProvider::new(dir.path().join("gone.toml")).load_sites().await?;
        assert_eq!(set.len(), default_sites().len());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_provider_unreadable_location_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, "")?;

        let provider = FileSiteProvider::new(not_a_dir.join("config.toml"));
        assert!(provider.load_sites().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_database_provider_sees_updates() -> Result<()> {
        let dir = tempdir()?;
        let db = Arc::new(DatabaseImpl::open(dir.path().join("sites.db")).await?);
        let provider = DatabaseSiteProvider::new(db.clone());

        assert!(provider.load_sites().await?.is_empty());

        let mut record = SiteRecord::new("A", Some("https://a.example".into()), Some("1.1.1.1".into()));
        record.enable_ping = false;
        db.save_site(&record).await?;

        let set = provider.load_sites().await?;
        assert_eq!(set.len(), 1);
        assert!(!set.sites[0].ping_enabled());
        Ok(())
    }
}
