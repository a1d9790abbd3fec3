use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::validation::{RawTarget, SiteConfig, SiteSet};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available (neither XDG_CONFIG_HOME nor HOME is set)")]
    ConfigPathUnavailable,
    #[error("invalid setting {setting}: {reason}")]
    Invalid { setting: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub monitor: MonitorSettings,
    pub retention: RetentionSettings,
    pub sites: Vec<SiteEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_seconds: u64,
    pub http_timeout_seconds: u64,
    pub ping_timeout_seconds: u64,
    pub ping_count: u32,
    pub site_source: SiteSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub days: u32,
    pub sweep_interval_hours: u64,
}

/// Where the monitored set is read from at the start of each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteSource {
    /// `[[sites]]` of the config file, re-read every cycle
    File,
    /// `sites` table, seeded from the config file when empty
    #[default]
    Database,
}

impl fmt::Display for SiteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteSource::File => write!(f, "file"),
            SiteSource::Database => write!(f, "database"),
        }
    }
}

/// A `[[sites]]` entry exactly as written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<RawTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_host: Option<RawTarget>,
}

impl SiteEntry {
    fn new(name: &str, url: Option<&str>, ping_host: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            url: url.map(|u| RawTarget::Text(u.to_string())),
            ping_host: ping_host.map(|h| RawTarget::Text(h.to_string())),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "network_monitor.db".into() }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            http_timeout_seconds: 10,
            ping_timeout_seconds: 5,
            ping_count: 3,
            site_source: SiteSource::default(),
            user_agent: None,
        }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self { days: 30, sweep_interval_hours: 24 }
    }
}

/// Sites monitored out of the box
pub fn default_sites() -> Vec<SiteEntry> {
    vec![
        SiteEntry::new("Google", Some("https://www.google.com"), Some("8.8.8.8")),
        SiteEntry::new("GitHub", Some("https://github.com"), Some("github.com")),
        SiteEntry::new("Cloudflare", Some("https://www.cloudflare.com"), Some("1.1.1.1")),
        SiteEntry::new("Amazon", Some("https://www.amazon.com"), Some("amazon.com")),
        // Blocks ICMP
        SiteEntry::new("Microsoft", Some("https://www.microsoft.com"), None),
        SiteEntry::new("Netflix", Some("https://www.netflix.com"), None),
        // DNS server, no web interface
        SiteEntry::new("Google DNS Secondary", None, Some("8.8.4.4")),
    ]
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/netpulse/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("netpulse/config.toml"))
}

/// Resolve the config path the same way [`Config::from_config`] does
pub fn resolve_config_path(
    optional_path: Option<impl AsRef<path::Path>>,
) -> Result<path::PathBuf, ConfigError> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

/// Override `target` from an environment variable if it parses
fn env_override<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(raw) = env::var(name) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring invalid {}={:?}", name, raw),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Interval (s)", &self.monitor.interval_seconds)?;
        write_1(f, "HTTP timeout (s)", &self.monitor.http_timeout_seconds)?;
        write_1(f, "Ping timeout (s)", &self.monitor.ping_timeout_seconds)?;
        write_1(f, "Ping count", &self.monitor.ping_count)?;
        write_1(f, "Site source", &self.monitor.site_source)?;
        write_title_1(f, "Retention")?;
        write_1(f, "Days", &self.retention.days)?;
        write_1(f, "Sweep interval (h)", &self.retention.sweep_interval_hours)?;
        write_title_1(f, "Sites")?;
        for site in &self.sites {
            write_1(f, "Name", &site.name)?;
        }

        Ok(())
    }
}

impl Config {
    /// Built-in defaults including the default site list
    pub fn with_default_sites() -> Self {
        Self { sites: default_sites(), ..Self::default() }
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/netpulse/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = resolve_config_path(optional_path)?;

        if config_path.exists() {
            Self::read(&config_path)
        } else {
            let config = Self::with_default_sites();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Load file, apply environment overrides and validate
    pub fn load(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let mut config = Self::from_config(optional_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`] but never writes: a missing file means defaults
    pub fn load_existing(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = resolve_config_path(optional_path)?;

        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without creating it
    pub fn read(path: &path::Path) -> Result<Self, ConfigError> {
        let raw_string = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFailed { path: path.to_path_buf(), source })?;
        Ok(toml::from_str(raw_string.as_str())?)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    /// `DATABASE_PATH`, `CHECK_INTERVAL_SECONDS` and `RETENTION_DAYS` win over the file
    pub fn apply_env_overrides(&mut self) {
        env_override("DATABASE_PATH", &mut self.database.path);
        env_override("CHECK_INTERVAL_SECONDS", &mut self.monitor.interval_seconds);
        env_override("RETENTION_DAYS", &mut self.retention.days);
    }

    /// Check numeric settings are within sane bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn in_range<T: PartialOrd + fmt::Display>(
            setting: &'static str,
            value: T,
            min: T,
            max: T,
        ) -> Result<(), ConfigError> {
            if value < min || value > max {
                return Err(ConfigError::Invalid {
                    setting,
                    reason: format!("{value} is outside {min}..={max}"),
                });
            }
            Ok(())
        }

        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                setting: "database.path",
                reason: "cannot be empty".into(),
            });
        }
        in_range("monitor.interval_seconds", self.monitor.interval_seconds, 1, 86_400)?;
        in_range("monitor.http_timeout_seconds", self.monitor.http_timeout_seconds, 1, 300)?;
        in_range("monitor.ping_timeout_seconds", self.monitor.ping_timeout_seconds, 1, 300)?;
        in_range("monitor.ping_count", self.monitor.ping_count, 1, 10)?;
        in_range("retention.days", self.retention.days, 1, 3650)?;
        in_range("retention.sweep_interval_hours", self.retention.sweep_interval_hours, 1, 24 * 365)?;

        Ok(())
    }

    /// Validate `[[sites]]` into a monitored set
    pub fn site_set(&self) -> SiteSet {
        SiteSet::collect(
            self.sites
                .iter()
                .map(|entry| SiteConfig::from_raw(&entry.name, entry.url.as_ref(), entry.ping_host.as_ref())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_written_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netpulse");

        let config = Config::from_config(Some(&path)).unwrap();

        assert!(dir.path().join("netpulse.toml").exists());
        assert_eq!(config.sites.len(), 7);
        assert_eq!(config.monitor.interval_seconds, 60);
        assert_eq!(config.retention.days, 30);

        // What was written reads back the same
        let reread = Config::read(&dir.path().join("netpulse.toml")).unwrap();
        assert_eq!(reread.sites, config.sites);
    }

    #[test]
    fn test_parse_sites_with_absent_targets() {
        let raw = r#"
            [monitor]
            interval_seconds = 30
            site_source = "file"

            [[sites]]
            name = "Router"
            url = "http://192.168.1.1"
            ping_host = false

            [[sites]]
            name = "Mail"
            url = ""
            ping_host = "mail.example.com"

            [[sites]]
            name = "Broken"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.monitor.interval_seconds, 30);
        assert_eq!(config.monitor.site_source, SiteSource::File);
        assert_eq!(config.monitor.ping_count, 3);

        let set = config.site_set();
        assert_eq!(set.len(), 2);
        assert!(!set.sites[0].ping_enabled());
        assert!(!set.sites[1].http_enabled());
        assert_eq!(set.rejected.len(), 1);
    }

    #[test]
    fn test_default_sites_are_valid() {
        let set = Config::with_default_sites().site_set();
        assert_eq!(set.len(), 7);
        assert!(set.rejected.is_empty());
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.monitor.interval_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { setting: "monitor.interval_seconds", .. })
        ));

        let mut config = Config::default();
        config.retention.days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitor.ping_count = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unreadable_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "monitor = [").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_load_existing_does_not_create_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load_existing(Some(&path)).unwrap();

        assert!(!path.exists());
        assert!(config.sites.is_empty());
        assert!(!config.database.path.is_empty());
    }

    #[test]
    fn test_load_existing_reads_database_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("present.toml");
        fs::write(&path, "[database]\npath = \"/var/lib/netpulse/monitor.db\"\n").unwrap();

        let config = Config::load_existing(Some(&path)).unwrap();
        if env::var("DATABASE_PATH").is_err() {
            assert_eq!(config.database.path, "/var/lib/netpulse/monitor.db");
        }
    }
}
