use std::collections::HashSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Reasons a site definition is rejected before it is ever monitored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SiteError {
    #[error("Site name is required")]
    MissingName,
    #[error("Site name too long (max 100 characters)")]
    NameTooLong,
    #[error("Site '{0}': no tests enabled - must specify either 'url' or 'ping_host'")]
    NoTestsEnabled(String),
    #[error("Site '{site}': URL is required when HTTP test is enabled")]
    MissingUrl { site: String },
    #[error("Site '{site}': ping host is required when ping test is enabled")]
    MissingPingHost { site: String },
    #[error("Site '{site}': {reason}")]
    InvalidUrl { site: String, reason: String },
    #[error("Site '{site}': {reason}")]
    InvalidPingHost { site: String, reason: String },
    #[error("Site '{site}': 'true' is not a valid {field}")]
    BooleanTarget { site: String, field: &'static str },
    #[error("Duplicate site name '{0}'")]
    DuplicateName(String),
}

/// A probe target as written in configuration: a string, or `false`
/// to disable the probe explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTarget {
    Text(String),
    Flag(bool),
}

/// Collapse `None`, empty/blank strings and `false` into "absent".
///
/// `true` carries no target and is reported back as `Err(())` so the
/// caller can attach the site and field.
pub fn normalize_target(raw: Option<&RawTarget>) -> Result<Option<String>, ()> {
    match raw {
        None | Some(RawTarget::Flag(false)) => Ok(None),
        Some(RawTarget::Flag(true)) => Err(()),
        Some(RawTarget::Text(text)) => {
            let trimmed = text.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
    }
}

/// A validated site definition. At least one of `url` / `ping_host`
/// is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteConfig {
    name: String,
    url: Option<String>,
    ping_host: Option<String>,
}

impl SiteConfig {
    /// Build a site from already-optional targets. Blank strings count as absent.
    pub fn new(
        name: impl Into<String>,
        url: Option<String>,
        ping_host: Option<String>,
    ) -> Result<Self, SiteError> {
        let name = validate_site_name(&name.into())?;
        let url = url.map(RawTarget::Text);
        let ping_host = ping_host.map(RawTarget::Text);
        Self::from_raw(&name, url.as_ref(), ping_host.as_ref())
    }

    /// Build a site from raw configuration values
    pub fn from_raw(
        name: &str,
        url: Option<&RawTarget>,
        ping_host: Option<&RawTarget>,
    ) -> Result<Self, SiteError> {
        let name = validate_site_name(name)?;

        let url = normalize_target(url)
            .map_err(|()| SiteError::BooleanTarget { site: name.clone(), field: "url" })?;
        let ping_host = normalize_target(ping_host)
            .map_err(|()| SiteError::BooleanTarget { site: name.clone(), field: "ping_host" })?;

        if url.is_none() && ping_host.is_none() {
            return Err(SiteError::NoTestsEnabled(name));
        }
        if let Some(url) = &url {
            validate_http_endpoint(url)
                .map_err(|reason| SiteError::InvalidUrl { site: name.clone(), reason })?;
        }
        if let Some(host) = &ping_host {
            validate_ping_host(host)
                .map_err(|reason| SiteError::InvalidPingHost { site: name.clone(), reason })?;
        }

        Ok(Self { name, url, ping_host })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn ping_host(&self) -> Option<&str> {
        self.ping_host.as_deref()
    }

    pub fn http_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub fn ping_enabled(&self) -> bool {
        self.ping_host.is_some()
    }
}

/// Validated sites plus whatever was rejected on the way
#[derive(Debug, Default)]
pub struct SiteSet {
    pub sites: Vec<SiteConfig>,
    pub rejected: Vec<SiteError>,
}

impl SiteSet {
    /// Keep valid entries, drop later duplicates of an already-seen name.
    pub fn collect(entries: impl IntoIterator<Item = Result<SiteConfig, SiteError>>) -> Self {
        let mut seen = HashSet::new();
        let mut set = SiteSet::default();

        for entry in entries {
            match entry {
                Ok(site) if !seen.insert(site.name().to_string()) => {
                    set.rejected.push(SiteError::DuplicateName(site.name().to_string()));
                }
                Ok(site) => set.sites.push(site),
                Err(e) => set.rejected.push(e),
            }
        }

        set
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }
}

/// Validate site name, returning the trimmed form
pub fn validate_site_name(name: &str) -> Result<String, SiteError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(SiteError::MissingName);
    }

    if trimmed.chars().count() > 100 {
        return Err(SiteError::NameTooLong);
    }

    Ok(trimmed.to_string())
}

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> Result<(), String> {
    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(format!("Invalid scheme '{scheme}'. Must be http or https"));
            }

            if url.host_str().is_none() {
                return Err("URL must have a valid host".to_string());
            }

            Ok(())
        }
        Err(e) => {
            if !target.contains("://") {
                Err("URL must include scheme (http:// or https://)".to_string())
            } else {
                Err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate ping host (IP address or hostname)
pub fn validate_ping_host(target: &str) -> Result<(), String> {
    if target.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if target.contains(char::is_whitespace) {
        return Err("Ping host cannot contain spaces".to_string());
    }

    // Leading '-' would be read as a flag by the ping binary
    if target.starts_with('-') || target.ends_with('-') {
        return Err("Hostname cannot start or end with hyphen".to_string());
    }

    if target.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        Ok(())
    } else {
        Err("Invalid hostname. Use IP address or valid hostname".to_string())
    }
}
