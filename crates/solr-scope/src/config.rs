//! Process-wide settings and config files.
//!
//! Settings live in a single static guarded by a read/write lock. They are
//! read when something is constructed (a [`Criteria`](crate::Criteria)
//! reads the immutability default, a [`SolrBackend`](crate::SolrBackend)
//! without its own URL reads the read URL at request time), never pushed
//! into existing values.
//!
//! ```rust
//! use solr_scope::config::ScopeConfig;
//!
//! let config = ScopeConfig::from_yaml_str(
//!     "url: http://localhost:8983/solr/\n\
//!      mappings:\n  Offer:\n    title: { type: string }\n",
//! ).unwrap();
//! assert_eq!(config.mapping("Offer").unwrap().wire_field("title").unwrap(), "title_s");
//! ```

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, ScopeError};
use crate::field_mapper::AttributeMapping;
use crate::named_scope::ScopeHost;

/// Snapshot of the process-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// New criteria start out immutable.
    pub immutable_by_default: bool,
    /// Main (write) engine URL, without trailing slash.
    pub url: Option<String>,
    /// Read URL; falls back to `url`.
    pub read_url: Option<String>,
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

/// Returns a copy of the current settings.
pub fn settings() -> Settings {
    SETTINGS.read().clone()
}

/// Restores the defaults.
pub fn reset() {
    *SETTINGS.write() = Settings::default();
}

/// Whether criteria built from now on start immutable.
pub fn immutable_by_default() -> bool {
    SETTINGS.read().immutable_by_default
}

/// Sets whether criteria constructed from now on are immutable.
///
/// Existing criteria keep the mode they were created with.
pub fn set_immutable_by_default(immutable: bool) {
    SETTINGS.write().immutable_by_default = immutable;
}

/// Configured engine URL.
pub fn url() -> Option<String> {
    SETTINGS.read().url.clone()
}

/// Sets the engine URL, stripping trailing slashes.
pub fn set_url(url: Option<&str>) {
    SETTINGS.write().url = url.map(remove_trailing_slash);
}

/// The URL searches go to: the read URL when set, the main URL otherwise.
pub fn read_url() -> Option<String> {
    let settings = SETTINGS.read();
    settings.read_url.clone().or_else(|| settings.url.clone())
}

/// Sets a separate URL for searches.
pub fn set_read_url(url: Option<&str>) {
    SETTINGS.write().read_url = url.map(remove_trailing_slash);
}

/// Strips every trailing `/`.
pub fn remove_trailing_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Settings and attribute mappings as loaded from a file.
///
/// ```yaml
/// url: http://localhost:8983/solr
/// read_url: http://replica:8983/solr
/// immutable_by_default: true
/// mappings:
///   Offer:
///     title: { type: string }
///     location: { type: location }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub url: Option<String>,
    pub read_url: Option<String>,
    pub immutable_by_default: bool,
    /// Host type name to its attribute mapping.
    pub mappings: IndexMap<String, AttributeMapping>,
}

impl ScopeConfig {
    /// Parses a YAML config.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s)
            .map_err(|e| ScopeError::configuration(format!("invalid YAML config: {}", e)))
    }

    /// Parses a JSON config.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| ScopeError::configuration(format!("invalid JSON config: {}", e)))
    }

    /// Loads a `.json` file as JSON and anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::configuration(format!("unable to read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Mapping declared for a host type.
    pub fn mapping(&self, host: &str) -> Option<&AttributeMapping> {
        self.mappings.get(host)
    }

    /// Builds a scope host named `name` with its configured mapping.
    pub fn host(&self, name: &str) -> Result<ScopeHost> {
        let host = ScopeHost::new(name);
        match self.mapping(name) {
            Some(mapping) => host.attribute_mapping(mapping.clone()),
            None => Ok(host),
        }
    }

    /// Publishes the settings process-wide.
    ///
    /// Every mapping is checked first; nothing is published if one is invalid.
    pub fn install(&self) -> Result<()> {
        for mapping in self.mappings.values() {
            mapping.check_unambiguous()?;
        }
        let mut settings = SETTINGS.write();
        settings.immutable_by_default = self.immutable_by_default;
        settings.url = self.url.as_deref().map(remove_trailing_slash);
        settings.read_url = self.read_url.as_deref().map(remove_trailing_slash);
        debug!(
            url = ?settings.url,
            read_url = ?settings.read_url,
            immutable_by_default = settings.immutable_by_default,
            "installed search settings"
        );
        Ok(())
    }
}
