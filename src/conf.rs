//! Shared job configuration
//!
//! [`JobConf`] is the flat string map every process of a job sees. The driver
//! reads its negotiation settings from it and writes the backend decision back
//! into it before it is shipped to workers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{DelegationError, Result};

/// Configuration keys understood by this crate
pub mod keys {
    pub const ACCESS_ID: &str = "spark.rss.access.id";
    pub const ACCESS_TIMEOUT_MS: &str = "spark.rss.access.timeout.ms";
    pub const COORDINATOR_QUORUM: &str = "spark.rss.coordinator.quorum";
    pub const ASSIGNMENT_TAGS: &str = "spark.rss.client.assignment.tags";
    pub const ACCESS_RETRY_TIMES: &str = "spark.rss.client.access.retry.times";
    pub const ACCESS_RETRY_INTERVAL_MS: &str = "spark.rss.client.access.retry.interval.ms";
    pub const RSS_ENABLED: &str = "spark.rss.enabled";
    pub const SHUFFLE_MANAGER: &str = "spark.shuffle.manager";
}

pub const DEFAULT_ACCESS_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ACCESS_RETRY_INTERVAL_MS: u64 = 20_000;

/// Tag every client advertises so coordinators can match compatible servers
pub const CLIENT_VERSION_TAG: &str = "ss_v4";

/// Flat key/value job configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobConf {
    entries: BTreeMap<String, String>,
}

impl JobConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a boolean setting, accepting `true`/`false` in any case
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(DelegationError::Config(format!(
                "{} must be true or false, got {:?}",
                key, v
            ))),
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(default),
            Some(v) => v.parse().map_err(|_| {
                DelegationError::Config(format!("{} must be a non-negative integer, got {:?}", key, v))
            }),
        }
    }

    /// Parse a TOML document, flattening nested tables into dotted keys.
    ///
    /// Both `"spark.rss.enabled" = "true"` and `[spark.rss]` / `enabled = true`
    /// produce the same entry, so a document using both spellings for one key
    /// is rejected.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(s)?;
        let mut conf = JobConf::new();
        flatten_into(&mut conf, None, table)?;
        Ok(conf)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(&self.entries)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

fn flatten_into(conf: &mut JobConf, prefix: Option<&str>, table: toml::Table) -> Result<()> {
    for (key, value) in table {
        let key = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key,
        };
        let value = match value {
            toml::Value::Table(inner) => {
                flatten_into(conf, Some(&key), inner)?;
                continue;
            }
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            toml::Value::Datetime(_) => {
                return Err(DelegationError::Config(format!(
                    "{} must not be a datetime",
                    key
                )))
            }
        };

        // A quoted dotted key and a nested table can spell the same entry.
        if conf.contains(&key) {
            return Err(DelegationError::Config(format!("duplicate key {}", key)));
        }
        conf.set(key, value);
    }
    Ok(())
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobConf {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Coordinator endpoints from the quorum setting, in configured order
pub fn coordinator_endpoints(conf: &JobConf) -> Vec<String> {
    conf.get(keys::COORDINATOR_QUORUM)
        .map(|v| split_list(v).map(String::from).collect())
        .unwrap_or_default()
}

/// Tags sent to coordinators: the configured tags plus the client version tag
pub fn assignment_tags(conf: &JobConf) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = conf
        .get(keys::ASSIGNMENT_TAGS)
        .map(|v| split_list(v).map(String::from).collect())
        .unwrap_or_default();
    tags.insert(CLIENT_VERSION_TAG.to_string());
    tags
}

/// Negotiation settings the driver reads from the job configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationConfig {
    /// Access id, already trimmed; empty means no negotiation is possible
    pub access_id: String,
    pub access_timeout: Duration,
    /// Coordinator endpoints in configured order
    pub coordinators: Vec<String>,
    pub assignment_tags: BTreeSet<String>,
    /// Extra passes over the coordinator list after an all-unreachable pass
    pub retry_times: u32,
    pub retry_interval: Duration,
}

impl DelegationConfig {
    pub fn from_conf(conf: &JobConf) -> Result<Self> {
        let retry_times = conf.get_u64(keys::ACCESS_RETRY_TIMES, 0)?;
        let retry_times = u32::try_from(retry_times).map_err(|_| {
            DelegationError::Config(format!("{} is out of range", keys::ACCESS_RETRY_TIMES))
        })?;

        Ok(Self {
            access_id: conf.get_or(keys::ACCESS_ID, "").trim().to_string(),
            access_timeout: Duration::from_millis(
                conf.get_u64(keys::ACCESS_TIMEOUT_MS, DEFAULT_ACCESS_TIMEOUT_MS)?,
            ),
            coordinators: coordinator_endpoints(conf),
            assignment_tags: assignment_tags(conf),
            retry_times,
            retry_interval: Duration::from_millis(
                conf.get_u64(keys::ACCESS_RETRY_INTERVAL_MS, DEFAULT_ACCESS_RETRY_INTERVAL_MS)?,
            ),
        })
    }
}
