//! Remote sync configuration.
//!
//! `SyncSettings` carries the public project identifiers needed to reach the
//! remote document store plus the sync id that namespaces one user's records.
//! Values are read from the environment; partial configuration is an error so
//! a typo never silently degrades into local-only mode.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::util::normalize_text_option;
use crate::{Error, Result};

const ENV_PROJECT_ID: &str = "RACK_FIREBASE_PROJECT_ID";
const ENV_API_KEY: &str = "RACK_FIREBASE_API_KEY";
const ENV_SYNC_ID: &str = "RACK_SYNC_ID";
const ENV_REQUEST_TIMEOUT_SECS: &str = "RACK_REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Opaque namespace key for one user's (or tenant's) record set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SyncScope(String);

impl SyncScope {
    /// Validate a sync id. Only emptiness is checked; the id is kept verbatim.
    pub fn new(sync_id: impl Into<String>) -> Result<Self> {
        let sync_id = sync_id.into();
        if sync_id.trim().is_empty() {
            return Err(Error::InvalidInput("Sync id must not be empty".to_string()));
        }
        Ok(Self(sync_id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sync id encoded as a single URL path segment.
    #[must_use]
    pub fn path_segment(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings for the Firestore-backed remote adapter.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub project_id: String,
    pub api_key: String,
    pub scope: SyncScope,
    pub request_timeout: Duration,
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SyncSettings {
    /// Load sync settings from environment variables.
    ///
    /// Returns `Ok(None)` when no sync variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_settings(|key| env::var(key).ok())
    }
}

fn parse_settings(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<SyncSettings>> {
    let project_id = normalize_text_option(lookup(ENV_PROJECT_ID));
    let api_key = normalize_text_option(lookup(ENV_API_KEY));
    let sync_id = lookup(ENV_SYNC_ID).filter(|value| !value.trim().is_empty());
    let timeout = normalize_text_option(lookup(ENV_REQUEST_TIMEOUT_SECS));

    if project_id.is_none() && api_key.is_none() && sync_id.is_none() {
        return Ok(None);
    }

    let missing: Vec<&str> = [
        (ENV_PROJECT_ID, project_id.is_none()),
        (ENV_API_KEY, api_key.is_none()),
        (ENV_SYNC_ID, sync_id.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();

    let (Some(project_id), Some(api_key), Some(sync_id)) = (project_id, api_key, sync_id) else {
        return Err(Error::InvalidInput(format!(
            "Sync configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    };

    let request_timeout = match timeout {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{ENV_REQUEST_TIMEOUT_SECS} must be a positive integer, got '{raw}'"
                ))
            })?,
        None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
    };

    Ok(Some(SyncSettings {
        project_id,
        api_key,
        scope: SyncScope::new(sync_id)?,
        request_timeout,
    }))
}
