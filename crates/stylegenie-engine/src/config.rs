use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stylegenie_contracts::endpoints::EndpointList;

pub const CONFIG_ENV: &str = "STYLEGENIE_CONFIG";
pub const ENDPOINTS_ENV: &str = "STYLEGENIE_ENDPOINTS";
pub const TIMEOUT_ENV: &str = "STYLEGENIE_TIMEOUT_S";
pub const UPLOAD_BUCKET_ENV: &str = "STYLEGENIE_UPLOAD_BUCKET";
pub const UPLOAD_REGION_ENV: &str = "STYLEGENIE_UPLOAD_REGION";
pub const PUBLIC_BASE_URL_ENV: &str = "STYLEGENIE_PUBLIC_BASE_URL";
pub const ISSUER_URL_ENV: &str = "STYLEGENIE_UPLOAD_ISSUER_URL";

const OVERRIDE_KEYS: &[&str] = &[
    ENDPOINTS_ENV,
    TIMEOUT_ENV,
    UPLOAD_BUCKET_ENV,
    UPLOAD_REGION_ENV,
    PUBLIC_BASE_URL_ENV,
    ISSUER_URL_ENV,
];

const DEFAULT_TIMEOUT_S: f64 = 20.0;
const MIN_TIMEOUT_S: f64 = 1.0;
const MAX_TIMEOUT_S: f64 = 300.0;
const DEFAULT_MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_EXPIRES_IN_S: u64 = 3600;
const MAX_EXPIRES_IN_S: u64 = 604_800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleGenieConfig {
    pub endpoints: Vec<String>,
    pub request_timeout_s: f64,
    pub max_photo_bytes: u64,
    pub upload: UploadConfig,
}

impl Default for StyleGenieConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            request_timeout_s: DEFAULT_TIMEOUT_S,
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
            upload: UploadConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub bucket: String,
    pub region: String,
    pub expires_in_s: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: "stylegenie-uploads".to_string(),
            region: "us-east-1".to_string(),
            expires_in_s: DEFAULT_EXPIRES_IN_S,
            public_base_url: None,
            issuer_url: None,
        }
    }
}

impl UploadConfig {
    pub fn expires_in_s(&self) -> u64 {
        self.expires_in_s.clamp(1, MAX_EXPIRES_IN_S)
    }
}

impl StyleGenieConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("config file is not valid JSON")
    }

    pub fn endpoint_list(&self) -> EndpointList {
        EndpointList::new(&self.endpoints)
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = if self.request_timeout_s.is_finite() {
            self.request_timeout_s
        } else {
            DEFAULT_TIMEOUT_S
        };
        Duration::from_secs_f64(secs.clamp(MIN_TIMEOUT_S, MAX_TIMEOUT_S))
    }

    /// Environment values win over file values. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env_overrides(&mut self, env: &BTreeMap<String, String>) {
        let get = |key: &str| {
            env.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };
        if let Some(raw) = get(ENDPOINTS_ENV) {
            self.endpoints = EndpointList::from_csv(raw).to_vec();
        }
        if let Some(raw) = get(TIMEOUT_ENV) {
            match raw.parse::<f64>() {
                Ok(value) => self.request_timeout_s = value,
                Err(_) => tracing::warn!(value = raw, "ignoring invalid {TIMEOUT_ENV}"),
            }
        }
        if let Some(raw) = get(UPLOAD_BUCKET_ENV) {
            self.upload.bucket = raw.to_string();
        }
        if let Some(raw) = get(UPLOAD_REGION_ENV) {
            self.upload.region = raw.to_string();
        }
        if let Some(raw) = get(PUBLIC_BASE_URL_ENV) {
            self.upload.public_base_url = Some(raw.to_string());
        }
        if let Some(raw) = get(ISSUER_URL_ENV) {
            self.upload.issuer_url = Some(raw.to_string());
        }
    }
}

/// Snapshot of the override variables from the process environment.
pub fn env_overrides() -> BTreeMap<String, String> {
    OVERRIDE_KEYS
        .iter()
        .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect()
}

pub fn config_path_from_env() -> Option<PathBuf> {
    env::var(CONFIG_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Loads the config from defaults, an optional JSON file and environment
/// overrides, and re-reads the file when its modification time changes.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: Option<PathBuf>,
    env: BTreeMap<String, String>,
    current: StyleGenieConfig,
    loaded_mtime: Option<SystemTime>,
}

impl ConfigSource {
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        Self::with_env(path, env_overrides())
    }

    pub fn with_env(path: Option<PathBuf>, env: BTreeMap<String, String>) -> Result<Self> {
        let mut source = Self {
            path,
            env,
            current: StyleGenieConfig::default(),
            loaded_mtime: None,
        };
        source.load()?;
        Ok(source)
    }

    pub fn config(&self) -> &StyleGenieConfig {
        &self.current
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns `Ok(true)` when a changed file was loaded. On error the
    /// previous config stays in place.
    pub fn reload_if_changed(&mut self) -> Result<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        let mtime = modified_time(path)?;
        if Some(mtime) == self.loaded_mtime {
            return Ok(false);
        }
        self.load()?;
        Ok(true)
    }

    pub fn force_reload(&mut self) -> Result<()> {
        self.load()
    }

    fn load(&mut self) -> Result<()> {
        let (mut config, mtime) = match self.path.as_deref() {
            Some(path) => {
                let mtime = modified_time(path)?;
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed reading config {}", path.display()))?;
                let config = StyleGenieConfig::from_json(&raw)
                    .with_context(|| format!("failed parsing config {}", path.display()))?;
                (config, Some(mtime))
            }
            None => (StyleGenieConfig::default(), None),
        };
        config.apply_env_overrides(&self.env);
        self.current = config;
        self.loaded_mtime = mtime;
        Ok(())
    }
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("failed reading config metadata {}", path.display()))
}
