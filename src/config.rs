//! Test-environment configuration
//!
//! Loaded once from a YAML file, normally named by the `S3TEST_CONF`
//! environment variable, and passed by reference to whatever needs endpoint
//! or credential data:
//!
//! ```yaml
//! endpoint: { host: localhost, port: 9000, is_secure: false }
//! main:   { access_key: ..., secret_key: ..., display_name: ..., email: ... }
//! alt:    { access_key: ..., secret_key: ..., display_name: ..., email: ... }
//! tenant: { access_key: ..., secret_key: ..., display_name: ..., email: ... }
//! fixtures: { bucket_prefix: "test-{random}-" }
//! reclaim: { batch_size: 128, max_retention_wait_secs: 60 }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::reclaim::ReclaimPolicy;
use crate::s3::credentials::Identity;
use crate::s3::types::DEFAULT_BATCH_SIZE;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "S3TEST_CONF";

pub const DEFAULT_BUCKET_PREFIX: &str = "test-{random}-";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Where the storage service listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub is_secure: bool,
}

/// Credentials and identity details of one test user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub access_key: String,
    pub secret_key: String,
    pub display_name: String,
    pub email: String,
}

impl IdentityConfig {
    /// The user id is the display name
    pub fn user_id(&self) -> &str {
        &self.display_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixturesConfig {
    /// Bucket prefix template; `{random}` is replaced with random filler
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            bucket_prefix: default_bucket_prefix(),
        }
    }
}

fn default_bucket_prefix() -> String {
    DEFAULT_BUCKET_PREFIX.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retention_wait_secs")]
    pub max_retention_wait_secs: u64,
}

impl Default for ReclaimSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retention_wait_secs: default_max_retention_wait_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_retention_wait_secs() -> u64 {
    60
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Complete test-environment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimConfig {
    pub endpoint: EndpointConfig,

    #[serde(default = "default_region")]
    pub region: String,

    pub main: IdentityConfig,
    pub alt: IdentityConfig,
    pub tenant: IdentityConfig,

    #[serde(default)]
    pub fixtures: FixturesConfig,

    #[serde(default)]
    pub reclaim: ReclaimSettings,
}

impl ReclaimConfig {
    /// Load the file named by `S3TEST_CONF`
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).with_context(|| {
            format!(
                "To run tests, point environment variable {} to a config file.",
                CONFIG_ENV
            )
        })?;
        Self::load(Path::new(&path))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;

        tracing::info!(
            "Loaded config: endpoint={}, bucket_prefix={:?}",
            config.endpoint_url()?,
            config.fixtures.bucket_prefix
        );

        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: ReclaimConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.is_empty() {
            bail!("endpoint host must not be empty");
        }
        for identity in Identity::ALL {
            let creds = self.identity(identity);
            if creds.access_key.is_empty() || creds.secret_key.is_empty() {
                bail!("{} identity is missing access_key or secret_key", identity);
            }
        }
        self.policy()?;
        self.endpoint_url()?;
        Ok(())
    }

    /// `http(s)://host:port` of the storage endpoint
    pub fn endpoint_url(&self) -> Result<String> {
        let scheme = if self.endpoint.is_secure { "https" } else { "http" };
        let raw = format!("{}://{}:{}", scheme, self.endpoint.host, self.endpoint.port);
        let parsed = url::Url::parse(&raw).with_context(|| format!("Invalid endpoint {}", raw))?;
        Ok(parsed.as_str().trim_end_matches('/').to_string())
    }

    pub fn identity(&self, identity: Identity) -> &IdentityConfig {
        match identity {
            Identity::Main => &self.main,
            Identity::Alt => &self.alt,
            Identity::Tenant => &self.tenant,
        }
    }

    pub fn policy(&self) -> Result<ReclaimPolicy> {
        Ok(ReclaimPolicy::new(
            self.reclaim.batch_size,
            Duration::from_secs(self.reclaim.max_retention_wait_secs),
        )?)
    }
}
