//! Test identities and per-identity client construction
//!
//! A test environment runs as three users: the main identity, an alternate
//! identity in the same account, and a user in a separate tenant. Each gets
//! its own client, always wrapped in a [`LoggingClient`] so every storage
//! call made during cleanup is on record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ReclaimConfig;
use crate::s3::client::{S3Client, S3ClientConfig};
use crate::s3::instrumented::{CallObserver, LoggingClient, TracingObserver};

/// Which configured user a client acts as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    Main,
    Alt,
    Tenant,
}

impl Identity {
    /// Order in which identities are swept when cleaning up everything
    pub const ALL: [Identity; 3] = [Identity::Main, Identity::Alt, Identity::Tenant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Identity::Main => "main",
            Identity::Alt => "alt",
            Identity::Tenant => "tenant",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Identity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Identity::ALL
            .into_iter()
            .find(|identity| identity.as_str().eq_ignore_ascii_case(s))
            .with_context(|| format!("Unknown identity '{}' (expected main, alt or tenant)", s))
    }
}

/// Builds logged clients for the configured identities
pub struct ClientFactory<'a> {
    config: &'a ReclaimConfig,
    observer: Arc<dyn CallObserver>,
}

impl<'a> ClientFactory<'a> {
    pub fn new(config: &'a ReclaimConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Route call records to `observer` instead of `tracing`
    pub fn with_observer(config: &'a ReclaimConfig, observer: Arc<dyn CallObserver>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &'a ReclaimConfig {
        self.config
    }

    /// Connection settings for one identity
    pub fn client_config(&self, identity: Identity) -> Result<S3ClientConfig> {
        let creds = self.config.identity(identity);
        Ok(S3ClientConfig {
            endpoint_url: Some(self.config.endpoint_url()?),
            // Test endpoints are addressed by host:port, not virtual-hosted names
            force_path_style: true,
            region: Some(self.config.region.clone()),
            access_key_id: Some(creds.access_key.clone()),
            secret_access_key: Some(creds.secret_key.clone()),
        })
    }

    /// Create a client acting as `identity`
    pub async fn client(&self, identity: Identity) -> Result<LoggingClient<S3Client>> {
        let client_config = self.client_config(identity)?;
        let client = S3Client::with_config(client_config)
            .await
            .with_context(|| format!("Failed to create client for {} identity", identity))?;

        tracing::debug!(identity = %identity, "created storage client");
        Ok(LoggingClient::with_observer(client, self.observer.clone()))
    }
}
