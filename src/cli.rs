//! Command-line interface
//!
//! - `s3-reclaim bucket <NAME>` - empty and delete one bucket
//! - `s3-reclaim prefix <PREFIX>` - sweep a test-run namespace for one or all identities
//! - `s3-reclaim new-prefix` - print a fresh namespace prefix from the fixtures template
//!
//! The configuration file comes from `--config` or `S3TEST_CONF`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ReclaimConfig, CONFIG_ENV};
use crate::naming::{choose_bucket_prefix, DEFAULT_PREFIX_MAX_LEN};
use crate::reclaim::Reclaimer;
use crate::s3::credentials::{ClientFactory, Identity};

/// Reclaim buckets left behind by S3 compatibility test runs
#[derive(Debug, Parser)]
#[command(name = "s3-reclaim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Test-environment configuration file
    #[arg(long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Empty and delete one bucket
    Bucket {
        name: String,

        #[arg(long, value_enum, default_value = "main")]
        identity: Identity,
    },
    /// Reclaim every bucket whose name contains PREFIX
    Prefix {
        prefix: String,

        #[arg(long, value_enum, default_value = "all")]
        identity: IdentityScope,
    },
    /// Print a new bucket prefix chosen from the fixtures template
    NewPrefix,
}

/// Identities a namespace sweep runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IdentityScope {
    Main,
    Alt,
    Tenant,
    All,
}

impl IdentityScope {
    pub fn identities(&self) -> Vec<Identity> {
        match self {
            IdentityScope::Main => vec![Identity::Main],
            IdentityScope::Alt => vec![Identity::Alt],
            IdentityScope::Tenant => vec![Identity::Tenant],
            IdentityScope::All => Identity::ALL.to_vec(),
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<ReclaimConfig> {
        let path = self.config.as_ref().with_context(|| {
            format!(
                "No configuration given. Use --config or set {} to a config file.",
                CONFIG_ENV
            )
        })?;
        ReclaimConfig::load(path)
    }
}

/// Run the parsed command to completion
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;

    match cli.command {
        Commands::Bucket { name, identity } => {
            let factory = ClientFactory::new(&config);
            let client = factory.client(identity).await?;
            Reclaimer::new(&client)
                .with_policy(config.policy()?)
                .reclaim_bucket(&name)
                .await
                .with_context(|| format!("Failed to reclaim bucket {}", name))?;
            println!("{}", name);
        }
        Commands::Prefix { prefix, identity } => {
            let factory = ClientFactory::new(&config);
            let swept = sweep_identities(&factory, &prefix, &identity.identities()).await?;
            for (identity, buckets) in swept {
                for bucket in buckets {
                    println!("{}\t{}", identity, bucket);
                }
            }
        }
        Commands::NewPrefix => {
            let prefix = choose_bucket_prefix(&config.fixtures.bucket_prefix, DEFAULT_PREFIX_MAX_LEN)?;
            println!("{}", prefix);
        }
    }

    Ok(())
}

/// Sweep `prefix` as each identity in turn
///
/// Stops at the first identity whose sweep fails; later identities are not
/// attempted.
pub async fn sweep_identities(
    factory: &ClientFactory<'_>,
    prefix: &str,
    identities: &[Identity],
) -> Result<Vec<(Identity, Vec<String>)>> {
    let policy = factory.config().policy()?;
    let mut swept = Vec::with_capacity(identities.len());

    for &identity in identities {
        tracing::info!(identity = %identity, prefix, "sweeping namespace");
        let client = factory.client(identity).await?;
        let buckets = Reclaimer::new(&client)
            .with_policy(policy)
            .reclaim_prefixed(prefix)
            .await
            .with_context(|| format!("Failed to reclaim namespace {} as {}", prefix, identity))?;
        swept.push((identity, buckets));
    }

    Ok(swept)
}
