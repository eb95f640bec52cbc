//! Bucket namespace naming
//!
//! Every bucket a test run creates starts with one random prefix, which is
//! what later lets a namespace sweep find them all again.

use anyhow::{bail, Result};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Placeholder replaced by random filler in a prefix template
pub const RANDOM_PLACEHOLDER: &str = "{random}";

/// Default maximum prefix length, leaving room for a counter in a 63-char bucket name
pub const DEFAULT_PREFIX_MAX_LEN: usize = 30;

const FILLER_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_FILLER_LEN: usize = 255;

fn random_filler(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| FILLER_CHARSET[rng.gen_range(0..FILLER_CHARSET.len())] as char)
        .collect()
}

/// Fill `template` with as much random filler as fits in `max_len` characters
///
/// Fails when the template does not fit even with no filler at all.
pub fn choose_bucket_prefix(template: &str, max_len: usize) -> Result<String> {
    let mut filler = random_filler(MAX_FILLER_LEN);

    loop {
        let prefix = template.replace(RANDOM_PLACEHOLDER, &filler);
        if prefix.len() <= max_len {
            return Ok(prefix);
        }
        if filler.pop().is_none() {
            break;
        }
    }

    bail!("Bucket prefix template is impossible to fulfill: {:?}", template)
}

/// Hands out `{prefix}1`, `{prefix}2`, ... for one test run
#[derive(Debug)]
pub struct BucketNamer {
    prefix: String,
    counter: AtomicU64,
}

impl BucketNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Namer with a fresh prefix chosen from `template`
    pub fn from_template(template: &str) -> Result<Self> {
        Ok(Self::new(choose_bucket_prefix(template, DEFAULT_PREFIX_MAX_LEN)?))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", self.prefix, n)
    }
}
