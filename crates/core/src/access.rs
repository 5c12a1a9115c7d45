//! Usage gating consulted before a quote is generated.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::identity::Identity;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("usage service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UsageGate: Send + Sync {
    async fn check_access(&self, identity: &Identity) -> Result<bool, AccessError>;
    async fn record_usage(&self, identity: &Identity) -> Result<(), AccessError>;
}

/// Free-tier quota per identity with an unlimited whitelist.
#[derive(Clone, Debug, Default)]
pub struct QuotaUsageGate {
    free_quotes: u32,
    whitelist: HashSet<String>,
    usage: Arc<Mutex<HashMap<String, u32>>>,
}

impl QuotaUsageGate {
    pub fn new<I, S>(free_quotes: u32, whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            free_quotes,
            whitelist: whitelist
                .into_iter()
                .map(|email| email.as_ref().trim().to_ascii_lowercase())
                .collect(),
            usage: Arc::default(),
        }
    }

    pub fn is_whitelisted(&self, identity: &Identity) -> bool {
        self.whitelist.contains(&identity.metering_key())
    }

    pub fn used(&self, identity: &Identity) -> u32 {
        let key = identity.metering_key();
        match self.usage.lock() {
            Ok(usage) => usage.get(&key).copied().unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(&key).copied().unwrap_or(0),
        }
    }
}

#[async_trait]
impl UsageGate for QuotaUsageGate {
    async fn check_access(&self, identity: &Identity) -> Result<bool, AccessError> {
        Ok(self.is_whitelisted(identity) || self.used(identity) < self.free_quotes)
    }

    async fn record_usage(&self, identity: &Identity) -> Result<(), AccessError> {
        if self.is_whitelisted(identity) {
            return Ok(());
        }
        let key = identity.metering_key();
        match self.usage.lock() {
            Ok(mut usage) => *usage.entry(key).or_insert(0) += 1,
            Err(poisoned) => *poisoned.into_inner().entry(key).or_insert(0) += 1,
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UnlimitedUsageGate;

#[async_trait]
impl UsageGate for UnlimitedUsageGate {
    async fn check_access(&self, _identity: &Identity) -> Result<bool, AccessError> {
        Ok(true)
    }

    async fn record_usage(&self, _identity: &Identity) -> Result<(), AccessError> {
        Ok(())
    }
}
