//! Component A — peer discovery
//!
//! Resolves the set of currently deployed regions via a naming service
//! TXT record. Production lookups go through `hickory-resolver`; tests use
//! a fixed list so the region tracker is exercisable without a naming
//! service (see SPEC_FULL.md §4.A).

use crate::error::{AppError, Result};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::collections::BTreeSet;
use std::time::Duration;

/// Resolves the set of regions a probe app is currently deployed to.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Query the naming service and return the deduplicated region list.
    async fn deployed_regions(&self, timeout: Duration) -> Result<Vec<String>>;
}

/// Looks up TXT records at `regions.<app>.<zone>`. Each record is a
/// comma-separated region list; all records are concatenated and
/// deduplicated.
pub struct DnsDiscovery {
    resolver: TokioAsyncResolver,
    record_name: String,
}

impl DnsDiscovery {
    /// Build a discovery client using the system resolver configuration.
    pub fn new(record_name: String) -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| AppError::Discovery(e.to_string()))?;
        Ok(Self { resolver, record_name })
    }
}

#[async_trait]
impl Discovery for DnsDiscovery {
    async fn deployed_regions(&self, timeout: Duration) -> Result<Vec<String>> {
        let lookup = tokio::time::timeout(timeout, self.resolver.txt_lookup(&self.record_name))
            .await
            .map_err(|_| AppError::Discovery(format!("lookup of {} timed out", self.record_name)))?
            .map_err(|e| AppError::Discovery(e.to_string()))?;

        let mut regions = BTreeSet::new();
        for record in lookup.iter() {
            let mut text = String::new();
            for chunk in record.iter() {
                text.push_str(&String::from_utf8_lossy(chunk));
            }
            for region in text.split(',') {
                let region = region.trim();
                if !region.is_empty() {
                    regions.insert(region.to_string());
                }
            }
        }
        Ok(regions.into_iter().collect())
    }
}

/// A fixed region list, for tests and local development without a naming
/// service.
pub struct StaticDiscovery {
    regions: Vec<String>,
}

impl StaticDiscovery {
    pub fn new(regions: Vec<String>) -> Self {
        Self { regions }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn deployed_regions(&self, _timeout: Duration) -> Result<Vec<String>> {
        Ok(self.regions.clone())
    }
}
