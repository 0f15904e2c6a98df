//! region-select
//!
//! Measures inter-region HTTP latency across a fleet of identical
//! instances and serves an endpoint that picks the K-region subset
//! minimizing traffic-weighted average user-to-nearest-region latency.
//!
//! # Architecture
//!
//! ```text
//! peer discovery (A) -> region tracker (C) -> many peer trackers (B)
//!                              |
//!                              v
//!                        publisher (D) ---- stats/metrics
//!                              |
//!                              v
//!                  aggregator / handler (H) -- picks solver by K --
//!                     /                                           \
//!         brute-force solver (F)                         ILP solver (G)
//!                (via combination enumerator, E)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use region_select::{Config, Service};
//!
//! let config = Config::from_env();
//! let service = Service::new(config)?;
//! service.run().await?;
//! ```

pub mod combinations;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod publisher;
pub mod region_tracker;
pub mod solver;
pub mod tracker;

pub use config::Config;
pub use error::{AppError, Result};
pub use handler::Aggregator;
pub use publisher::Publisher;
pub use region_tracker::RegionTracker;

use discovery::DnsDiscovery;
use std::sync::Arc;
use tracing::{error, info};

/// Wires every component together: discovery feeds the region tracker,
/// the region tracker feeds both the publisher and the aggregator's
/// solver-rebuild loop, and the publisher serves the aggregator's POST
/// route alongside its own GET routes.
pub struct Service {
    config: Config,
    tracker: Arc<RegionTracker>,
    publisher: Publisher,
    aggregator: Arc<Aggregator>,
}

impl Service {
    /// Build a service using DNS-based peer discovery.
    pub fn new(config: Config) -> Result<Self> {
        info!(region = %config.self_region, "initializing region-select");

        let discovery = Arc::new(DnsDiscovery::new(config.discovery_name())?);
        let tracker = RegionTracker::new(
            config.self_region.clone(),
            config.app_name.clone(),
            config.zone.clone(),
            config.interval,
            config.window_size,
            discovery,
        );

        let publisher = Publisher::new(config.bind_addr.clone(), tracker.clone(), std::time::Duration::from_secs(1));
        let aggregator = Aggregator::new(tracker.clone(), publisher.stats());

        Ok(Self { config, tracker, publisher, aggregator })
    }

    /// Run until `shutdown` resolves: discovery reconciliation, the
    /// solver rebuild loop, and the HTTP server all run concurrently.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
        let tracker_for_reconcile = self.tracker.clone();
        let reconcile_handle = tokio::spawn(async move { tracker_for_reconcile.run().await });

        let mut error_stream = self
            .tracker
            .take_error_stream()
            .await
            .expect("error stream taken exactly once at startup");
        let error_handle = tokio::spawn(async move {
            while let Some((region, err)) = error_stream.recv().await {
                error!(region = %region, error = %err, "peer probe error");
            }
        });

        let rebuild_handle = tokio::spawn(
            self.aggregator
                .clone()
                .run_rebuild_loop(self.config.interval.min(std::time::Duration::from_secs(1))),
        );

        let aggregator_routes = self.aggregator.router();
        info!(addr = %self.config.bind_addr, "starting publisher");
        self.publisher.run(aggregator_routes, shutdown).await?;

        reconcile_handle.abort();
        rebuild_handle.abort();
        error_handle.abort();
        self.tracker.stop().await;

        Ok(())
    }
}
