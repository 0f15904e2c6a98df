//! Process configuration

use std::env;
use std::time::Duration;

/// Process-wide configuration, read once at startup and threaded explicitly
/// into the components that need it (nothing here is read from globals).
#[derive(Debug, Clone)]
pub struct Config {
    /// Probe application identifier; peer hostnames and the discovery
    /// record name are derived from this.
    pub app_name: String,

    /// This instance's own region identifier.
    pub self_region: String,

    /// DNS zone peers live under (`<region>.<app>.<zone>`).
    pub zone: String,

    /// Probe/reconciliation interval. Also used as the per-request timeout
    /// for probes and discovery lookups.
    pub interval: Duration,

    /// Ring buffer capacity for each peer's latency samples.
    pub window_size: usize,

    /// Address the publisher's HTTP server binds to.
    pub bind_addr: String,
}

impl Config {
    /// Build configuration from environment variables.
    ///
    /// `SELF_REGION` is required — there is no sane default for "which
    /// region am I" — so its absence aborts startup rather than silently
    /// measuring latency to itself under the wrong name.
    pub fn from_env() -> Self {
        Self {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "region-select".to_string()),
            self_region: env::var("SELF_REGION").unwrap_or_else(|_| {
                eprintln!(
                    "FATAL: SELF_REGION environment variable is not set.\n\
                     This instance needs to know its own region identifier.\n\
                     Example: SELF_REGION=dfw"
                );
                std::process::exit(1);
            }),
            zone: env::var("ZONE").unwrap_or_else(|_| "internal".to_string()),
            interval: Duration::from_secs(
                env::var("PROBE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            window_size: env::var("WINDOW_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }

    /// Configuration for tests: short interval, tiny window, loopback bind.
    pub fn for_testing() -> Self {
        Self {
            app_name: "region-select-test".to_string(),
            self_region: "tst".to_string(),
            zone: "internal".to_string(),
            interval: Duration::from_millis(50),
            window_size: 4,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    /// Hostname peers are probed at: `http://<region>.<app>.<zone>/latency.json`.
    pub fn peer_url(&self, region: &str) -> String {
        format!("http://{region}.{}.{}/latency.json", self.app_name, self.zone)
    }

    /// Discovery record name: `regions.<app>.<zone>`.
    pub fn discovery_name(&self) -> String {
        format!("regions.{}.{}", self.app_name, self.zone)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_url_format() {
        let cfg = Config::for_testing();
        assert_eq!(cfg.peer_url("dfw"), "http://dfw.region-select-test.internal/latency.json");
    }

    #[test]
    fn discovery_name_format() {
        let cfg = Config::for_testing();
        assert_eq!(cfg.discovery_name(), "regions.region-select-test.internal");
    }
}
