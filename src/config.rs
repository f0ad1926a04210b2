//! Configuration for the driver core
//!
//! Centralized configuration with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration for a Driver instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Pool Configuration
    // -------------------------------------------------------------------------
    /// Max pooled connections per endpoint
    pub max_connections_per_endpoint: usize,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on a single wire frame, inbound or outbound (bytes)
    pub max_frame_bytes: usize,

    // -------------------------------------------------------------------------
    // Timeout Configuration
    // -------------------------------------------------------------------------
    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Per-request reply timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Grace period for draining connections on shutdown (milliseconds)
    pub shutdown_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Reconnection Configuration
    // -------------------------------------------------------------------------
    /// First reconnect delay (milliseconds)
    pub reconnect_base_ms: u64,

    /// Ceiling on the exponential reconnect delay (milliseconds)
    pub reconnect_cap_ms: u64,

    /// Fraction of the delay randomized away ([0, 1])
    pub reconnect_jitter: f64,

    /// Consecutive connect failures before the endpoint is marked unreachable
    pub max_consecutive_failures: u32,

    // -------------------------------------------------------------------------
    // Cursor Configuration
    // -------------------------------------------------------------------------
    /// Documents requested per GET_MORE round (0 = server default)
    pub cursor_batch_size: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections_per_endpoint: 10,
            max_frame_bytes: 48 * 1024 * 1024, // 48 MiB
            connect_timeout_ms: 5000,
            request_timeout_ms: 30000,
            shutdown_timeout_ms: 5000,
            reconnect_base_ms: 100,
            reconnect_cap_ms: 30000,
            reconnect_jitter: 0.2,
            max_consecutive_failures: 5,
            cursor_batch_size: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn max_connections_per_endpoint(mut self, n: usize) -> Self {
        self.config.max_connections_per_endpoint = n;
        self
    }

    pub fn max_frame_bytes(mut self, n: usize) -> Self {
        self.config.max_frame_bytes = n;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_timeout_ms = ms;
        self
    }

    pub fn reconnect_base_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_base_ms = ms;
        self
    }

    pub fn reconnect_cap_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_cap_ms = ms;
        self
    }

    pub fn reconnect_jitter(mut self, fraction: f64) -> Self {
        self.config.reconnect_jitter = fraction;
        self
    }

    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.config.max_consecutive_failures = n;
        self
    }

    pub fn cursor_batch_size(mut self, n: i32) -> Self {
        self.config.cursor_batch_size = n;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
