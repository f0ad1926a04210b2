//! Driver Module
//!
//! Entry point consumed by the higher client layers: holds the configuration
//! and spawns one supervisor per endpoint.

use crate::config::Config;
use crate::error::Result;
use crate::network::{Endpoint, Supervisor};

/// The driver core. Cheap to create; all resources live in the supervisors
/// it spawns.
pub struct Driver {
    config: Config,
}

impl Driver {
    /// Create a driver with the given configuration
    pub fn new(config: Config) -> Self {
        Driver { config }
    }

    /// Create a driver with default configuration
    pub fn with_defaults() -> Self {
        Driver {
            config: Config::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Supervise a `host[:port]` endpoint (default port 27017).
    ///
    /// Connections are opened on demand, so this succeeds even while the
    /// endpoint is down; requests fail until it comes up.
    pub fn connect(&self, endpoint: &str) -> Result<Supervisor> {
        let endpoint: Endpoint = endpoint.parse()?;
        Supervisor::start(endpoint, self.config.clone())
    }
}
