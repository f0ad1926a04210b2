//! Endpoint addressing
//!
//! `host[:port]` parsing with the default mongod port.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::MongoError;

/// Default mongod port
pub const DEFAULT_PORT: u16 = 27017;

/// A `host:port` TCP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// Resolve to socket addresses for connecting
    pub fn resolve(&self) -> std::io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl FromStr for Endpoint {
    type Err = MongoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(MongoError::InvalidEndpoint(s.to_string()));
        }
        match s.rsplit_once(':') {
            None => Ok(Endpoint::new(s, DEFAULT_PORT)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(MongoError::InvalidEndpoint(s.to_string()));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| MongoError::InvalidEndpoint(s.to_string()))?;
                Ok(Endpoint::new(host, port))
            }
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        let ep: Endpoint = "db.example.com:27018".parse().unwrap();
        assert_eq!(ep.host, "db.example.com");
        assert_eq!(ep.port, 27018);
    }

    #[test]
    fn test_parse_defaults_port() {
        let ep: Endpoint = "localhost".parse().unwrap();
        assert_eq!(ep.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Endpoint>().is_err());
        assert!(":27017".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
    }
}
