//! Port bindings and ephemeral port acquisition.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("port binding `{0}` must look like HOST:CONTAINER (e.g. 8080:80)")]
    Format(String),

    #[error("`{0}` is not a valid port number")]
    Number(String),
}

/// `hostPort:containerPort` as given on the command line.
///
/// The host port is where the proxy listens; the container port is the one
/// the service listens on inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct PortBinding {
    pub host: u16,
    pub container: u16,
}

impl FromStr for PortBinding {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, container) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| PortError::Format(s.to_string()))?;
        Ok(Self {
            host: parse_port(host)?,
            container: parse_port(container)?,
        })
    }
}

impl TryFrom<String> for PortBinding {
    type Error = PortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

fn parse_port(s: &str) -> Result<u16, PortError> {
    match s.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(PortError::Number(s.to_string())),
    }
}

/// Ask the OS for a free loopback port.
///
/// The listener is dropped right away, so another process may grab the port
/// before the container binds it; a new port is drawn on every rebuild.
pub fn acquire_free_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
