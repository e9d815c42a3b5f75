use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Identifier of a connected hub session.
///
/// Derived from the peer address of the transport, so two live connections
/// never share an id.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self(format!("client_{addr}"))
    }

    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
