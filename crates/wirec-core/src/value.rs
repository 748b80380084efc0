use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Path of an actor on some node. Opaque to the compression engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorRef(String);

impl ActorRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Short-lived ask/reply refs live under `/temp/`.
    pub fn is_temporary(&self) -> bool {
        self.0.contains("/temp/")
    }

    pub fn is_dead_letters(&self) -> bool {
        self.0.ends_with("/deadLetters")
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializer type hint carried next to every payload. May be blank.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(String);

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One incarnation of a node. `origin_id` changes on every restart even when
/// the address stays the same.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub system: String,
    pub addr: SocketAddr,
    pub origin_id: u64,
}

impl NodeIdentity {
    pub fn new(system: impl Into<String>, addr: SocketAddr, origin_id: u64) -> Self {
        Self {
            system: system.into(),
            addr,
            origin_id,
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.system, self.addr, self.origin_id)
    }
}
