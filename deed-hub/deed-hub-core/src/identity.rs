//! Caller identities and the host-supplied height counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic counter supplied by the hosting environment.
pub type Height = u64;

/// An authenticated party: an owner, a viewer or the administrator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who is calling and at which height. Built by the host for every operation;
/// the registry never accepts the caller as a plain argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Identity,
    pub height: Height,
}

impl CallContext {
    pub fn new(caller: impl Into<Identity>, height: Height) -> Self {
        Self {
            caller: caller.into(),
            height,
        }
    }
}
