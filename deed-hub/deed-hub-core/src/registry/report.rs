//! Response shapes of the read-side reporting operations.

use crate::identity::Height;
use serde::{Deserialize, Serialize};

/// Answer to `verify_authenticity`. `is_valid` always equals `owner_match`;
/// both are kept for response-shape compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticityReport {
    pub is_valid: bool,
    pub current_height: Height,
    pub blocks_since_creation: Height,
    pub owner_match: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatistics {
    pub document_age: Height,
    pub size_in_bytes: u64,
    /// Number of tags on the record.
    pub metadata_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub registry_count: u64,
    pub system_healthy: bool,
    pub last_checked: Height,
}
