//! Document records held by the registry.

use crate::identity::{Height, Identity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry-assigned document identifier. Starts at 1, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub u64);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of one property document. Immutable once built; every mutation
/// produces a new record through one of the `with_*` constructors, none of
/// which can touch `registration_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    title: String,
    owner: Identity,
    file_size: u64,
    registration_height: Height,
    description: String,
    tags: Vec<String>,
}

impl DocumentRecord {
    pub fn new(
        title: String,
        owner: Identity,
        file_size: u64,
        registration_height: Height,
        description: String,
        tags: Vec<String>,
    ) -> Self {
        Self {
            title,
            owner,
            file_size,
            registration_height,
            description,
            tags,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn registration_height(&self) -> Height {
        self.registration_height
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Blocks elapsed since registration at `height`.
    pub fn age_at(&self, height: Height) -> Height {
        height.saturating_sub(self.registration_height)
    }

    /// Replace the descriptive fields, keeping owner and registration height.
    pub fn with_contents(
        &self,
        title: String,
        file_size: u64,
        description: String,
        tags: Vec<String>,
    ) -> Self {
        Self {
            title,
            file_size,
            description,
            tags,
            ..self.clone()
        }
    }

    pub fn with_owner(&self, owner: Identity) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }

    pub fn with_tags(&self, tags: Vec<String>) -> Self {
        Self {
            tags,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deed() -> DocumentRecord {
        DocumentRecord::new(
            "Deed-1".to_string(),
            Identity::from("alice"),
            2048,
            7,
            "Lot 7".to_string(),
            vec!["residential".to_string()],
        )
    }

    #[test]
    fn with_contents_keeps_owner_and_height() {
        let original = deed();
        let revised = original.with_contents(
            "Deed-1-Revised".to_string(),
            4096,
            "Lot 7, amended".to_string(),
            vec!["residential".to_string(), "amended".to_string()],
        );
        assert_eq!(revised.title(), "Deed-1-Revised");
        assert_eq!(revised.file_size(), 4096);
        assert_eq!(revised.owner(), original.owner());
        assert_eq!(revised.registration_height(), 7);
        // the source value is untouched
        assert_eq!(original.title(), "Deed-1");
    }

    #[test]
    fn with_owner_changes_only_owner() {
        let original = deed();
        let moved = original.with_owner(Identity::from("bob"));
        assert_eq!(moved.owner().as_str(), "bob");
        assert_eq!(moved.tags(), original.tags());
        assert_eq!(moved.title(), original.title());
    }

    #[test]
    fn age_never_underflows() {
        let record = deed();
        assert_eq!(record.age_at(10), 3);
        assert_eq!(record.age_at(7), 0);
        assert_eq!(record.age_at(2), 0);
    }
}
