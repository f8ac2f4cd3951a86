use super::{PermissionStore, RecordStore};
use crate::document::{DocId, DocumentRecord};
use crate::identity::Identity;
use std::collections::{BTreeMap, HashMap};

/// In-memory record store.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    docs: HashMap<DocId, DocumentRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: DocId) -> Option<&DocumentRecord> {
        self.docs.get(&id)
    }

    fn put(&mut self, id: DocId, record: DocumentRecord) {
        self.docs.insert(id, record);
    }

    fn remove(&mut self, id: DocId) -> Option<DocumentRecord> {
        self.docs.remove(&id)
    }

    fn len(&self) -> usize {
        self.docs.len()
    }
}

/// In-memory permission table. Ordered so that a document's entries are
/// contiguous and can be range-scanned.
#[derive(Debug, Default, Clone)]
pub struct MemoryPermissionStore {
    entries: BTreeMap<(DocId, Identity), bool>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn get(&self, id: DocId, viewer: &Identity) -> Option<bool> {
        self.entries.get(&(id, viewer.clone())).copied()
    }

    fn put(&mut self, id: DocId, viewer: Identity, can_view: bool) {
        self.entries.insert((id, viewer), can_view);
    }

    fn remove(&mut self, id: DocId, viewer: &Identity) -> bool {
        self.entries.remove(&(id, viewer.clone())).is_some()
    }

    fn viewers(&self, id: DocId) -> Vec<Identity> {
        self.entries
            .range((id, Identity::new(""))..)
            .take_while(|((doc, _), _)| *doc == id)
            .map(|((_, viewer), _)| viewer.clone())
            .collect()
    }
}
