//! Key-value stores backing the registry.
//!
//! The registry reads and writes exclusively through these traits, so any
//! reliable key-value engine can sit underneath. Writes are infallible from the
//! registry's point of view; durability is layered on top by the journal.

pub mod memory;

pub use memory::{MemoryPermissionStore, MemoryRecordStore};

use crate::document::{DocId, DocumentRecord};
use crate::identity::Identity;

/// Document identifier -> document record.
pub trait RecordStore {
    fn get(&self, id: DocId) -> Option<&DocumentRecord>;
    fn put(&mut self, id: DocId, record: DocumentRecord);
    fn remove(&mut self, id: DocId) -> Option<DocumentRecord>;
    fn len(&self) -> usize;

    fn contains(&self, id: DocId) -> bool {
        self.get(id).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// (document identifier, viewer) -> view-access flag.
pub trait PermissionStore {
    fn get(&self, id: DocId, viewer: &Identity) -> Option<bool>;
    fn put(&mut self, id: DocId, viewer: Identity, can_view: bool);
    /// Returns whether an entry was present.
    fn remove(&mut self, id: DocId, viewer: &Identity) -> bool;
    /// Viewers holding an entry for `id`, in identity order.
    fn viewers(&self, id: DocId) -> Vec<Identity>;
}
