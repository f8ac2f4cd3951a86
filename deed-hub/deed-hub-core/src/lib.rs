pub mod document;
pub mod error;
pub mod identity;
pub mod journal;
pub mod registry;
pub mod storage;
pub mod validation;
pub mod wal;

pub use document::{DocId, DocumentRecord};
pub use error::{JournalError, RegistryError};
pub use identity::{CallContext, Height, Identity};
pub use journal::JournaledRegistry;
pub use registry::{
    AuthenticityReport, Command, DocumentStatistics, MaintenanceReport, Outcome, Registry,
};
