use crate::document::DocId;
use crate::identity::Identity;
use serde::Serialize;

/// A mutating registry operation. Commands are what the journal records and
/// replays; reads never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        title: String,
        file_size: u64,
        description: String,
        tags: Vec<String>,
    },
    Update {
        doc_id: DocId,
        title: String,
        file_size: u64,
        description: String,
        tags: Vec<String>,
    },
    Transfer {
        doc_id: DocId,
        new_owner: Identity,
    },
    AddTags {
        doc_id: DocId,
        tags: Vec<String>,
    },
    Archive {
        doc_id: DocId,
    },
    Delete {
        doc_id: DocId,
    },
    GrantAccess {
        doc_id: DocId,
        viewer: Identity,
    },
    RevokeAccess {
        doc_id: DocId,
        viewer: Identity,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Update { .. } => "update",
            Command::Transfer { .. } => "transfer",
            Command::AddTags { .. } => "add_tags",
            Command::Archive { .. } => "archive",
            Command::Delete { .. } => "delete",
            Command::GrantAccess { .. } => "grant_access",
            Command::RevokeAccess { .. } => "revoke_access",
        }
    }

    /// Target document, `None` for a registration.
    pub fn doc_id(&self) -> Option<DocId> {
        match self {
            Command::Register { .. } => None,
            Command::Update { doc_id, .. }
            | Command::Transfer { doc_id, .. }
            | Command::AddTags { doc_id, .. }
            | Command::Archive { doc_id }
            | Command::Delete { doc_id }
            | Command::GrantAccess { doc_id, .. }
            | Command::RevokeAccess { doc_id, .. } => Some(*doc_id),
        }
    }
}

/// Result of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Registered { doc_id: DocId },
    Tags { tags: Vec<String> },
    Done,
}
