//! The registry service: validation, ownership and access control on top of
//! the record and permission stores.
//!
//! Every mutation runs in two phases. `prepare` performs all checks against
//! the current state without touching it and yields the complete write set;
//! `commit` then applies that set. A rejected command therefore never leaves
//! partial state behind, and the journal can log a command once it is known
//! to succeed but before its effects become visible.

mod command;
mod report;


pub use command::{Command, Outcome};
pub use report::{AuthenticityReport, DocumentStatistics, MaintenanceReport};

use crate::document::{DocId, DocumentRecord};
use crate::error::{RegistryError, Result};
use crate::identity::{CallContext, Identity};
use crate::storage::{MemoryPermissionStore, MemoryRecordStore, PermissionStore, RecordStore};
use crate::validation::{self, ARCHIVED_TAG, MAX_TAGS};
use tracing::{debug, info, warn};

/// A single store mutation.
#[derive(Debug, Clone)]
enum Write {
    PutRecord(DocId, DocumentRecord),
    RemoveRecord(DocId),
    GrantView(DocId, Identity),
    RemovePermission(DocId, Identity),
    AdvanceCounter(DocId),
}

/// Checked write set of one operation plus the value it returns.
#[derive(Debug)]
pub(crate) struct Plan<T> {
    writes: Vec<Write>,
    value: T,
}

impl<T> Plan<T> {
    fn new(writes: Vec<Write>, value: T) -> Self {
        Self { writes, value }
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Plan<U> {
        Plan {
            writes: self.writes,
            value: f(self.value),
        }
    }
}

/// Permissioned document registry.
///
/// The administrator is fixed at construction. `last_doc_id` is advanced only
/// by a committed registration, under the same `&mut self` that guards the
/// stores, so two registrations can never observe the same counter value.
pub struct Registry<R = MemoryRecordStore, P = MemoryPermissionStore> {
    records: R,
    permissions: P,
    last_doc_id: u64,
    admin: Identity,
}

impl Registry {
    /// Empty in-memory registry administered by `admin`.
    pub fn new(admin: impl Into<Identity>) -> Self {
        Self::with_stores(admin, MemoryRecordStore::new(), MemoryPermissionStore::new())
    }
}

impl<R: RecordStore, P: PermissionStore> Registry<R, P> {
    pub fn with_stores(admin: impl Into<Identity>, records: R, permissions: P) -> Self {
        Self {
            records,
            permissions,
            last_doc_id: 0,
            admin: admin.into(),
        }
    }

    pub fn administrator(&self) -> &Identity {
        &self.admin
    }

    /// Last assigned document id, 0 before the first registration.
    pub fn registry_count(&self) -> u64 {
        self.last_doc_id
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn permissions(&self) -> &P {
        &self.permissions
    }

    /// Run a command to completion.
    pub fn execute(&mut self, ctx: &CallContext, command: &Command) -> Result<Outcome> {
        let plan = self.prepare(ctx, command)?;
        let outcome = self.commit(plan);
        info!("{} by {} accepted", command.name(), ctx.caller);
        Ok(outcome)
    }

    /// Check `command` against the current state and compute its writes.
    pub(crate) fn prepare(&self, ctx: &CallContext, command: &Command) -> Result<Plan<Outcome>> {
        let plan = match command {
            Command::Register {
                title,
                file_size,
                description,
                tags,
            } => self
                .prepare_register(ctx, title, *file_size, description, tags)
                .map(|p| p.map(|doc_id| Outcome::Registered { doc_id })),
            Command::Update {
                doc_id,
                title,
                file_size,
                description,
                tags,
            } => self
                .prepare_update(ctx, *doc_id, title, *file_size, description, tags)
                .map(|p| p.map(|_| Outcome::Done)),
            Command::Transfer { doc_id, new_owner } => self
                .prepare_transfer(ctx, *doc_id, new_owner)
                .map(|p| p.map(|_| Outcome::Done)),
            Command::AddTags { doc_id, tags } => self
                .prepare_add_tags(ctx, *doc_id, tags)
                .map(|p| p.map(|tags| Outcome::Tags { tags })),
            Command::Archive { doc_id } => self
                .prepare_archive(ctx, *doc_id)
                .map(|p| p.map(|_| Outcome::Done)),
            Command::Delete { doc_id } => self
                .prepare_delete(ctx, *doc_id)
                .map(|p| p.map(|_| Outcome::Done)),
            Command::GrantAccess { doc_id, viewer } => self
                .prepare_grant(ctx, *doc_id, viewer)
                .map(|p| p.map(|_| Outcome::Done)),
            Command::RevokeAccess { doc_id, viewer } => self
                .prepare_revoke(ctx, *doc_id, viewer)
                .map(|p| p.map(|_| Outcome::Done)),
        };
        plan.map_err(|e| rejected(command.name(), ctx, e))
    }

    /// Apply a checked write set. Infallible, so either every write of the
    /// operation lands or (when `prepare` failed) none was ever attempted.
    pub(crate) fn commit<T>(&mut self, plan: Plan<T>) -> T {
        for write in plan.writes {
            match write {
                Write::PutRecord(id, record) => self.records.put(id, record),
                Write::RemoveRecord(id) => {
                    self.records.remove(id);
                }
                Write::GrantView(id, viewer) => self.permissions.put(id, viewer, true),
                Write::RemovePermission(id, viewer) => {
                    self.permissions.remove(id, &viewer);
                }
                Write::AdvanceCounter(id) => self.last_doc_id = id.0,
            }
        }
        plan.value
    }

    // ---- document lifecycle -------------------------------------------------

    /// Register a new document owned by the caller and grant the caller view
    /// access. Returns the freshly assigned id.
    pub fn register(
        &mut self,
        ctx: &CallContext,
        title: &str,
        file_size: u64,
        description: &str,
        tags: &[String],
    ) -> Result<DocId> {
        let plan = self
            .prepare_register(ctx, title, file_size, description, tags)
            .map_err(|e| rejected("register", ctx, e))?;
        let doc_id = self.commit(plan);
        info!("registered document {} for {}", doc_id, ctx.caller);
        Ok(doc_id)
    }

    /// Overwrite title, size, description and tags.
    pub fn update(
        &mut self,
        ctx: &CallContext,
        doc_id: DocId,
        title: &str,
        file_size: u64,
        description: &str,
        tags: &[String],
    ) -> Result<()> {
        let plan = self
            .prepare_update(ctx, doc_id, title, file_size, description, tags)
            .map_err(|e| rejected("update", ctx, e))?;
        self.commit(plan);
        debug!("updated document {}", doc_id);
        Ok(())
    }

    /// Hand the document to `new_owner`. Existing viewer grants are kept.
    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        doc_id: DocId,
        new_owner: &Identity,
    ) -> Result<()> {
        let plan = self
            .prepare_transfer(ctx, doc_id, new_owner)
            .map_err(|e| rejected("transfer", ctx, e))?;
        self.commit(plan);
        info!("transferred document {} from {} to {}", doc_id, ctx.caller, new_owner);
        Ok(())
    }

    /// Append tags after the existing ones and return the combined list.
    pub fn add_tags(
        &mut self,
        ctx: &CallContext,
        doc_id: DocId,
        tags: &[String],
    ) -> Result<Vec<String>> {
        let plan = self
            .prepare_add_tags(ctx, doc_id, tags)
            .map_err(|e| rejected("add_tags", ctx, e))?;
        Ok(self.commit(plan))
    }

    /// Mark the document archived by appending the `ARCHIVED` tag.
    pub fn archive(&mut self, ctx: &CallContext, doc_id: DocId) -> Result<()> {
        let plan = self
            .prepare_archive(ctx, doc_id)
            .map_err(|e| rejected("archive", ctx, e))?;
        self.commit(plan);
        debug!("archived document {}", doc_id);
        Ok(())
    }

    /// Remove the record. Its permission entries stay behind and are inert.
    pub fn delete(&mut self, ctx: &CallContext, doc_id: DocId) -> Result<()> {
        let plan = self
            .prepare_delete(ctx, doc_id)
            .map_err(|e| rejected("delete", ctx, e))?;
        self.commit(plan);
        info!("deleted document {}", doc_id);
        Ok(())
    }

    // ---- permissions --------------------------------------------------------

    pub fn grant_access(
        &mut self,
        ctx: &CallContext,
        doc_id: DocId,
        viewer: &Identity,
    ) -> Result<()> {
        let plan = self
            .prepare_grant(ctx, doc_id, viewer)
            .map_err(|e| rejected("grant_access", ctx, e))?;
        self.commit(plan);
        info!("granted {} view access to {}", viewer, doc_id);
        Ok(())
    }

    /// Drop `viewer`'s entry. The owner cannot revoke themselves.
    pub fn revoke_access(
        &mut self,
        ctx: &CallContext,
        doc_id: DocId,
        viewer: &Identity,
    ) -> Result<()> {
        let plan = self
            .prepare_revoke(ctx, doc_id, viewer)
            .map_err(|e| rejected("revoke_access", ctx, e))?;
        self.commit(plan);
        info!("revoked {} view access to {}", viewer, doc_id);
        Ok(())
    }

    /// Whether `identity` may read `doc_id`: the owner, the administrator, or
    /// a viewer holding a `can_view` entry. False for a missing record, which
    /// is what keeps permission entries orphaned by `delete` inert.
    pub fn can_view(&self, doc_id: DocId, identity: &Identity) -> bool {
        self.records
            .get(doc_id)
            .map_or(false, |record| self.grants_view(doc_id, record, identity))
    }

    // ---- reporting ----------------------------------------------------------

    /// The record itself, for callers with view access.
    pub fn get_document(&self, ctx: &CallContext, doc_id: DocId) -> Result<&DocumentRecord> {
        debug!("get_document {} by {}", doc_id, ctx.caller);
        self.viewable(ctx, doc_id)
            .map_err(|e| rejected("get_document", ctx, e))
    }

    pub fn verify_authenticity(
        &self,
        ctx: &CallContext,
        doc_id: DocId,
        presumed_owner: &Identity,
    ) -> Result<AuthenticityReport> {
        let record = self
            .viewable(ctx, doc_id)
            .map_err(|e| rejected("verify_authenticity", ctx, e))?;
        let owner_match = record.owner() == presumed_owner;
        Ok(AuthenticityReport {
            is_valid: owner_match,
            current_height: ctx.height,
            blocks_since_creation: record.age_at(ctx.height),
            owner_match,
        })
    }

    pub fn get_statistics(&self, ctx: &CallContext, doc_id: DocId) -> Result<DocumentStatistics> {
        let record = self
            .viewable(ctx, doc_id)
            .map_err(|e| rejected("get_statistics", ctx, e))?;
        Ok(DocumentStatistics {
            document_age: record.age_at(ctx.height),
            size_in_bytes: record.file_size(),
            metadata_count: record.tags().len(),
        })
    }

    /// Administrator-only health summary.
    pub fn system_maintenance_check(&self, ctx: &CallContext) -> Result<MaintenanceReport> {
        if ctx.caller != self.admin {
            return Err(rejected(
                "system_maintenance_check",
                ctx,
                RegistryError::AdminOnlyAction,
            ));
        }
        Ok(MaintenanceReport {
            registry_count: self.last_doc_id,
            system_healthy: true,
            last_checked: ctx.height,
        })
    }

    /// Acknowledge a lock request from the owner or the administrator. Only
    /// the authorization is enforced; the record is left unchanged.
    pub fn security_lock(&self, ctx: &CallContext, doc_id: DocId) -> Result<()> {
        let record = self
            .record(doc_id)
            .map_err(|e| rejected("security_lock", ctx, e))?;
        if record.owner() != &ctx.caller && ctx.caller != self.admin {
            return Err(rejected(
                "security_lock",
                ctx,
                RegistryError::AdminOnlyAction,
            ));
        }
        info!("security lock acknowledged on {} for {}", doc_id, ctx.caller);
        Ok(())
    }

    // ---- checks -------------------------------------------------------------

    fn record(&self, doc_id: DocId) -> Result<&DocumentRecord> {
        self.records
            .get(doc_id)
            .ok_or(RegistryError::DocumentNotFound(doc_id))
    }

    fn owned(&self, ctx: &CallContext, doc_id: DocId) -> Result<&DocumentRecord> {
        let record = self.record(doc_id)?;
        if record.owner() != &ctx.caller {
            return Err(RegistryError::UnauthorizedOwner);
        }
        Ok(record)
    }

    fn viewable(&self, ctx: &CallContext, doc_id: DocId) -> Result<&DocumentRecord> {
        let record = self.record(doc_id)?;
        if !self.grants_view(doc_id, record, &ctx.caller) {
            return Err(RegistryError::PermissionDenied);
        }
        Ok(record)
    }

    fn grants_view(&self, doc_id: DocId, record: &DocumentRecord, identity: &Identity) -> bool {
        record.owner() == identity
            || *identity == self.admin
            || self.permissions.get(doc_id, identity) == Some(true)
    }

    // ---- planning -----------------------------------------------------------

    fn prepare_register(
        &self,
        ctx: &CallContext,
        title: &str,
        file_size: u64,
        description: &str,
        tags: &[String],
    ) -> Result<Plan<DocId>> {
        validation::check_fields(title, file_size, description, tags)?;
        let doc_id = DocId(self.last_doc_id + 1);
        let record = DocumentRecord::new(
            title.to_string(),
            ctx.caller.clone(),
            file_size,
            ctx.height,
            description.to_string(),
            tags.to_vec(),
        );
        Ok(Plan::new(
            vec![
                Write::PutRecord(doc_id, record),
                Write::GrantView(doc_id, ctx.caller.clone()),
                Write::AdvanceCounter(doc_id),
            ],
            doc_id,
        ))
    }

    fn prepare_update(
        &self,
        ctx: &CallContext,
        doc_id: DocId,
        title: &str,
        file_size: u64,
        description: &str,
        tags: &[String],
    ) -> Result<Plan<()>> {
        let record = self.owned(ctx, doc_id)?;
        validation::check_fields(title, file_size, description, tags)?;
        let updated = record.with_contents(
            title.to_string(),
            file_size,
            description.to_string(),
            tags.to_vec(),
        );
        Ok(Plan::new(vec![Write::PutRecord(doc_id, updated)], ()))
    }

    fn prepare_transfer(
        &self,
        ctx: &CallContext,
        doc_id: DocId,
        new_owner: &Identity,
    ) -> Result<Plan<()>> {
        let record = self.owned(ctx, doc_id)?;
        Ok(Plan::new(
            vec![Write::PutRecord(doc_id, record.with_owner(new_owner.clone()))],
            (),
        ))
    }

    fn prepare_add_tags(
        &self,
        ctx: &CallContext,
        doc_id: DocId,
        tags: &[String],
    ) -> Result<Plan<Vec<String>>> {
        let record = self.owned(ctx, doc_id)?;
        if !validation::validate_tag_format(tags) || record.tags().len() + tags.len() > MAX_TAGS {
            return Err(RegistryError::TagValidationFailed);
        }
        let combined: Vec<String> = record.tags().iter().chain(tags).cloned().collect();
        Ok(Plan::new(
            vec![Write::PutRecord(doc_id, record.with_tags(combined.clone()))],
            combined,
        ))
    }

    fn prepare_archive(&self, ctx: &CallContext, doc_id: DocId) -> Result<Plan<()>> {
        let record = self.owned(ctx, doc_id)?;
        if record.tags().len() + 1 > MAX_TAGS {
            return Err(RegistryError::TagValidationFailed);
        }
        let mut tags = record.tags().to_vec();
        tags.push(ARCHIVED_TAG.to_string());
        Ok(Plan::new(vec![Write::PutRecord(doc_id, record.with_tags(tags))], ()))
    }

    fn prepare_delete(&self, ctx: &CallContext, doc_id: DocId) -> Result<Plan<()>> {
        self.owned(ctx, doc_id)?;
        Ok(Plan::new(vec![Write::RemoveRecord(doc_id)], ()))
    }

    fn prepare_grant(
        &self,
        ctx: &CallContext,
        doc_id: DocId,
        viewer: &Identity,
    ) -> Result<Plan<()>> {
        self.owned(ctx, doc_id)?;
        Ok(Plan::new(vec![Write::GrantView(doc_id, viewer.clone())], ()))
    }

    fn prepare_revoke(
        &self,
        ctx: &CallContext,
        doc_id: DocId,
        viewer: &Identity,
    ) -> Result<Plan<()>> {
        self.owned(ctx, doc_id)?;
        if *viewer == ctx.caller {
            return Err(RegistryError::AdminOnlyAction);
        }
        Ok(Plan::new(
            vec![Write::RemovePermission(doc_id, viewer.clone())],
            (),
        ))
    }
}

fn rejected(op: &'static str, ctx: &CallContext, err: RegistryError) -> RegistryError {
    match err {
        RegistryError::AdminOnlyAction | RegistryError::UnauthorizedOwner => {
            warn!("{} by {} rejected: {}", op, ctx.caller, err)
        }
        _ => debug!("{} by {} rejected: {}", op, ctx.caller, err),
    }
    err
}
