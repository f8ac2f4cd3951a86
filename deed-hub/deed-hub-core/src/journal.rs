//! Durable hosting of a [`Registry`] on top of the write-ahead log.
//!
//! The first entry of every log is a genesis record naming the administrator.
//! After that, each accepted command is appended to the log before its writes
//! are committed, so replaying the log from the start rebuilds the registry
//! exactly. The height handed to the registry is the sequence number the
//! command receives in the log.

use crate::error::JournalError;
use crate::identity::{CallContext, Height, Identity};
use crate::registry::{Command, Outcome, Registry};
use crate::wal::{LogEntry, Operation, WriteAheadLog};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::info;

pub struct JournaledRegistry {
    registry: Registry,
    wal: WriteAheadLog,
}

impl JournaledRegistry {
    /// Create a new registry in `dir`, administered by `admin`.
    pub async fn initialize(dir: impl AsRef<Path>, admin: impl Into<Identity>) -> Result<Self> {
        let dir = dir.as_ref();
        let wal = WriteAheadLog::new(dir).await?;
        if wal.next_sequence() != 0 {
            bail!("registry at {} is already initialized", dir.display());
        }

        let admin = admin.into();
        wal.append(LogEntry {
            sequence: 0,
            timestamp: Utc::now().timestamp_millis(),
            height: 0,
            caller: admin.clone(),
            operation: Operation::Genesis {
                admin: admin.clone(),
            },
        })
        .await?;

        info!("initialized registry at {} administered by {}", dir.display(), admin);
        Ok(Self {
            registry: Registry::new(admin),
            wal,
        })
    }

    /// Open an existing registry and rebuild its state from the log.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let wal = WriteAheadLog::new(dir).await?;
        let mut entries = wal.read_from(0)?;
        entries.sort_by_key(|e| e.sequence);

        let mut entries = entries.into_iter();
        let mut registry = match entries.next() {
            Some(LogEntry {
                sequence: 0,
                operation: Operation::Genesis { admin },
                ..
            }) => Registry::new(admin),
            Some(entry) => bail!(
                "journal at {} starts with entry {} instead of genesis",
                dir.display(),
                entry.sequence
            ),
            None => bail!("no registry at {}, run init first", dir.display()),
        };

        let mut replayed = 0u64;
        for (expected, entry) in (1u64..).zip(entries) {
            if entry.sequence != expected {
                bail!("journal gap: expected entry {}, found {}", expected, entry.sequence);
            }
            let Operation::Command(command) = &entry.operation else {
                bail!("unexpected genesis at entry {}", entry.sequence);
            };
            let ctx = CallContext::new(entry.caller.clone(), entry.height);
            let plan = registry.prepare(&ctx, command).with_context(|| {
                format!(
                    "journal diverged at entry {} ({} by {})",
                    entry.sequence,
                    command.name(),
                    entry.caller
                )
            })?;
            registry.commit(plan);
            replayed += 1;
        }

        info!(
            "opened registry at {}: replayed {} commands, {} documents registered",
            dir.display(),
            replayed,
            registry.registry_count()
        );
        Ok(Self { registry, wal })
    }

    /// Height the next accepted command will run at.
    pub fn height(&self) -> Height {
        self.wal.next_sequence()
    }

    /// Call context for `caller` at the current height, for reads.
    pub fn context(&self, caller: &Identity) -> CallContext {
        CallContext::new(caller.clone(), self.height())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Check, log, then apply a command. Rejected commands are not logged
    /// and consume no height.
    pub async fn submit(
        &mut self,
        caller: &Identity,
        command: Command,
    ) -> std::result::Result<Outcome, JournalError> {
        let ctx = self.context(caller);
        let plan = self.registry.prepare(&ctx, &command)?;

        let name = command.name();
        let entry = LogEntry {
            sequence: 0,
            timestamp: Utc::now().timestamp_millis(),
            height: ctx.height,
            caller: ctx.caller.clone(),
            operation: Operation::Command(command),
        };
        WriteAheadLog::check_entry(&entry)?;
        let sequence = self.wal.append(entry).await?;

        let outcome = self.registry.commit(plan);
        info!("{} by {} accepted as entry {}", name, ctx.caller, sequence);
        Ok(outcome)
    }
}
