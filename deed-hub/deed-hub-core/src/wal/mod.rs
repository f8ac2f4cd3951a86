//! Write-Ahead Log (WAL) for durability
//!
//! Append-only log of accepted registry commands. Every entry is length
//! prefixed and CRC checked; segments rotate in the background once they grow
//! past `SEGMENT_SIZE`. A torn entry at the tail of the newest segment (crash
//! mid-write) is cut off when the log is reopened.

use crate::document::DocId;
use crate::identity::{Height, Identity};
use crate::registry::Command;
use anyhow::{anyhow, Result};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const MAGIC: &[u8] = b"DEEDWAL1";
const SEGMENT_SIZE: u64 = 64 * 1024 * 1024; // 64MB segments
const MAX_ENTRY_LEN: usize = 1024 * 1024;

/// A single log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub sequence: u64,
    /// Wall-clock milliseconds, informational only.
    pub timestamp: i64,
    pub height: Height,
    pub caller: Identity,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// First entry of every log; fixes the administrator.
    Genesis { admin: Identity },
    Command(Command),
}

/// Thread-safe write-ahead log
pub struct WriteAheadLog {
    dir: PathBuf,
    current_segment: Arc<RwLock<Segment>>,
    sequence: Arc<AtomicU64>,
    poisoned: AtomicBool,
    rotation_tx: mpsc::Sender<()>,
}

struct Segment {
    id: u64,
    file: File,
    size: u64,
}

impl WriteAheadLog {
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        // Find the latest segment or create first one
        let (segment_id, sequence) = Self::find_latest_segment(&dir)?;
        let segment = Segment::open(&dir, segment_id)?;

        let (rotation_tx, mut rotation_rx) = mpsc::channel(1);
        let current_segment = Arc::new(RwLock::new(segment));
        let segment_clone = Arc::clone(&current_segment);
        let dir_clone = dir.clone();

        // Background rotation task
        tokio::spawn(async move {
            while rotation_rx.recv().await.is_some() {
                let mut segment = segment_clone.write();
                if segment.size >= SEGMENT_SIZE {
                    match Segment::open(&dir_clone, segment.id + 1) {
                        Ok(new_segment) => *segment = new_segment,
                        Err(e) => tracing::warn!("WAL rotation failed: {}", e),
                    }
                }
            }
        });

        Ok(Self {
            dir,
            current_segment,
            sequence: Arc::new(AtomicU64::new(sequence)),
            poisoned: AtomicBool::new(false),
            rotation_tx,
        })
    }

    /// Sequence number the next appended entry will receive.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Append an entry to the log. The log assigns the sequence number.
    ///
    /// A sequence number is only consumed by an entry that reached disk. A
    /// failed write is cut back off the segment; if that fails too the log is
    /// poisoned and refuses further appends.
    pub async fn append(&self, entry: LogEntry) -> Result<u64> {
        let mut entry = entry;
        {
            let mut segment = self.current_segment.write();
            if self.poisoned.load(Ordering::SeqCst) {
                return Err(anyhow!("WAL is poisoned by an earlier failed write"));
            }

            let sequence = self.sequence.load(Ordering::SeqCst);
            entry.sequence = sequence;
            let encoded = Self::encode_entry(&entry)?;

            if let Err(e) = segment.write_entry(&encoded) {
                if let Err(rollback) = segment.rollback() {
                    tracing::error!("WAL rollback after failed write failed: {}", rollback);
                    self.poisoned.store(true, Ordering::SeqCst);
                }
                return Err(e);
            }
            self.sequence.store(sequence + 1, Ordering::SeqCst);
        }

        // Check if rotation needed (non-blocking)
        let _ = self.rotation_tx.try_send(());

        Ok(entry.sequence)
    }

    /// Reject an entry the log could never store, without touching the log.
    pub fn check_entry(entry: &LogEntry) -> Result<()> {
        Self::encode_entry(entry).map(|_| ())
    }

    /// Read entries from a sequence number
    pub fn read_from(&self, start_seq: u64) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();

        for segment_id in 0.. {
            let path = self.segment_path(segment_id);
            if !path.exists() {
                break;
            }

            let file = File::open(&path)?;
            let mut reader = BufReader::new(file);

            let mut magic = [0u8; 8];
            if reader.read_exact(&mut magic).is_err() {
                continue;
            }
            if &magic[..] != MAGIC {
                return Err(anyhow!("Invalid WAL segment {}", path.display()));
            }

            while let Ok(entry) = Self::decode_entry(&mut reader) {
                if entry.sequence >= start_seq {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }

    fn find_latest_segment(dir: &Path) -> Result<(u64, u64)> {
        let mut max_id = 0;
        let mut max_seq: Option<u64> = None;

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(id) = name.to_str().and_then(parse_segment_name) else {
                continue;
            };
            max_id = max_id.max(id);
            if let Some(seq) = Self::find_max_sequence(&entry.path())? {
                max_seq = Some(max_seq.map_or(seq, |m| m.max(seq)));
            }
        }

        Ok((max_id, max_seq.map_or(0, |s| s + 1)))
    }

    fn find_max_sequence(path: &Path) -> Result<Option<u64>> {
        let mut max_seq = None;
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        // Skip magic
        reader.seek(SeekFrom::Start(MAGIC.len() as u64))?;

        while let Ok(entry) = Self::decode_entry(&mut reader) {
            max_seq = Some(max_seq.map_or(entry.sequence, |m: u64| m.max(entry.sequence)));
        }

        Ok(max_seq)
    }

    fn segment_path(&self, id: u64) -> PathBuf {
        segment_path(&self.dir, id)
    }

    fn encode_entry(entry: &LogEntry) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();

        // Header
        buf.put_u64(entry.sequence);
        buf.put_i64(entry.timestamp);
        buf.put_u64(entry.height);
        put_str(&mut buf, entry.caller.as_str())?;

        // Operation
        match &entry.operation {
            Operation::Genesis { admin } => {
                buf.put_u8(0);
                put_str(&mut buf, admin.as_str())?;
            }
            Operation::Command(command) => encode_command(&mut buf, command)?,
        }

        if buf.len() + 4 > MAX_ENTRY_LEN {
            return Err(anyhow!("WAL entry of {} bytes exceeds limit", buf.len()));
        }

        // Length prefix and CRC
        let data = buf.freeze();
        let mut hasher = Hasher::new();
        hasher.update(&data);
        let crc = hasher.finalize();

        let mut result = BytesMut::with_capacity(data.len() + 8);
        result.put_u32(data.len() as u32 + 4); // Include CRC in length
        result.put(data);
        result.put_u32(crc);

        Ok(result.freeze().to_vec())
    }

    fn decode_entry<R: Read>(reader: &mut R) -> Result<LogEntry> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if !(4..=MAX_ENTRY_LEN).contains(&len) {
            return Err(anyhow!("WAL entry length {} out of range", len));
        }

        // Read data + CRC
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;

        let (data, crc_bytes) = buf.split_at(len - 4);
        let crc = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut hasher = Hasher::new();
        hasher.update(data);
        if hasher.finalize() != crc {
            return Err(anyhow!("CRC mismatch"));
        }

        let mut cursor = data;
        need(&cursor, 24)?;
        let sequence = cursor.get_u64();
        let timestamp = cursor.get_i64();
        let height = cursor.get_u64();
        let caller = Identity::new(get_str(&mut cursor)?);

        need(&cursor, 1)?;
        let operation = match cursor.get_u8() {
            0 => Operation::Genesis {
                admin: Identity::new(get_str(&mut cursor)?),
            },
            tag => Operation::Command(decode_command(tag, &mut cursor)?),
        };

        Ok(LogEntry {
            sequence,
            timestamp,
            height,
            caller,
            operation,
        })
    }
}

impl Segment {
    /// Open (or create) a segment for appending, dropping any torn tail.
    fn open(dir: &Path, id: u64) -> Result<Self> {
        let path = segment_path(dir, id);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        // Write magic if new file
        if file.metadata()?.len() == 0 {
            file.write_all(MAGIC)?;
            file.sync_data()?;
        }

        let len = file.metadata()?.len();
        let valid = Self::valid_len(&path)?;
        if valid < len {
            tracing::warn!(
                "truncating {} torn bytes from {}",
                len - valid,
                path.display()
            );
            file.set_len(valid)?;
            file.sync_data()?;
        }

        Ok(Self {
            id,
            file,
            size: valid,
        })
    }

    fn write_entry(&mut self, encoded: &[u8]) -> Result<()> {
        self.file.write_all(encoded)?;
        self.file.sync_data()?;
        self.size += encoded.len() as u64;
        Ok(())
    }

    /// Cut the file back to the end of the last complete entry.
    fn rollback(&mut self) -> Result<()> {
        self.file.set_len(self.size)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Byte length of the magic plus every intact entry.
    fn valid_len(path: &Path) -> Result<u64> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic[..] != MAGIC {
            return Err(anyhow!("Invalid WAL segment {}", path.display()));
        }
        let mut valid = MAGIC.len() as u64;
        while WriteAheadLog::decode_entry(&mut reader).is_ok() {
            valid = reader.stream_position()?;
        }
        Ok(valid)
    }
}

fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("wal-{:08}.log", id))
}

fn parse_segment_name(name: &str) -> Option<u64> {
    name.strip_prefix("wal-")?.strip_suffix(".log")?.parse().ok()
}

fn encode_command(buf: &mut BytesMut, command: &Command) -> Result<()> {
    match command {
        Command::Register {
            title,
            file_size,
            description,
            tags,
        } => {
            buf.put_u8(1);
            put_str(buf, title)?;
            buf.put_u64(*file_size);
            put_str(buf, description)?;
            put_tags(buf, tags)?;
        }
        Command::Update {
            doc_id,
            title,
            file_size,
            description,
            tags,
        } => {
            buf.put_u8(2);
            buf.put_u64(doc_id.0);
            put_str(buf, title)?;
            buf.put_u64(*file_size);
            put_str(buf, description)?;
            put_tags(buf, tags)?;
        }
        Command::Transfer { doc_id, new_owner } => {
            buf.put_u8(3);
            buf.put_u64(doc_id.0);
            put_str(buf, new_owner.as_str())?;
        }
        Command::AddTags { doc_id, tags } => {
            buf.put_u8(4);
            buf.put_u64(doc_id.0);
            put_tags(buf, tags)?;
        }
        Command::Archive { doc_id } => {
            buf.put_u8(5);
            buf.put_u64(doc_id.0);
        }
        Command::Delete { doc_id } => {
            buf.put_u8(6);
            buf.put_u64(doc_id.0);
        }
        Command::GrantAccess { doc_id, viewer } => {
            buf.put_u8(7);
            buf.put_u64(doc_id.0);
            put_str(buf, viewer.as_str())?;
        }
        Command::RevokeAccess { doc_id, viewer } => {
            buf.put_u8(8);
            buf.put_u64(doc_id.0);
            put_str(buf, viewer.as_str())?;
        }
    }
    Ok(())
}

fn decode_command(tag: u8, cursor: &mut &[u8]) -> Result<Command> {
    let command = match tag {
        1 => {
            let title = get_str(cursor)?;
            let file_size = get_u64(cursor)?;
            let description = get_str(cursor)?;
            let tags = get_tags(cursor)?;
            Command::Register {
                title,
                file_size,
                description,
                tags,
            }
        }
        2 => {
            let doc_id = DocId(get_u64(cursor)?);
            let title = get_str(cursor)?;
            let file_size = get_u64(cursor)?;
            let description = get_str(cursor)?;
            let tags = get_tags(cursor)?;
            Command::Update {
                doc_id,
                title,
                file_size,
                description,
                tags,
            }
        }
        3 => Command::Transfer {
            doc_id: DocId(get_u64(cursor)?),
            new_owner: Identity::new(get_str(cursor)?),
        },
        4 => Command::AddTags {
            doc_id: DocId(get_u64(cursor)?),
            tags: get_tags(cursor)?,
        },
        5 => Command::Archive {
            doc_id: DocId(get_u64(cursor)?),
        },
        6 => Command::Delete {
            doc_id: DocId(get_u64(cursor)?),
        },
        7 => Command::GrantAccess {
            doc_id: DocId(get_u64(cursor)?),
            viewer: Identity::new(get_str(cursor)?),
        },
        8 => Command::RevokeAccess {
            doc_id: DocId(get_u64(cursor)?),
            viewer: Identity::new(get_str(cursor)?),
        },
        _ => return Err(anyhow!("Unknown operation type {}", tag)),
    };
    Ok(command)
}

fn put_str(buf: &mut BytesMut, s: &str) -> Result<()> {
    let len = u32::try_from(s.len()).map_err(|_| anyhow!("string too long for WAL"))?;
    buf.put_u32(len);
    buf.put(s.as_bytes());
    Ok(())
}

fn put_tags(buf: &mut BytesMut, tags: &[String]) -> Result<()> {
    let count = u16::try_from(tags.len()).map_err(|_| anyhow!("too many tags for WAL"))?;
    buf.put_u16(count);
    for tag in tags {
        put_str(buf, tag)?;
    }
    Ok(())
}

fn need(cursor: &&[u8], n: usize) -> Result<()> {
    if cursor.remaining() < n {
        return Err(anyhow!("WAL entry truncated"));
    }
    Ok(())
}

fn get_u64(cursor: &mut &[u8]) -> Result<u64> {
    need(cursor, 8)?;
    Ok(cursor.get_u64())
}

fn get_str(cursor: &mut &[u8]) -> Result<String> {
    need(cursor, 4)?;
    let len = cursor.get_u32() as usize;
    need(cursor, len)?;
    let bytes = cursor.copy_to_bytes(len);
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn get_tags(cursor: &mut &[u8]) -> Result<Vec<String>> {
    need(cursor, 2)?;
    let count = cursor.get_u16();
    (0..count).map(|_| get_str(cursor)).collect()
}

#[cfg(test)]
mod tests;
