use super::*;
use tempfile::TempDir;

fn register_entry(caller: &str, title: &str) -> LogEntry {
    LogEntry {
        sequence: 0,
        timestamp: 1_700_000_000_000,
        height: 0,
        caller: Identity::from(caller),
        operation: Operation::Command(Command::Register {
            title: title.to_string(),
            file_size: 2048,
            description: "Lot 7".to_string(),
            tags: vec!["residential".to_string()],
        }),
    }
}

#[tokio::test]
async fn test_wal_basic_operations() {
    let temp_dir = TempDir::new().unwrap();
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    assert_eq!(wal.next_sequence(), 0);

    let seq = wal.append(register_entry("alice", "Deed-1")).await.unwrap();
    assert_eq!(seq, 0);
    assert_eq!(wal.next_sequence(), 1);

    let entries = wal.read_from(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].caller.as_str(), "alice");
    assert_eq!(entries[0].sequence, 0);
}

#[tokio::test]
async fn test_wal_multiple_entries() {
    let temp_dir = TempDir::new().unwrap();
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();

    for i in 0..10u64 {
        let mut entry = register_entry(&format!("user{}", i % 3), &format!("Deed-{}", i));
        entry.height = i;
        let seq = wal.append(entry).await.unwrap();
        assert_eq!(seq, i);
    }

    let entries = wal.read_from(0).unwrap();
    assert_eq!(entries.len(), 10);

    // Read from middle
    let entries = wal.read_from(5).unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].sequence, 5);
    assert_eq!(entries[0].height, 5);
}

#[tokio::test]
async fn test_wal_concurrent_writes() {
    let temp_dir = TempDir::new().unwrap();
    let wal = Arc::new(WriteAheadLog::new(temp_dir.path()).await.unwrap());

    let mut handles = vec![];
    for i in 0..10 {
        let wal = wal.clone();
        handles.push(tokio::spawn(async move {
            wal.append(register_entry(&format!("user{}", i), "Deed"))
                .await
                .unwrap()
        }));
    }

    let mut sequences = vec![];
    for handle in handles {
        sequences.push(handle.await.unwrap());
    }
    sequences.sort();
    sequences.dedup();
    assert_eq!(sequences.len(), 10);

    let entries = wal.read_from(0).unwrap();
    assert_eq!(entries.len(), 10);
}

#[tokio::test]
async fn test_wal_recovery_continues_sequence() {
    let temp_dir = TempDir::new().unwrap();

    {
        let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
        for i in 0..5 {
            wal.append(register_entry("alice", &format!("Deed-{}", i)))
                .await
                .unwrap();
        }
    }

    {
        let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
        let entries = wal.read_from(0).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(wal.next_sequence(), 5);

        let seq = wal.append(register_entry("alice", "after recovery")).await.unwrap();
        assert_eq!(seq, 5);
        // reopening must not clobber earlier entries
        assert_eq!(wal.read_from(0).unwrap().len(), 6);
    }
}

#[tokio::test]
async fn test_wal_single_entry_recovery() {
    let temp_dir = TempDir::new().unwrap();
    {
        let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
        wal.append(register_entry("alice", "only")).await.unwrap();
    }
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    assert_eq!(wal.next_sequence(), 1);
}

#[tokio::test]
async fn test_wal_torn_tail_is_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("wal-00000000.log");

    {
        let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
        for i in 0..3 {
            wal.append(register_entry("alice", &format!("Deed-{}", i)))
                .await
                .unwrap();
        }
    }
    let intact_len = std::fs::metadata(&wal_path).unwrap().len();

    // Simulate a crash halfway through writing a fourth entry
    let encoded = WriteAheadLog::encode_entry(&register_entry("alice", "torn")).unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&encoded[..encoded.len() / 2]).unwrap();
    drop(file);

    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), intact_len);
    assert_eq!(wal.next_sequence(), 3);

    let seq = wal.append(register_entry("bob", "Deed-3")).await.unwrap();
    assert_eq!(seq, 3);
    let entries = wal.read_from(0).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3].caller.as_str(), "bob");
}

#[tokio::test]
async fn test_wal_crc_validation() {
    let temp_dir = TempDir::new().unwrap();
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    wal.append(register_entry("alice", "Deed-1")).await.unwrap();

    // Corrupt a byte inside the entry body
    let wal_path = temp_dir.path().join("wal-00000000.log");
    let mut content = std::fs::read(&wal_path).unwrap();
    content[20] ^= 0xFF;
    std::fs::write(&wal_path, content).unwrap();

    let entries = wal.read_from(0).unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_wal_rejects_foreign_file() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("wal-00000000.log"), b"NOTAWAL!garbage").unwrap();
    assert!(WriteAheadLog::new(temp_dir.path()).await.is_err());
}

#[tokio::test]
async fn test_wal_all_operation_types() {
    let temp_dir = TempDir::new().unwrap();
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();

    let doc_id = DocId(1);
    let operations = vec![
        Operation::Genesis {
            admin: Identity::from("admin"),
        },
        Operation::Command(Command::Register {
            title: "Deed-1".to_string(),
            file_size: 2048,
            description: "Lot 7".to_string(),
            tags: vec!["residential".to_string(), "corner".to_string()],
        }),
        Operation::Command(Command::Update {
            doc_id,
            title: "Deed-1-Revised".to_string(),
            file_size: 4096,
            description: "Lot 7 \u{2013} amended".to_string(),
            tags: vec!["residential".to_string()],
        }),
        Operation::Command(Command::Transfer {
            doc_id,
            new_owner: Identity::from("bob"),
        }),
        Operation::Command(Command::AddTags {
            doc_id,
            tags: vec!["zoned".to_string()],
        }),
        Operation::Command(Command::Archive { doc_id }),
        Operation::Command(Command::GrantAccess {
            doc_id,
            viewer: Identity::from("carol"),
        }),
        Operation::Command(Command::RevokeAccess {
            doc_id,
            viewer: Identity::from("carol"),
        }),
        Operation::Command(Command::Delete { doc_id }),
    ];

    for (i, operation) in operations.iter().enumerate() {
        let entry = LogEntry {
            sequence: 0,
            timestamp: 1000 * i as i64,
            height: i as u64,
            caller: Identity::from("alice"),
            operation: operation.clone(),
        };
        wal.append(entry).await.unwrap();
    }

    let entries = wal.read_from(0).unwrap();
    let decoded: Vec<Operation> = entries.into_iter().map(|e| e.operation).collect();
    assert_eq!(decoded, operations);
}

#[test]
fn test_decode_rejects_truncated_body() {
    // a well-formed frame whose body ends before the header does
    let body = [0u8; 6];
    let mut hasher = Hasher::new();
    hasher.update(&body);
    let mut frame = BytesMut::new();
    frame.put_u32(body.len() as u32 + 4);
    frame.put_slice(&body);
    frame.put_u32(hasher.finalize());

    let mut reader = &frame[..];
    assert!(WriteAheadLog::decode_entry(&mut reader).is_err());
}

#[test]
fn test_segment_names() {
    assert_eq!(parse_segment_name("wal-00000003.log"), Some(3));
    assert_eq!(parse_segment_name("wal-x.log"), None);
    assert_eq!(parse_segment_name("other.log"), None);
}

#[tokio::test]
async fn test_wal_oversized_entry_keeps_sequence() {
    let temp_dir = TempDir::new().unwrap();
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    wal.append(register_entry("alice", "Deed-1")).await.unwrap();

    let oversized = register_entry(&"v".repeat(2 * 1024 * 1024), "Deed-2");
    assert!(WriteAheadLog::check_entry(&oversized).is_err());
    assert!(wal.append(oversized).await.is_err());
    assert_eq!(wal.next_sequence(), 1);

    let seq = wal.append(register_entry("alice", "Deed-3")).await.unwrap();
    assert_eq!(seq, 1);
    let sequences: Vec<u64> = wal.read_from(0).unwrap().iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1]);
}

#[tokio::test]
async fn test_wal_rollback_drops_partial_write() {
    let temp_dir = TempDir::new().unwrap();
    {
        let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
        wal.append(register_entry("alice", "Deed-1")).await.unwrap();

        // Bytes of a write that failed halfway
        {
            let mut segment = wal.current_segment.write();
            segment.file.write_all(b"\x00\x00\x01\x00partial").unwrap();
            segment.rollback().unwrap();
        }

        wal.append(register_entry("bob", "Deed-2")).await.unwrap();
    }

    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    assert_eq!(wal.next_sequence(), 2);
    let entries = wal.read_from(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].caller.as_str(), "bob");
}

#[tokio::test]
async fn test_wal_poisoned_after_failed_rollback() {
    let temp_dir = TempDir::new().unwrap();
    let wal = WriteAheadLog::new(temp_dir.path()).await.unwrap();
    wal.append(register_entry("alice", "Deed-1")).await.unwrap();

    // A read-only handle fails both the write and the truncation
    let path = temp_dir.path().join("wal-00000000.log");
    wal.current_segment.write().file = File::open(&path).unwrap();

    assert!(wal.append(register_entry("alice", "Deed-2")).await.is_err());
    assert!(wal.poisoned.load(Ordering::SeqCst));
    assert!(wal.append(register_entry("alice", "Deed-3")).await.is_err());
    assert_eq!(wal.next_sequence(), 1);
    assert_eq!(wal.read_from(0).unwrap().len(), 1);
}
