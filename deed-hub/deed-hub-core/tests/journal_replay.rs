use deed_hub_core::{Command, DocId, Identity, JournaledRegistry, Outcome, RegistryError};
use tempfile::TempDir;

#[tokio::test]
async fn replay_restores_owners_grants_and_tags() {
    let temp_dir = TempDir::new().unwrap();
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");
    let carol = Identity::from("carol");

    {
        let mut journal = JournaledRegistry::initialize(temp_dir.path(), "admin")
            .await
            .unwrap();
        journal
            .submit(
                &alice,
                Command::Register {
                    title: "Deed-1".to_string(),
                    file_size: 2048,
                    description: "Lot 7".to_string(),
                    tags: vec!["residential".to_string()],
                },
            )
            .await
            .unwrap();
        journal
            .submit(
                &alice,
                Command::GrantAccess {
                    doc_id: DocId(1),
                    viewer: carol.clone(),
                },
            )
            .await
            .unwrap();
        let outcome = journal
            .submit(
                &alice,
                Command::AddTags {
                    doc_id: DocId(1),
                    tags: vec!["corner".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Tags {
                tags: vec!["residential".to_string(), "corner".to_string()]
            }
        );
        journal
            .submit(&alice, Command::Archive { doc_id: DocId(1) })
            .await
            .unwrap();
        journal
            .submit(
                &alice,
                Command::Transfer {
                    doc_id: DocId(1),
                    new_owner: bob.clone(),
                },
            )
            .await
            .unwrap();

        // rejected, so absent from the log
        let err = journal
            .submit(
                &alice,
                Command::RevokeAccess {
                    doc_id: DocId(1),
                    viewer: carol.clone(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&RegistryError::UnauthorizedOwner));
    }

    let journal = JournaledRegistry::open(temp_dir.path()).await.unwrap();
    assert_eq!(journal.height(), 6);

    let registry = journal.registry();
    assert!(registry.can_view(DocId(1), &carol));
    assert!(registry.can_view(DocId(1), &bob));
    assert!(!registry.can_view(DocId(1), &Identity::from("dave")));

    let record = registry
        .get_document(&journal.context(&carol), DocId(1))
        .unwrap();
    assert_eq!(record.owner(), &bob);
    assert_eq!(record.tags(), ["residential", "corner", "ARCHIVED"]);

    let report = registry
        .verify_authenticity(&journal.context(&carol), DocId(1), &bob)
        .unwrap();
    assert!(report.is_valid && report.owner_match);
    assert_eq!(report.current_height, 6);
    assert_eq!(report.blocks_since_creation, 5);
}
