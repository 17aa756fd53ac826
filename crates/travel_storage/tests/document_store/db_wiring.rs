#![forbid(unsafe_code)]

use travel_kernel_contracts::history::{HistoryDelta, Visit};
use travel_kernel_contracts::identity::{ExternalIdentityKey, RecordId};
use travel_kernel_contracts::profile::ProfileInput;
use travel_storage::{DocumentStore, HistoryRepo, ProfileRepo, StorageError, StoreLocation};

fn key(k: &str) -> ExternalIdentityKey {
    ExternalIdentityKey::new(k).unwrap()
}

fn ann(external_id: &str) -> ProfileInput {
    ProfileInput {
        external_id: key(external_id),
        name: "Ann".to_string(),
        email: "a@x.com".to_string(),
        age: 30,
        country: "US".to_string(),
        region: "CA".to_string(),
        phone: 5_551_234_567,
    }
}

fn visit(destination: &str, price: f64) -> Visit {
    Visit {
        destination: destination.to_string(),
        lodging: format!("{destination} Inn"),
        rating: 4.0,
        price,
        days_stayed: 2.0,
    }
}

#[test]
fn at_store_db_01_profile_create_then_read_by_id_and_key() {
    let s = DocumentStore::new_in_memory();
    let first = s.create_profile(ann("u1")).unwrap();
    let second = s.create_profile(ann("u1")).unwrap();
    assert_ne!(first.id, second.id);

    assert_eq!(s.find_profile_by_id(&first.id).unwrap(), Some(first.clone()));
    // Identity keys are not unique; lookup resolves to the earliest record.
    assert_eq!(
        s.find_profile_by_identity_key(&key("u1")).unwrap().map(|p| p.id),
        Some(first.id)
    );
    assert_eq!(s.find_profile_by_identity_key(&key("nobody")).unwrap(), None);
    assert_eq!(
        s.find_profile_by_id(&RecordId::new("missing").unwrap()).unwrap(),
        None
    );
    assert_eq!(s.profile_count().unwrap(), 2);
}

#[test]
fn at_store_db_02_history_create_at_explicit_id_and_reject_duplicate() {
    let s = DocumentStore::new_in_memory();
    let id = RecordId::new("h1").unwrap();
    let h = HistoryDelta::empty(key("u1")).with_visit(&visit("Paris", 120.0));

    let created = s.create_history(Some(id.clone()), h.clone()).unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.version, 1);

    assert!(matches!(
        s.create_history(Some(id.clone()), h.clone()),
        Err(StorageError::DuplicateKey { collection: "history", .. })
    ));

    let assigned = s.create_history(None, h).unwrap();
    assert_ne!(assigned.id, id);
    assert_eq!(
        s.find_history_by_identity_key(&key("u1")).unwrap().map(|r| r.id),
        Some(id)
    );
}

#[test]
fn at_store_db_03_history_update_is_compare_and_swap_on_version() {
    let s = DocumentStore::new_in_memory();
    let id = RecordId::new("h1").unwrap();
    let one = HistoryDelta::empty(key("u1")).with_visit(&visit("Paris", 120.0));
    s.create_history(Some(id.clone()), one.clone()).unwrap();

    let two = one.with_visit(&visit("Rome", 200.0));
    let updated = s.update_history_by_id(&id, 1, two.clone()).unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.history.len(), 2);

    // A writer still holding version 1 must not overwrite the newer record.
    let stale = one.with_visit(&visit("Oslo", 90.0));
    assert_eq!(
        s.update_history_by_id(&id, 1, stale),
        Err(StorageError::VersionConflict {
            id: "h1".to_string(),
            expected: 1,
            found: 2
        })
    );
    assert_eq!(s.find_history_by_id(&id).unwrap().unwrap().history, two);

    assert!(matches!(
        s.update_history_by_id(&RecordId::new("nope").unwrap(), 1, two),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_store_db_04_misaligned_history_is_never_written() {
    let s = DocumentStore::new_in_memory();
    let id = RecordId::new("h1").unwrap();
    let mut bad = HistoryDelta::empty(key("u1")).with_visit(&visit("Paris", 120.0));
    bad.rating.push(5.0);
    assert!(matches!(
        s.create_history(Some(id.clone()), bad),
        Err(StorageError::ContractViolation(_))
    ));
    assert_eq!(s.find_history_by_id(&id).unwrap(), None);
    assert_eq!(s.history_count().unwrap(), 0);
}

#[test]
fn at_store_db_05_journal_replays_committed_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.jsonl");
    let location = StoreLocation::parse(&format!("file:{}", path.display())).unwrap();
    let id = RecordId::new("h1").unwrap();

    let profile_id = {
        let s = DocumentStore::open(&location).unwrap();
        let profile = s.create_profile(ann("u1")).unwrap();
        let one = HistoryDelta::empty(key("u1")).with_visit(&visit("Paris", 120.0));
        s.create_history(Some(id.clone()), one.clone()).unwrap();
        s.update_history_by_id(&id, 1, one.with_visit(&visit("Rome", 200.0)))
            .unwrap();
        profile.id
    };

    let reopened = DocumentStore::open(&location).unwrap();
    assert_eq!(
        reopened.find_profile_by_id(&profile_id).unwrap().unwrap().profile,
        ann("u1")
    );
    let history = reopened.find_history_by_id(&id).unwrap().unwrap();
    assert_eq!(history.version, 2);
    assert_eq!(history.history.destination, vec!["Paris", "Rome"]);
    assert_eq!(reopened.history_count().unwrap(), 1);

    // Versions survive replay, so a stale writer is still refused after restart.
    assert!(matches!(
        reopened.update_history_by_id(&id, 1, history.history.clone()),
        Err(StorageError::VersionConflict { .. })
    ));
}

#[test]
fn at_store_db_06_corrupt_journal_is_reported_as_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");
    std::fs::write(&path, "{not json}\n").unwrap();
    let err = DocumentStore::open(&StoreLocation::Journal(path)).unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(ref msg) if msg.contains("line 1")));
}

#[test]
fn at_store_db_07_torn_final_line_is_dropped_on_open() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");
    let location = StoreLocation::Journal(path.clone());
    let id = RecordId::new("h1").unwrap();
    {
        let s = DocumentStore::open(&location).unwrap();
        s.create_history(
            Some(id.clone()),
            HistoryDelta::empty(key("u1")).with_visit(&visit("Paris", 120.0)),
        )
        .unwrap();
    }
    let committed_len = std::fs::metadata(&path).unwrap().len();
    std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(br#"{"schema_version":1,"op":{"histo"#)
        .unwrap();

    let profile_id = {
        let s = DocumentStore::open(&location).unwrap();
        assert_eq!(s.history_count().unwrap(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), committed_len);
        s.create_profile(ann("u1")).unwrap().id
    };

    // The next write lands on its own line, so the journal stays replayable.
    let reopened = DocumentStore::open(&location).unwrap();
    assert_eq!(reopened.history_count().unwrap(), 1);
    assert_eq!(reopened.profile_count().unwrap(), 1);
    assert!(reopened.find_profile_by_id(&profile_id).unwrap().is_some());
    assert_eq!(
        reopened.find_history_by_id(&id).unwrap().unwrap().history.destination,
        vec!["Paris"]
    );
}

#[test]
fn at_store_db_08_complete_final_line_without_newline_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.jsonl");
    let location = StoreLocation::Journal(path.clone());
    {
        let s = DocumentStore::open(&location).unwrap();
        s.create_profile(ann("u1")).unwrap();
    }
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.trim_end()).unwrap();

    {
        let s = DocumentStore::open(&location).unwrap();
        assert_eq!(s.profile_count().unwrap(), 1);
        s.create_profile(ann("u2")).unwrap();
    }
    let reopened = DocumentStore::open(&location).unwrap();
    assert_eq!(reopened.profile_count().unwrap(), 2);
}
