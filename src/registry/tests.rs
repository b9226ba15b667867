//! Tests for the ownership registry.

use super::*;
use crate::audit::{AuditAction, AuditLog};
use crate::fs::{AccessMode, ExclusiveFile, LockWait};
use crate::store::WriteMode;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Barrier;
use std::thread;
use tempfile::TempDir;

fn open_table(temp_dir: &TempDir) -> LockTable {
    LockTable::open(temp_dir.path().join("locks.json"), StoreOptions::default()).unwrap()
}

#[test]
fn test_fresh_registry_checkout_flow() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    assert!(!locks.is_held("part1.mcam").unwrap());

    locks.checkout("part1.mcam", "alice", "editing").unwrap();

    assert!(locks.is_held("part1.mcam").unwrap());
    let record = locks.get("part1.mcam").unwrap().unwrap();
    assert_eq!(record.owner, "alice");
    assert_eq!(record.annotation, "editing");
}

#[test]
fn test_acquire_held_key_fails_with_current_owner() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    locks.checkout("part1.mcam", "alice", "editing").unwrap();

    let err = locks
        .checkout("part1.mcam", "bob", "also editing")
        .unwrap_err();

    match err {
        PartlockError::AlreadyHeld { key, owner } => {
            assert_eq!(key, "part1.mcam");
            assert_eq!(owner, "alice");
        }
        other => panic!("expected AlreadyHeld, got {:?}", other),
    }
    assert_eq!(locks.get("part1.mcam").unwrap().unwrap().annotation, "editing");
}

#[test]
fn test_acquire_same_owner_twice_still_fails() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    locks.checkout("part1.mcam", "alice", "first").unwrap();

    let err = locks.checkout("part1.mcam", "alice", "second").unwrap_err();
    assert!(matches!(err, PartlockError::AlreadyHeld { .. }));
}

#[test]
fn test_release_by_non_owner_fails_and_keeps_record() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    let original = locks.checkout("part1.mcam", "alice", "editing").unwrap();

    let err = locks.checkin("part1.mcam", "bob").unwrap_err();
    match err {
        PartlockError::NotOwner { owner, .. } => assert_eq!(owner, "alice"),
        other => panic!("expected NotOwner, got {:?}", other),
    }
    assert_eq!(locks.get("part1.mcam").unwrap(), Some(original));

    let removed = locks.checkin("part1.mcam", "alice").unwrap();
    assert_eq!(removed.owner, "alice");
    assert!(!locks.is_held("part1.mcam").unwrap());
}

#[test]
fn test_release_free_key_is_not_held() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    let err = locks.checkin("part1.mcam", "alice").unwrap_err();
    assert!(matches!(err, PartlockError::NotHeld { .. }));
}

#[test]
fn test_admin_release_bypasses_ownership() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    locks.checkout("part1.mcam", "alice", "editing").unwrap();

    let removed = locks
        .release("part1.mcam", "admin", Authority::Admin)
        .unwrap();

    assert_eq!(removed.owner, "alice");
    assert!(!locks.is_held("part1.mcam").unwrap());
}

#[test]
fn test_admin_release_of_free_key_is_not_held() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    let err = locks
        .release("part1.mcam", "admin", Authority::Admin)
        .unwrap_err();
    assert!(matches!(err, PartlockError::NotHeld { .. }));
}

#[test]
fn test_force_release_nonexistent_is_not_held() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    let err = locks.force_release("nonexistent.mcam").unwrap_err();
    match err {
        PartlockError::NotHeld { key } => assert_eq!(key, "nonexistent.mcam"),
        other => panic!("expected NotHeld, got {:?}", other),
    }
}

#[test]
fn test_force_release_removes_any_owner() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    locks.checkout("part1.mcam", "alice", "editing").unwrap();

    let removed = locks.force_release("part1.mcam").unwrap();

    assert_eq!(removed.owner, "alice");
    assert!(!locks.is_held("part1.mcam").unwrap());
    locks.checkout("part1.mcam", "bob", "my turn").unwrap();
}

#[test]
fn test_empty_key_and_owner_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    assert!(matches!(
        locks.checkout("  ", "alice", ""),
        Err(PartlockError::InvalidInput(_))
    ));
    assert!(matches!(
        locks.checkout("part1.mcam", "", ""),
        Err(PartlockError::InvalidInput(_))
    ));
    assert!(matches!(
        locks.release("part1.mcam", " ", Authority::Owner),
        Err(PartlockError::InvalidInput(_))
    ));
    assert!(locks.entries().unwrap().is_empty());
}

#[test]
fn test_whitespace_edged_key_is_kept_verbatim() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    locks.checkout(" part1.mcam ", "alice", "").unwrap();

    assert!(locks.is_held(" part1.mcam ").unwrap());
    assert!(!locks.is_held("part1.mcam").unwrap());
    assert_eq!(locks.get(" part1.mcam ").unwrap().unwrap().owner, "alice");
    assert!(matches!(
        locks.checkout(" part1.mcam ", "bob", ""),
        Err(PartlockError::AlreadyHeld { .. })
    ));

    locks.checkin(" part1.mcam ", "alice").unwrap();
    assert!(locks.entries().unwrap().is_empty());
}

#[test]
fn test_malformed_entry_does_not_wipe_the_table() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    std::fs::write(
        locks.path(),
        r#"{
  "a.mcam": {"user": "alice", "timestamp": "2025-01-01T12:00:00+00:00", "message": ""},
  "b.mcam": {"user": "bob", "timestamp": "2025-01-01T12:00:00", "message": ""},
  "broken.mcam": {"timestamp": 17}
}"#,
    )
    .unwrap();

    assert_eq!(locks.get("b.mcam").unwrap().unwrap().owner, "bob");
    assert!(!locks.is_held("broken.mcam").unwrap());

    locks.checkout("c.mcam", "carol", "").unwrap();

    let entries = locks.entries().unwrap();
    assert_eq!(
        entries.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["a.mcam", "b.mcam", "c.mcam"]
    );
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(locks.path()).unwrap()).unwrap();
    assert_eq!(raw["broken.mcam"]["timestamp"], 17);
}

#[test]
fn test_acquire_overwrites_malformed_entry() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    std::fs::write(locks.path(), r#"{"part1.mcam": "garbage"}"#).unwrap();

    assert!(matches!(
        locks.force_release("part1.mcam"),
        Err(PartlockError::NotHeld { .. })
    ));
    locks.checkout("part1.mcam", "alice", "").unwrap();
    assert_eq!(locks.get("part1.mcam").unwrap().unwrap().owner, "alice");
}

#[test]
fn test_document_keeps_file_order() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    std::fs::write(
        locks.path(),
        r#"{"z.mcam": {"user": "zoe", "timestamp": "2025-01-01T12:00:00+00:00", "message": ""}}"#,
    )
    .unwrap();

    locks.checkout("a.mcam", "alice", "").unwrap();
    locks.checkout("m.mcam", "mallory", "").unwrap();
    locks.checkin("a.mcam", "alice").unwrap();

    let content = std::fs::read_to_string(locks.path()).unwrap();
    let z = content.find("z.mcam").unwrap();
    let m = content.find("m.mcam").unwrap();
    assert!(z < m);
    assert!(!content.contains("a.mcam"));
}

#[test]
fn test_keys_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    locks.checkout("a.mcam", "alice", "").unwrap();
    locks.checkout("b.mcam", "bob", "").unwrap();
    locks.checkin("a.mcam", "alice").unwrap();

    assert!(!locks.is_held("a.mcam").unwrap());
    assert_eq!(locks.get("b.mcam").unwrap().unwrap().owner, "bob");
}

#[test]
fn test_state_is_shared_through_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let first = open_table(&temp_dir);
    let second = open_table(&temp_dir);

    first.checkout("part1.mcam", "alice", "").unwrap();

    assert!(second.is_held("part1.mcam").unwrap());
    assert!(matches!(
        second.checkout("part1.mcam", "bob", ""),
        Err(PartlockError::AlreadyHeld { .. })
    ));
}

#[test]
fn test_document_uses_frontend_field_names() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    locks.checkout("part1.mcam", "alice", "editing fixture").unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(locks.path()).unwrap()).unwrap();
    assert_eq!(raw["part1.mcam"]["user"], "alice");
    assert_eq!(raw["part1.mcam"]["message"], "editing fixture");
    assert!(raw["part1.mcam"]["timestamp"].is_string());
}

#[test]
fn test_corrupt_document_reads_as_free() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);
    std::fs::write(locks.path(), "{not json").unwrap();

    assert!(!locks.is_held("part1.mcam").unwrap());
    locks.checkout("part1.mcam", "alice", "").unwrap();
    assert!(locks.is_held("part1.mcam").unwrap());
}

#[test]
fn test_concurrent_acquire_has_exactly_one_winner() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("locks.json");
    LockTable::open(&path, StoreOptions::default()).unwrap();

    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|i| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let locks = LockTable::open(&path, StoreOptions::default()).unwrap();
                barrier.wait();
                locks.checkout("part1.mcam", &format!("user{}", i), "race")
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(PartlockError::AlreadyHeld { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, contenders - 1);
}

#[test]
fn test_concurrent_acquire_in_replace_mode() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("locks.json");
    let options = StoreOptions {
        write_mode: WriteMode::Replace,
        ..StoreOptions::default()
    };
    LockTable::open(&path, options).unwrap();

    let contenders = 6;
    let barrier = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|i| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let locks = LockTable::open(&path, options).unwrap();
                barrier.wait();
                locks.checkout("part1.mcam", &format!("user{}", i), "race")
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_registries_on_different_files_do_not_block() {
    let temp_dir = TempDir::new().unwrap();
    let options = StoreOptions {
        wait: LockWait::Timeout(std::time::Duration::ZERO),
        ..StoreOptions::default()
    };
    let a = LockTable::open(temp_dir.path().join("a.json"), options).unwrap();
    let b = LockTable::open(temp_dir.path().join("b.json"), options).unwrap();

    let _held = ExclusiveFile::acquire(a.path(), AccessMode::ReadWrite, LockWait::Blocking).unwrap();

    b.checkout("part1.mcam", "bob", "").unwrap();
    assert!(matches!(
        a.checkout("part1.mcam", "alice", ""),
        Err(PartlockError::LockTimeout { .. })
    ));
}

#[test]
fn test_stale_entries() {
    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir);

    let old = LockRecord {
        owner: "alice".to_string(),
        acquired_at: Utc::now() - Duration::minutes(200),
        annotation: "forgotten".to_string(),
    };
    locks.acquire("old.mcam", old).unwrap();
    locks.checkout("new.mcam", "bob", "").unwrap();

    let stale = locks.stale_entries(120).unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].0, "old.mcam");
    assert_eq!(locks.entries().unwrap().len(), 2);
}

#[test]
fn test_transitions_are_audited() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(AuditLog::new(
        temp_dir.path().join("audit.ndjson"),
        LockWait::Blocking,
    ));
    let locks = open_table(&temp_dir).with_audit(log.clone());

    locks.checkout("a.mcam", "alice", "editing").unwrap();
    locks.checkin("a.mcam", "alice").unwrap();
    locks.checkout("b.mcam", "alice", "").unwrap();
    locks.release("b.mcam", "admin", Authority::Admin).unwrap();
    locks.checkout("c.mcam", "alice", "").unwrap();
    locks.force_release("c.mcam").unwrap();

    let actions: Vec<_> = log.read_all().unwrap().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Checkout,
            AuditAction::Checkin,
            AuditAction::Checkout,
            AuditAction::AdminCheckin,
            AuditAction::Checkout,
            AuditAction::ForceRelease,
        ]
    );

    let events = log.read_all().unwrap();
    assert_eq!(events[0].key.as_deref(), Some("a.mcam"));
    assert_eq!(events[0].details["message"], "editing");
    assert_eq!(events[3].actor, "admin");
    assert_eq!(events[3].details["user"], "alice");
}

#[test]
fn test_refused_transitions_are_not_audited() {
    let temp_dir = TempDir::new().unwrap();
    let log = Arc::new(AuditLog::new(
        temp_dir.path().join("audit.ndjson"),
        LockWait::Blocking,
    ));
    let locks = open_table(&temp_dir).with_audit(log.clone());

    locks.checkout("a.mcam", "alice", "").unwrap();
    let _ = locks.checkout("a.mcam", "bob", "");
    let _ = locks.checkin("a.mcam", "bob");
    let _ = locks.force_release("missing.mcam");

    assert_eq!(log.read_all().unwrap().len(), 1);
}

#[test]
fn test_audit_failure_does_not_undo_transition() {
    struct FailingSink;
    impl AuditSink for FailingSink {
        fn record(&self, _event: &AuditEvent) -> Result<()> {
            Err(PartlockError::InvalidInput("sink offline".to_string()))
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let locks = open_table(&temp_dir).with_audit(Arc::new(FailingSink));

    locks.checkout("a.mcam", "alice", "").unwrap();
    assert!(locks.is_held("a.mcam").unwrap());
}

/// A user-table style payload: the registry only needs an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    username: String,
    role: String,
}

impl OwnedEntry for Session {
    fn owner(&self) -> &str {
        &self.username
    }
}

#[test]
fn test_registry_is_generic_over_payload() {
    let temp_dir = TempDir::new().unwrap();
    let sessions: OwnedRegistry<Session> = OwnedRegistry::open(
        temp_dir.path().join("sessions.json"),
        StoreOptions::default(),
    )
    .unwrap();

    let session = Session {
        username: "alice".to_string(),
        role: "admin".to_string(),
    };
    sessions.acquire("workstation-7", session.clone()).unwrap();

    assert_eq!(sessions.get("workstation-7").unwrap(), Some(session));
    assert!(matches!(
        sessions.release("workstation-7", "bob", Authority::Owner),
        Err(PartlockError::NotOwner { .. })
    ));
    sessions
        .release("workstation-7", "alice", Authority::Owner)
        .unwrap();
    assert!(sessions.entries().unwrap().is_empty());
}

#[test]
fn test_owner_with_edge_whitespace_can_release() {
    let temp_dir = TempDir::new().unwrap();
    let sessions: OwnedRegistry<Session> = OwnedRegistry::open(
        temp_dir.path().join("sessions.json"),
        StoreOptions::default(),
    )
    .unwrap();
    let session = Session {
        username: "alice ".to_string(),
        role: "engineer".to_string(),
    };

    sessions.acquire("token-1", session.clone()).unwrap();

    assert!(matches!(
        sessions.release("token-1", "alice", Authority::Owner),
        Err(PartlockError::NotOwner { .. })
    ));
    let removed = sessions
        .release("token-1", "alice ", Authority::Owner)
        .unwrap();
    assert_eq!(removed, session);
}
