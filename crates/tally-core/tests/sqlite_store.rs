//! SQLite record store and notifier round trips on a real workspace file.

use chrono::{TimeZone, Utc};
use tally_core::clock::FixedClock;
use tally_core::config::WorkspacePaths;
use tally_core::db;
use tally_core::model::{
    Approval, ApprovalKind, Initiative, InitiativeFields, InitiativeId, KeyActivity, Proposal,
    Status, User, UserId,
};
use tally_core::notify::{Inbox, SqliteNotifier};
use tally_core::store::{RecordStore, SqliteStore};
use tally_core::Engine;

fn initiative(id: &str, name: &str) -> Initiative {
    let fields = InitiativeFields::from_proposal(
        Proposal::new(name, "dina", "sgn").with_activity(KeyActivity::new("A", 100, 40)),
        Status::OnGoing,
    );
    Initiative::new(InitiativeId::new(id), UserId::new("dina"), fields)
}

#[test]
fn list_follows_insertion_order_and_upsert_keeps_position() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SqliteStore::open(&WorkspacePaths::new(dir.path()).db()).expect("open");

    for (id, name) in [("in-c", "third?"), ("in-a", "first?"), ("in-b", "second?")] {
        store.put(&initiative(id, name)).expect("put");
    }
    let renamed = {
        let mut record = initiative("in-c", "renamed");
        record = record.with_approval(Approval::PendingCreate);
        record
    };
    store.put(&renamed).expect("upsert");

    let ids: Vec<String> = store
        .list()
        .expect("list")
        .iter()
        .map(|i| i.id().to_string())
        .collect();
    assert_eq!(ids, ["in-c", "in-a", "in-b"]);
    assert_eq!(store.count().expect("count"), 3);

    let fetched = store.get(&InitiativeId::new("in-c")).expect("get").expect("present");
    assert_eq!(fetched.fields().name, "renamed");
    assert_eq!(fetched.approval_kind(), ApprovalKind::PendingCreate);
}

#[test]
fn delete_missing_id_is_not_an_error() {
    let mut store = SqliteStore::in_memory().expect("open");
    store.put(&initiative("in-a", "a")).expect("put");
    store.delete(&InitiativeId::new("in-zzz")).expect("delete missing");
    store.delete(&InitiativeId::new("in-a")).expect("delete");
    assert!(store.list().expect("list").is_empty());
    assert!(!store.contains(&InitiativeId::new("in-a")).expect("contains"));
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = WorkspacePaths::new(dir.path()).db();
    let original = initiative("in-a", "persisted").with_approval(Approval::PendingDelete {
        requested_by: UserId::new("dina"),
        requested_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
    });
    {
        let mut store = SqliteStore::open(&path).expect("open");
        store.put(&original).expect("put");
    }
    let reopened = SqliteStore::open(&path).expect("reopen");
    let loaded = reopened
        .get(&InitiativeId::new("in-a"))
        .expect("get")
        .expect("present");
    assert_eq!(loaded, original);
}

#[test]
fn legacy_documents_load_as_approved_with_owner_as_creator() {
    let store = SqliteStore::in_memory().expect("open");
    let legacy = r#"{
        "id": "in-legacy",
        "name": "Warehouse revamp",
        "owner": "budi",
        "entity": "lpp",
        "status": "on_going",
        "progress": 30
    }"#;
    store
        .connection()
        .execute(
            "INSERT INTO initiatives (id, seq, entity, created_by, approval, revision, document)
             VALUES ('in-legacy', 1, 'lpp', 'budi', 'approved', 0, ?1)",
            [legacy],
        )
        .expect("insert legacy row");

    let loaded = store
        .get(&InitiativeId::new("in-legacy"))
        .expect("get")
        .expect("present");
    assert_eq!(loaded.approval_kind(), ApprovalKind::Approved);
    assert_eq!(loaded.created_by().as_str(), "budi");
    assert_eq!(loaded.progress(), 30);
    assert_eq!(loaded.revision(), 0);
}

#[test]
fn engine_over_sqlite_store_and_notifier() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = WorkspacePaths::new(dir.path());
    let store = SqliteStore::open(&paths.db()).expect("store");
    let notifier = SqliteNotifier::open(&paths.db(), 10).expect("notifier");
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    let mut engine = Engine::new(store, notifier, clock);

    let dina = User::member("dina", "sgn");
    let admin = User::admin("root");
    let outcome = engine
        .submit_create(&dina, Proposal::new("Digital HR", "dina", "sgn"))
        .expect("create");
    let id = outcome.initiative.expect("visible").id().clone();
    engine.approve(&admin, &id, None).expect("approve");

    let inbox = engine.inbox(&dina).expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].message.contains("has been approved by root"));
    assert!(engine.mark_read(&dina, inbox[0].id).expect("mark"));
    assert_eq!(engine.unread_count(&dina).expect("unread"), 0);
    assert_eq!(engine.unread_count(&admin).expect("unread"), 1);

    // a second connection sees what the first committed
    let conn = db::open_db(&paths.db()).expect("reopen");
    let notifier = SqliteNotifier::from_connection(conn, 10);
    assert_eq!(notifier.inbox(&admin).expect("inbox").len(), 1);
}
