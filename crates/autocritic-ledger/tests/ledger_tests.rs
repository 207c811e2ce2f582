use std::fs;
use std::sync::Arc;
use std::thread;

use autocritic_critic::ActionCode;
use autocritic_ledger::{
    CritiqueRecord, LedgerStore, LlmCost, RecordFilter, RecordOutcome,
};
use tempfile::TempDir;

fn record(action: Option<ActionCode>, add_memory: bool, llm_use: u32) -> CritiqueRecord {
    CritiqueRecord {
        human_question: "``` Human Message ```\nscenario".to_string(),
        reflection: "#### Analysis of the mistake:\n...".to_string(),
        time_cost: 2.0,
        llm_use,
        llm_cost: LlmCost {
            prompt_token: 800,
            completion_tokens: 200,
            cost_usd: 0.036,
        },
        add_memory,
        reflection_action: action,
    }
}

/// Helper: a ledger document written the way older runs left it.
fn create_test_ledger() -> (TempDir, LedgerStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reflection.json");
    let document = r#"{
    "reflection_data": [
        {
            "human_question": "q1",
            "reflection": "r1",
            "time_cost": 3.0,
            "llm_use": 1,
            "llm_cost": {"prompt_token": 900, "completion_tokens": 300, "cost(USD)": 0.045},
            "add_memory": true,
            "reflection_action": 2
        },
        {
            "human_question": "q2",
            "reflection": "r2",
            "time_cost": 5.0,
            "llm_use": 3,
            "llm_cost": {"prompt_token": 1200, "completion_tokens": 310, "cost(USD)": 0.0546},
            "add_memory": false,
            "reflection_action": 8
        },
        {
            "human_question": "q3",
            "reflection": "r3",
            "time_cost": 7.0,
            "llm_use": 4,
            "llm_cost": {"prompt_token": 1500, "completion_tokens": 330, "cost(USD)": 0.0648},
            "add_memory": false,
            "reflection_action": null
        }
    ]
}"#;
    fs::write(&path, document).unwrap();
    (dir, LedgerStore::new(path))
}

// ============================================================
// Document tests
// ============================================================

#[test]
fn test_open_initializes_empty_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("reflection.json");

    let store = LedgerStore::open(&path).unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content, serde_json::json!({"reflection_data": []}));
    assert!(store.load().unwrap().reflection_data.is_empty());
}

#[test]
fn test_open_leaves_existing_document_alone() {
    let (_dir, store) = create_test_ledger();
    let reopened = LedgerStore::open(store.path()).unwrap();
    assert_eq!(reopened.load().unwrap().reflection_data.len(), 3);
}

#[test]
fn test_missing_file_loads_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = LedgerStore::new(dir.path().join("absent.json"));
    assert!(store.load().unwrap().reflection_data.is_empty());
}

#[test]
fn test_append_preserves_insertion_order() {
    let (_dir, store) = create_test_ledger();

    let count = store
        .append(&record(Some(ActionCode::TurnLeft), true, 1))
        .unwrap();
    assert_eq!(count, 4);

    let records = store.load().unwrap().reflection_data;
    let questions: Vec<&str> = records.iter().map(|r| r.human_question.as_str()).collect();
    assert_eq!(&questions[..3], &["q1", "q2", "q3"]);
    assert_eq!(records[3].reflection_action, Some(ActionCode::TurnLeft));
}

#[test]
fn test_append_writes_four_space_indented_json() {
    let dir = TempDir::new().unwrap();
    let store = LedgerStore::open(dir.path().join("reflection.json")).unwrap();
    store.append(&record(None, false, 4)).unwrap();

    let content = fs::read_to_string(store.path()).unwrap();
    assert!(content.starts_with("{\n    \"reflection_data\": ["));
    assert!(content.contains("\"cost(USD)\": 0.036"));
    assert!(content.contains("\"reflection_action\": null"));
}

#[test]
fn test_unknown_top_level_keys_survive_append() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reflection.json");
    fs::write(&path, r#"{"reflection_data": [], "note": "kept"}"#).unwrap();

    let store = LedgerStore::new(&path);
    store.append(&record(Some(ActionCode::Idle), true, 1)).unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content["note"], "kept");
    assert_eq!(content["reflection_data"].as_array().unwrap().len(), 1);
}

#[test]
fn test_malformed_document_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reflection.json");
    fs::write(&path, "{ not json").unwrap();

    let store = LedgerStore::new(&path);
    assert!(matches!(
        store.append(&record(None, false, 1)),
        Err(autocritic_ledger::LedgerError::Malformed(_))
    ));
    // nothing was overwritten
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_legacy_zero_action_reads_as_no_action() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reflection.json");
    let legacy = r#"{"reflection_data": [{
        "human_question": "q",
        "reflection": "r",
        "time_cost": 1.0,
        "llm_use": 4,
        "llm_cost": {"prompt_token": 0, "completion_tokens": 0, "cost(USD)": 0.0},
        "add_memory": false,
        "reflection_action": 0
    }]}"#;
    fs::write(&path, legacy).unwrap();

    let store = LedgerStore::new(&path);
    assert_eq!(store.append(&record(Some(ActionCode::Idle), true, 1)).unwrap(), 2);

    let records = store.load().unwrap().reflection_data;
    assert_eq!(records[0].reflection_action, None);
    assert_eq!(records[0].outcome(), RecordOutcome::Unrecoverable);
    assert_eq!(records[1].reflection_action, Some(ActionCode::Idle));
}

#[test]
fn test_concurrent_appends_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LedgerStore::open(dir.path().join("reflection.json")).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                let mut r = record(Some(ActionCode::Accelerate), true, 1);
                r.human_question = format!("q{}", i);
                store.append(&r).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = store.load().unwrap().reflection_data;
    assert_eq!(records.len(), 16);
    let mut questions: Vec<String> = records.into_iter().map(|r| r.human_question).collect();
    questions.sort();
    questions.dedup();
    assert_eq!(questions.len(), 16);
}

#[test]
fn test_separate_handles_on_one_file_serialize() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reflection.json");
    LedgerStore::open(&path).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let store = LedgerStore::new(path);
                store.append(&record(Some(ActionCode::Idle), false, 1)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(LedgerStore::new(&path).load().unwrap().reflection_data.len(), 8);
}

// ============================================================
// Query tests
// ============================================================

#[test]
fn test_list_filters_by_outcome() {
    let (_dir, store) = create_test_ledger();

    let changed = store
        .list(&RecordFilter {
            outcome: Some(RecordOutcome::Changed),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].human_question, "q1");

    let failed = store
        .list(&RecordFilter {
            outcome: Some(RecordOutcome::Unrecoverable),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reflection_action.is_none());

    let repaired = store
        .list(&RecordFilter {
            repaired_only: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(repaired.len(), 2);
}

#[test]
fn test_stats() {
    let (_dir, store) = create_test_ledger();
    let stats = store.stats().unwrap();

    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.changed, 1);
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.unrecoverable, 1);
    assert_eq!(stats.repaired, 2);
    assert_eq!(stats.total_calls, 8);
    assert_eq!(stats.prompt_tokens, 3600);
    assert_eq!(stats.completion_tokens, 940);
    assert!((stats.total_cost_usd - 0.1644).abs() < 1e-9);
    assert!((stats.avg_time_cost_secs - 5.0).abs() < 1e-9);
    assert_eq!(stats.by_action.len(), 2);
    // equal counts stay in code order
    assert_eq!(stats.by_action[0].action, ActionCode::Decelerate);
    assert_eq!(stats.by_action[1].action, ActionCode::Idle);
}

#[test]
fn test_stats_on_empty_ledger() {
    let dir = TempDir::new().unwrap();
    let store = LedgerStore::open(dir.path().join("reflection.json")).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_records, 0);
    assert!(stats.by_action.is_empty());
}
