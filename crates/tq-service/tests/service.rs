use std::fs;
use std::time::Duration;

use serde_json::json;
use tq_ops::Operation;
use tq_runtime::QueryOutcome;
use tq_service::{
    FixedOperationSource, MemoryOperationCache, MemorySessionStore, QueryService, ServiceConfig,
    ServiceError, Upload, read_query_log,
};

const TRANSACTIONS: &str = "\
id,region,amt
1,west,100
2,east,40
3,west,25.5
4,north,n/a
5,east,80
";

const PAYERS: &str = "\
payer_id,name
p1,Ann
";

fn source() -> FixedOperationSource {
    FixedOperationSource::new()
        .with(
            "sales by region",
            Operation::from_json(json!({"type": "pipeline", "steps": [
                {"type": "groupBy", "groupByField": "region", "aggregateField": "amt"},
                {"type": "sort", "sortField": "amt", "sortOrder": "desc"}
            ]})),
        )
        .with(
            "above average",
            Operation::from_json(
                json!({"type": "filter", "field": "amt", "operator": ">", "value": "average amt"}),
            ),
        )
        .with(
            "nothing huge",
            Operation::from_json(json!({"type": "filter", "field": "amt", "operator": ">", "value": 1000})),
        )
        .with("pivot", Operation::from_json(json!({"type": "pivot", "field": "amt"})))
}

fn uploads() -> Vec<Upload> {
    vec![
        Upload::new("transactions.csv", TRANSACTIONS),
        Upload::new("payers.csv", PAYERS),
    ]
}

fn service(root: &std::path::Path) -> QueryService {
    QueryService::new(ServiceConfig::with_root(root), source())
}

#[test]
fn first_query_runs_against_first_upload_and_exports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path());

    let response = service
        .handle_query("sales by region", &uploads())
        .expect("query should run");

    assert_eq!(response.tables, vec!["transactions", "payers"]);
    assert_eq!(response.outcome, QueryOutcome::Matched);
    assert_eq!(response.match_count, 3);
    assert_eq!(
        serde_json::to_value(&response.result).expect("serialize"),
        json!([
            {"region": "west", "amt": 125.5},
            {"region": "east", "amt": 120},
            {"region": "north", "amt": 0}
        ])
    );

    let export = response.csv_export.as_ref().expect("csv export");
    assert!(export.starts_with(dir.path().join("output")));
    assert_eq!(
        fs::read_to_string(export).expect("read export"),
        "region,amt\nwest,125.5\neast,120\nnorth,0\n"
    );
    let file_name = export
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert!(file_name.starts_with(&format!("result_{}_", response.session_id)));
    assert_eq!(response.download_url, Some(format!("/download/{file_name}")));

    let log = read_query_log(&dir.path().join("logs/query_logs.jsonl")).expect("read log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].session_id.as_deref(), Some(response.session_id.as_str()));
    assert_eq!(log[0].result_count, 3);
}

#[test]
fn follow_up_reuses_session_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path());
    let first = service
        .handle_query("sales by region", &uploads())
        .expect("first query");

    let follow_up = service
        .handle_follow_up(&first.session_id, "above average")
        .expect("follow up");
    assert_eq!(follow_up.session_id, first.session_id);
    // average of 100, 40, 25.5, 80 is 61.375
    let ids = follow_up
        .result
        .iter()
        .map(|record| record.value("id").to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1", "5"]);
}

#[test]
fn no_matches_and_uninterpretable_are_distinguished() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path());

    let none = service
        .handle_query("nothing huge", &uploads())
        .expect("query");
    assert_eq!(none.outcome, QueryOutcome::NoMatches);
    assert_eq!(none.csv_export, None);
    assert_eq!(none.download_url, None);

    let odd = service
        .handle_follow_up(&none.session_id, "pivot")
        .expect("follow up");
    assert_eq!(odd.outcome, QueryOutcome::Uninterpretable);
    assert!(odd.result.is_empty());
    assert_eq!(odd.diagnostics.len(), 1);
}

#[test]
fn missing_input_and_unknown_sessions_are_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path());

    assert!(matches!(
        service.handle_query("  ", &uploads()),
        Err(ServiceError::MissingInput)
    ));
    assert!(matches!(
        service.handle_query("sales by region", &[]),
        Err(ServiceError::MissingInput)
    ));
    assert!(matches!(
        service.handle_follow_up("nope", "sales by region"),
        Err(ServiceError::SessionNotFound { .. })
    ));
    assert!(matches!(
        service.handle_query("unheard of", &uploads()),
        Err(ServiceError::NoInterpretation { .. })
    ));
    assert!(matches!(
        service.handle_query("sales by region", &[Upload::new("empty.csv", "")]),
        Err(ServiceError::InvalidUpload { .. })
    ));
}

#[test]
fn expired_sessions_are_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut service = service(dir.path()).with_sessions(MemorySessionStore::new(Duration::ZERO));
    let first = service
        .handle_query("sales by region", &uploads())
        .expect("first query");

    assert!(matches!(
        service.handle_follow_up(&first.session_id, "above average"),
        Err(ServiceError::SessionNotFound { .. })
    ));
}

#[test]
fn interpreted_operations_are_cached_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut service = service(dir.path());
        service
            .handle_query("sales by region", &uploads())
            .expect("query");
    }
    assert!(dir.path().join("cache/operation_cache.json").exists());

    // A source that knows nothing still answers from the cache file.
    let mut service = QueryService::new(
        ServiceConfig::with_root(dir.path()),
        FixedOperationSource::new(),
    );
    let response = service
        .handle_query("sales by region", &uploads())
        .expect("cached query");
    assert_eq!(response.match_count, 3);

    let mut fresh = QueryService::new(
        ServiceConfig::with_root(dir.path()),
        FixedOperationSource::new(),
    )
    .with_cache(MemoryOperationCache::new());
    assert!(fresh.handle_query("sales by region", &uploads()).is_err());
}
