/// Integration tests with a mocked REST backend
/// Drives the real `Session` through the prober and reporter without hitting a hosted store
use serde_json::json;
use std::time::Duration;
use table_probe::errors::ErrorKind;
use table_probe::models::{ProbeStrategy, TableName};
use table_probe::prober::{ProberOptions, TableProber};
use table_probe::reporter::{render_text, BatchReporter};
use table_probe::session::Session;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-service-key";

/// Helper function to open a session against the mock server
fn session(server: &MockServer) -> Session {
    Session::connect(&server.uri(), KEY, Duration::from_secs(5)).unwrap()
}

fn table(name: &str) -> TableName {
    TableName::new(name).unwrap()
}

async fn mount_sample(server: &MockServer, table: &str, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("limit", "3"))
        .and(header("apikey", KEY))
        .and(header("Authorization", format!("Bearer {}", KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

async fn mount_count(server: &MockServer, table: &str, total: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("limit", "0"))
        .and(header("Prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", format!("*/{}", total).as_str())
                .set_body_json(json!([])),
        )
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, table: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "PGRST205",
            "details": null,
            "hint": null,
            "message": format!("Could not find the table 'public.{}' in the schema cache", table)
        })))
        .mount(server)
        .await;
}

async fn mount_insert(server: &MockServer, table: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(header("Prefer", "return=representation"))
        .and(body_json(json!({"__table_probe_sentinel__": true})))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_teams_and_ghost_table_scenario() {
    let server = MockServer::start().await;
    mount_sample(
        &server,
        "teams",
        json!([
            {"id": 1, "name": "Celtics"},
            {"id": 2, "name": "Lakers"},
            {"id": 3, "name": "Knicks"}
        ]),
    )
    .await;
    mount_count(&server, "teams", 3).await;
    mount_missing(&server, "ghost_table").await;

    let session = session(&server);
    let reporter = BatchReporter::new(TableProber::new(&session, ProberOptions::default()));
    let report = reporter.run(&[table("teams"), table("ghost_table")]).await;

    let names: Vec<_> = report.tables().map(|t| t.as_str()).collect();
    assert_eq!(names, vec!["teams", "ghost_table"]);

    let teams = report.get("teams").unwrap();
    assert!(teams.table_exists);
    assert_eq!(teams.row_count, Some(3));
    let columns: Vec<_> = teams.columns.clone().unwrap().into_iter().collect();
    assert_eq!(columns, vec!["id", "name"]);
    assert_eq!(teams.strategy_used, Some(ProbeStrategy::SampleSelect));
    assert!(teams.errors.is_empty());

    let ghost = report.get("ghost_table").unwrap();
    assert!(!ghost.table_exists);
    assert!(ghost.columns.is_none());
    assert!(ghost.row_count.is_none());
    assert!(ghost.strategy_used.is_none());
    assert_eq!(ghost.errors[0].kind, ErrorKind::NotFound);
    assert!(ghost.errors.iter().all(|e| e.kind == ErrorKind::NotFound));

    let text = render_text(&report, false);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("teams") && lines[0].ends_with("rows=3"));
    assert!(lines[1].starts_with("ghost_table") && lines[1].contains("ERROR: Not found"));
}

#[tokio::test]
async fn test_empty_table_columns_from_rejection() {
    let server = MockServer::start().await;
    mount_sample(&server, "seasons", json!([])).await;
    mount_count(&server, "seasons", 0).await;
    mount_insert(
        &server,
        "seasons",
        ResponseTemplate::new(400).set_body_json(json!({
            "code": "23502",
            "details": "Failing row contains (null, null).",
            "hint": null,
            "message": "null value in column \"year\" of relation \"seasons\" violates not-null constraint"
        })),
    )
    .await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("seasons"))
        .await;

    assert!(result.table_exists);
    assert_eq!(result.row_count, Some(0));
    assert_eq!(result.sample_rows, Some(Vec::new()));
    assert_eq!(result.strategy_used, Some(ProbeStrategy::InsertProbe));
    assert!(result.columns.unwrap().contains("year"));
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_empty_table_unstructured_rejection() {
    let server = MockServer::start().await;
    mount_sample(&server, "seasons", json!([])).await;
    mount_count(&server, "seasons", 0).await;
    mount_insert(
        &server,
        "seasons",
        ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"),
    )
    .await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("seasons"))
        .await;

    assert!(result.table_exists);
    assert!(result.columns.is_none());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].strategy, ProbeStrategy::InsertProbe);
    assert_eq!(result.errors[0].kind, ErrorKind::Malformed);
}

#[tokio::test]
async fn test_unexpected_insert_is_deleted() {
    let server = MockServer::start().await;
    mount_sample(&server, "scratch", json!([])).await;
    mount_count(&server, "scratch", 0).await;
    mount_insert(
        &server,
        "scratch",
        ResponseTemplate::new(201).set_body_json(json!([
            {"id": 41, "__table_probe_sentinel__": true, "note": null}
        ])),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scratch"))
        .and(query_param("id", "eq.41"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("scratch"))
        .await;

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::Unknown);
    assert!(result.errors[0].message.contains("unexpectedly succeeded"));
    assert_eq!(result.strategy_used, Some(ProbeStrategy::InsertProbe));
    assert!(result.columns.unwrap().contains("note"));
}

#[tokio::test]
async fn test_permission_denied_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "42501",
            "message": "permission denied for table profiles"
        })))
        .mount(&server)
        .await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("profiles"))
        .await;

    assert!(!result.table_exists);
    assert_eq!(result.errors.len(), 2);
    assert!(result
        .errors
        .iter()
        .all(|e| e.kind == ErrorKind::PermissionDenied));
}

#[tokio::test]
async fn test_count_without_content_range_is_malformed() {
    let server = MockServer::start().await;
    mount_sample(&server, "games", json!([{"id": 1, "home": "BOS", "away": "LAL"}])).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/games"))
        .and(query_param("limit", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("games"))
        .await;

    assert!(result.table_exists);
    assert!(result.row_count.is_none());
    assert_eq!(result.strategy_used, Some(ProbeStrategy::SampleSelect));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].strategy, ProbeStrategy::CountOnly);
    assert_eq!(result.errors[0].kind, ErrorKind::Malformed);
}

#[tokio::test]
async fn test_undecodable_sample_names_the_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/players"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;
    mount_count(&server, "players", 7).await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("players"))
        .await;

    assert!(result.table_exists);
    assert_eq!(result.row_count, Some(7));
    assert!(result.sample_rows.is_none());
    assert_eq!(result.strategy_used, Some(ProbeStrategy::CountOnly));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].strategy, ProbeStrategy::SampleSelect);
    assert_eq!(result.errors[0].kind, ErrorKind::Malformed);
    assert!(result.errors[0]
        .message
        .starts_with("decoding sample of players: Malformed response:"));
}

#[tokio::test]
async fn test_timeout_is_recorded_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    mount_sample(&server, "teams", json!([{"id": 1}])).await;
    mount_count(&server, "teams", 1).await;

    let session = Session::connect(&server.uri(), KEY, Duration::from_millis(200)).unwrap();
    let reporter = BatchReporter::new(TableProber::new(&session, ProberOptions::default()));
    let report = reporter.run(&[table("slow"), table("teams")]).await;

    let slow = report.get("slow").unwrap();
    assert!(!slow.table_exists);
    assert!(slow.errors.iter().all(|e| e.kind == ErrorKind::Unknown));
    assert!(slow.errors[0].message.contains("timed out"));

    assert_eq!(report.get("teams").unwrap().row_count, Some(1));
}

#[tokio::test]
async fn test_probe_is_idempotent() {
    let server = MockServer::start().await;
    mount_sample(&server, "teams", json!([{"id": 1, "name": "Celtics"}])).await;
    mount_count(&server, "teams", 1).await;
    mount_missing(&server, "ghost_table").await;

    let session = session(&server);
    let prober = TableProber::new(&session, ProberOptions::default());
    for name in ["teams", "ghost_table"] {
        let first = prober.probe(&table(name)).await;
        let second = prober.probe(&table(name)).await;
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_concurrent_batch_keeps_order() {
    let server = MockServer::start().await;
    let names = ["teams", "games", "players", "profiles", "ghost_table"];
    for name in &names[..4] {
        mount_sample(&server, name, json!([{"id": 1}])).await;
        mount_count(&server, name, 1).await;
    }
    mount_missing(&server, "ghost_table").await;

    let session = session(&server);
    let tables: Vec<_> = names.iter().map(|n| table(n)).collect();
    let report = BatchReporter::new(TableProber::new(&session, ProberOptions::default()))
        .with_concurrency(4)
        .run(&tables)
        .await;

    let got: Vec<_> = report.tables().map(|t| t.as_str()).collect();
    assert_eq!(got, names.to_vec());
    assert_eq!(report.tables_with_errors(), 1);
}

#[tokio::test]
async fn test_no_insert_into_populated_table_after_failed_sample() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/games"))
        .and(query_param("limit", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1}]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    mount_count(&server, "games", 12).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/games"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&server)
        .await;

    let session = Session::connect(&server.uri(), KEY, Duration::from_millis(300)).unwrap();
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("games"))
        .await;

    assert!(result.table_exists);
    assert_eq!(result.row_count, Some(12));
    assert!(result.columns.is_none());
    assert_eq!(result.strategy_used, Some(ProbeStrategy::CountOnly));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].strategy, ProbeStrategy::SampleSelect);
}

#[tokio::test]
async fn test_unexpected_insert_without_echo_is_flagged() {
    let server = MockServer::start().await;
    mount_sample(&server, "scratch", json!([])).await;
    mount_count(&server, "scratch", 0).await;
    mount_insert(&server, "scratch", ResponseTemplate::new(201)).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let session = session(&server);
    let result = TableProber::new(&session, ProberOptions::default())
        .probe(&table("scratch"))
        .await;

    assert!(result.columns.is_none());
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.kind == ErrorKind::Unknown));
    assert!(result.errors[1].message.contains("removed manually"));
}
