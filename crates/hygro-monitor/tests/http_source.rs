use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{TimeZone, Utc};
use hygro_core::{HygroError, RecordSchema};
use hygro_monitor::{HttpLatestRecord, HttpSourceConfig, LatestRecordSource};
use std::net::SocketAddr;

async fn spawn_server(app: Router) -> SocketAddr {
    let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
        .serve(app.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

fn source(addr: SocketAddr, path: &str) -> HttpLatestRecord {
    let mut config = HttpSourceConfig::new(format!("http://{}{}", addr, path));
    config.timeout_secs = 5;
    HttpLatestRecord::new(config, RecordSchema::default()).unwrap()
}

#[tokio::test]
async fn test_fetches_latest_snapshot() {
    let app = Router::new().route(
        "/data.json",
        get(|| async {
            r#"{"timestamp": "2021-03-01 12:00:00", "location": "attic", "temperature": 17.25, "humidity": 61.0}"#
        }),
    );
    let addr = spawn_server(app).await;

    let record = source(addr, "/data.json").fetch_latest().await.unwrap();

    assert_eq!(
        record.timestamp,
        Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap()
    );
    assert_eq!(record.tags.get("location").map(String::as_str), Some("attic"));
}

#[tokio::test]
async fn test_null_fields_do_not_block_freshness_check() {
    let app = Router::new().route(
        "/data.json",
        get(|| async { r#"{"timestamp": "2021-03-01 12:00:00", "temperature": null, "humidity": null}"# }),
    );
    let addr = spawn_server(app).await;

    let record = source(addr, "/data.json").fetch_latest().await.unwrap();
    assert_eq!(record.field("temperature"), None);
}

#[tokio::test]
async fn test_server_error_is_source_unavailable() {
    let app = Router::new().route(
        "/data.json",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = spawn_server(app).await;

    let err = source(addr, "/data.json").fetch_latest().await.unwrap_err();
    assert!(matches!(err, HygroError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_missing_document_is_source_unavailable() {
    let addr = spawn_server(Router::new()).await;

    let err = source(addr, "/data.json").fetch_latest().await.unwrap_err();
    assert!(matches!(err, HygroError::SourceUnavailable(_)));
}

#[tokio::test]
async fn test_bad_timestamp_is_parse_error() {
    let app = Router::new().route(
        "/data.json",
        get(|| async { r#"{"timestamp": "yesterday", "temperature": 20.0, "humidity": 50.0}"# }),
    );
    let addr = spawn_server(app).await;

    let err = source(addr, "/data.json").fetch_latest().await.unwrap_err();
    assert!(matches!(err, HygroError::Parse(_)));
}
