use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use trimstream_application::{
    ChunkDeleteClient, ChunkDeleteRequest, ChunkOutcome, PurgeCatalog, PurgeInvocation,
    PurgeService, PurgeStatus,
};
use trimstream_core::AppError;
use trimstream_domain::{ColumnValue, ComparisonOperator};

use super::{HttpClusterClient, classify_chunk_reply};

struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    body: String,
    delay: Duration,
}

fn route(method: &'static str, path: &'static str, status: u16, body: impl ToString) -> Route {
    Route {
        method,
        path,
        status,
        body: body.to_string(),
        delay: Duration::ZERO,
    }
}

fn slow_route(
    method: &'static str,
    path: &'static str,
    delay: Duration,
    body: impl ToString,
) -> Route {
    Route {
        delay,
        ..route(method, path, 200, body)
    }
}

/// Serves canned replies on an ephemeral port and returns its base URL.
async fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|_| unreachable!());
    let address = listener.local_addr().unwrap_or_else(|_| unreachable!());
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle_connection(socket, routes.clone()));
        }
    });

    format!("http://{address}/")
}

async fn handle_connection(mut socket: TcpStream, routes: Arc<Vec<Route>>) {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 4096];

    loop {
        let Ok(read) = socket.read(&mut buffer).await else {
            return;
        };
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buffer[..read]);
        if request_complete(&request) {
            break;
        }
    }

    let text = String::from_utf8_lossy(&request);
    let mut request_line = text.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default();
    let path = request_line.next().unwrap_or_default();

    let (status, body, delay) = routes
        .iter()
        .find(|route| route.method == method && route.path == path)
        .map_or((404, String::new(), Duration::ZERO), |route| {
            (route.status, route.body.clone(), route.delay)
        });
    tokio::time::sleep(delay).await;
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown");

    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn request_complete(request: &[u8]) -> bool {
    let Some(header_end) = request.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    request.len() >= header_end + 4 + content_length
}

fn chunk_request(table_name: &str) -> ChunkDeleteRequest {
    ChunkDeleteRequest {
        table_name: table_name.to_owned(),
        column_name: "age".to_owned(),
        operator: ComparisonOperator::GreaterThan,
        value: ColumnValue::Integer(30),
        chunk_size: 100,
        stream_name: "archive".to_owned(),
    }
}

fn events_table_body(distribution: serde_json::Value) -> serde_json::Value {
    json!({
        "name": "events",
        "columns": [
            { "name": "id", "column_type": "big_int" },
            { "name": "age", "column_type": "integer" }
        ],
        "distribution": distribution
    })
}

#[test]
fn successful_reply_becomes_success_outcome() {
    let outcome = classify_chunk_reply(
        StatusCode::OK,
        r#"{"rows_exported": 100, "rows_remaining": 400}"#,
    );
    assert_eq!(
        outcome,
        ChunkOutcome::Success {
            rows_exported: 100,
            rows_remaining: 400,
        }
    );
}

#[test]
fn unavailable_reply_is_ambiguous() {
    let outcome = classify_chunk_reply(StatusCode::SERVICE_UNAVAILABLE, "");
    assert_eq!(outcome, ChunkOutcome::AmbiguousNodeFailure);
}

#[test]
fn error_reply_is_fatal_with_body() {
    let outcome = classify_chunk_reply(StatusCode::INTERNAL_SERVER_ERROR, "disk full\n");
    assert_eq!(
        outcome,
        ChunkOutcome::Fatal {
            message: "chunk delete failed with status 500 Internal Server Error: disk full"
                .to_owned(),
        }
    );
}

#[test]
fn malformed_success_reply_is_fatal() {
    let outcome = classify_chunk_reply(StatusCode::OK, "not json");
    assert!(matches!(outcome, ChunkOutcome::Fatal { .. }));
}

#[tokio::test]
async fn catalog_lookup_parses_table_definition() {
    let base_url = serve(vec![route(
        "GET",
        "/api/internal/catalog/tables/events",
        200,
        events_table_body(json!({ "type": "partitioned", "partition_column": "id" })),
    )])
    .await;
    let client = HttpClusterClient::new(reqwest::Client::new(), base_url);

    let table = client
        .find_table("events")
        .await
        .unwrap_or_else(|_| unreachable!());
    let table = table.unwrap_or_else(|| unreachable!());
    assert_eq!(table.name().as_str(), "events");
    assert_eq!(table.columns().len(), 2);
    assert!(!table.is_replicated());

    let missing = client.find_table("orders").await;
    assert!(missing.is_ok_and(|table| table.is_none()));
}

#[tokio::test]
async fn catalog_lookup_escapes_reserved_characters_in_table_name() {
    let base_url = serve(vec![
        route(
            "GET",
            "/api/internal/catalog/tables/odd%2Fname%3Fx%23y",
            200,
            events_table_body(json!({ "type": "replicated" })),
        ),
        route(
            "GET",
            "/api/internal/catalog/tables/odd/name",
            500,
            "wrong endpoint",
        ),
    ])
    .await;
    let client = HttpClusterClient::new(reqwest::Client::new(), base_url);

    let table = client
        .find_table("odd/name?x#y")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(table.is_some_and(|table| table.is_replicated()));
}

#[tokio::test]
async fn partition_fan_out_classifies_each_reply() {
    let base_url = serve(vec![
        route(
            "GET",
            "/api/internal/partitions",
            200,
            json!({ "partition_ids": [0, 1, 2] }),
        ),
        route(
            "POST",
            "/api/internal/partitions/0/purge/chunk",
            200,
            json!({ "rows_exported": 10, "rows_remaining": 5 }),
        ),
        route("POST", "/api/internal/partitions/1/purge/chunk", 503, ""),
        route(
            "POST",
            "/api/internal/partitions/2/purge/chunk",
            500,
            "disk full",
        ),
    ])
    .await;
    let client = HttpClusterClient::new(reqwest::Client::new(), base_url);

    let outcomes = client
        .delete_chunk_all_partitions(&chunk_request("events"))
        .await
        .unwrap_or_default();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[0].outcome,
        ChunkOutcome::Success {
            rows_exported: 10,
            rows_remaining: 5,
        }
    );
    assert_eq!(outcomes[1].outcome, ChunkOutcome::AmbiguousNodeFailure);
    assert!(matches!(
        &outcomes[2].outcome,
        ChunkOutcome::Fatal { message } if message.ends_with("disk full")
    ));
}

#[tokio::test]
async fn failed_partition_listing_is_a_transport_fault() {
    let base_url = serve(vec![route("GET", "/api/internal/partitions", 500, "")]).await;
    let client = HttpClusterClient::new(reqwest::Client::new(), base_url);

    let result = client
        .delete_chunk_all_partitions(&chunk_request("events"))
        .await;
    assert!(matches!(result, Err(AppError::Transport(_))));
}

#[tokio::test]
async fn unreachable_coordinator_is_a_transport_fault() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|_| unreachable!());
    let address = listener.local_addr().unwrap_or_else(|_| unreachable!());
    drop(listener);
    let client = HttpClusterClient::new(reqwest::Client::new(), format!("http://{address}"));

    let replicated = client.delete_chunk_replicated(&chunk_request("settings")).await;
    assert!(matches!(replicated, Err(AppError::Transport(_))));

    let catalog = client.find_table("settings").await;
    assert!(matches!(catalog, Err(AppError::Transport(_))));
}

#[tokio::test]
async fn purge_runs_against_http_coordinator() {
    let base_url = serve(vec![
        route(
            "GET",
            "/api/internal/catalog/tables/settings",
            200,
            events_table_body(json!({ "type": "replicated" })),
        ),
        route(
            "POST",
            "/api/internal/purge/chunk",
            200,
            json!({ "rows_exported": 42, "rows_remaining": 0 }),
        ),
    ])
    .await;
    let client = Arc::new(HttpClusterClient::new(reqwest::Client::new(), base_url));
    let service = PurgeService::new(client.clone(), client);

    let report = service
        .purge(PurgeInvocation {
            table_name: "settings".to_owned(),
            column_name: "age".to_owned(),
            value: "30".to_owned(),
            operator: ">".to_owned(),
            chunk_size: 100,
            timeout_ms: 5_000,
            max_rounds: 5,
            pacing_interval_seconds: 1,
            stream_name: "archive".to_owned(),
        })
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(report.status, PurgeStatus::Success);
    assert_eq!(report.rows_exported, 42);
    assert_eq!(report.rows_left, 0);
}

#[tokio::test]
async fn slow_partition_is_bounded_by_the_round_wait_ceiling() {
    let base_url = serve(vec![
        route(
            "GET",
            "/api/internal/catalog/tables/events",
            200,
            events_table_body(json!({ "type": "partitioned", "partition_column": "id" })),
        ),
        route(
            "GET",
            "/api/internal/partitions",
            200,
            json!({ "partition_ids": [0, 1] }),
        ),
        route(
            "POST",
            "/api/internal/partitions/0/purge/chunk",
            200,
            json!({ "rows_exported": 10, "rows_remaining": 0 }),
        ),
        slow_route(
            "POST",
            "/api/internal/partitions/1/purge/chunk",
            Duration::from_secs(30),
            json!({ "rows_exported": 10, "rows_remaining": 0 }),
        ),
    ])
    .await;
    let client = Arc::new(HttpClusterClient::new(reqwest::Client::new(), base_url));
    let service =
        PurgeService::new(client.clone(), client).with_round_wait_ceiling(Duration::from_millis(300));

    let report = service
        .purge(PurgeInvocation {
            table_name: "events".to_owned(),
            column_name: "age".to_owned(),
            value: "30".to_owned(),
            operator: ">".to_owned(),
            chunk_size: 100,
            timeout_ms: 5_000,
            max_rounds: 5,
            pacing_interval_seconds: 1,
            stream_name: "archive".to_owned(),
        })
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(report.status, PurgeStatus::GracefulFailure);
    assert_eq!(
        report.message,
        "round 1: no reply from chunk delete call within 300 ms"
    );
}
