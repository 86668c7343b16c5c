//! Integration tests for the scrape pipeline.
//!
//! These tests use mockito to simulate PBS API responses.

use mockito::{Matcher, Server};
use pbs_metrics_exporter::{
    client::PbsClient,
    collector::{self, run_scrape},
    config::Settings,
    error::ExporterError,
    metrics,
};
use std::time::Duration;

/// Helper to create test settings pointing at the mock server.
fn test_settings(server_url: &str) -> Settings {
    Settings {
        endpoint: server_url.to_string(),
        username: "test@pam".to_string(),
        api_token: "test-secret".to_string(),
        api_token_name: "exporter".to_string(),
        timeout: Duration::from_secs(5),
        insecure: false,
        metrics_path: "/metrics".to_string(),
        listen_address: "127.0.0.1:0".to_string(),
        log_level: "info".to_string(),
        log_auth_header: false,
    }
}

const NODE_STATUS_BODY: &str = r#"{
    "data": {
        "cpu": 0.25,
        "wait": 0.01,
        "memory": {"free": 8589934592, "total": 17179869184, "used": 8589934592},
        "swap": {"free": 4294967296, "total": 4294967296, "used": 0},
        "root": {"avail": 53687091200, "total": 107374182400, "used": 53687091200},
        "uptime": 86400
    }
}"#;

#[tokio::test]
async fn test_datastore_usage_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api2/json/status/datastore-usage")
        .match_header(
            "Authorization",
            "PBSAPIToken=test@pam!exporter:test-secret",
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "data": [
                {"store": "tank", "total": 1099511627776, "used": 549755813888, "avail": 549755813888},
                {"store": "vault", "total": 2199023255552, "used": 1099511627776, "avail": 1099511627776}
            ]
        }"#,
        )
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let datastores = client.get_datastore_usage().await.unwrap();

    assert_eq!(datastores.len(), 2);
    assert_eq!(datastores[0].store, "tank");
    assert_eq!(datastores[0].total, 1099511627776);
    assert_eq!(datastores[0].used, 549755813888);
    assert_eq!(datastores[1].store, "vault");
    assert_eq!(datastores[1].avail, 1099511627776);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_namespace_listing_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api2/json/admin/datastore/tank/namespace")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"ns": ""}, {"ns": "prod"}, {"ns": "staging"}]}"#)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let namespaces = client.get_namespaces("tank").await.unwrap();

    assert_eq!(namespaces.len(), 3);
    assert_eq!(namespaces[0].ns, "");
    assert_eq!(namespaces[1].ns, "prod");
    assert_eq!(namespaces[2].ns, "staging");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_node_status_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api2/json/nodes/localhost/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(NODE_STATUS_BODY)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let status = client.get_node_status().await.unwrap();

    assert_eq!(status.cpu, 0.25);
    assert_eq!(status.wait, 0.01);
    assert_eq!(status.memory.total, 17179869184);
    assert_eq!(status.swap.used, 0);
    assert_eq!(status.root.avail, 53687091200);
    assert_eq!(status.uptime, 86400);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_snapshot_grouping_by_backup_source() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api2/json/admin/datastore/tank/snapshots")
        .match_query(Matcher::UrlEncoded("ns".into(), "prod".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data": [{"backup-id": "100"}, {"backup-id": "100"}, {"backup-id": "101"}]}"#,
        )
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let report = collector::collect_namespace(&client, "tank", "prod")
        .await
        .unwrap();

    assert_eq!(report.namespace, "prod");
    assert_eq!(report.snapshot_count, 3);
    assert_eq!(report.source_counts.len(), 2);
    assert_eq!(report.source_counts["100"], 2);
    assert_eq!(report.source_counts["101"], 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_root_namespace_lists_without_filter() {
    let mut server = Server::new_async().await;

    // The root namespace must request the unfiltered snapshot listing.
    let mock = server
        .mock("GET", "/api2/json/admin/datastore/tank/snapshots")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"backup-id": "100"}, {"backup-id": "200"}]}"#)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let report = collector::collect_namespace(&client, "tank", "")
        .await
        .unwrap();

    assert_eq!(report.namespace, "");
    assert_eq!(report.snapshot_count, 2);
    assert_eq!(report.source_counts.len(), 2);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_namespace_with_no_snapshots() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/api2/json/admin/datastore/tank/snapshots")
        .match_query(Matcher::UrlEncoded("ns".into(), "empty".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let report = collector::collect_namespace(&client, "tank", "empty")
        .await
        .unwrap();

    assert_eq!(report.snapshot_count, 0);
    assert!(report.source_counts.is_empty());
}

#[tokio::test]
async fn test_non_200_maps_to_status_error() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api2/json/status/datastore-usage")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let err = client.get_datastore_usage().await.unwrap_err();

    assert!(matches!(err, ExporterError::Status { code: 500, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body_maps_to_decode_error() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/api2/json/nodes/localhost/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": "not a node status"}"#)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let err = client.get_node_status().await.unwrap_err();

    assert!(matches!(err, ExporterError::Decode { .. }));
}

#[tokio::test]
async fn test_unreachable_endpoint_maps_to_transport_error() {
    // Nothing listens on port 1.
    let client = PbsClient::new(&test_settings("http://127.0.0.1:1")).unwrap();
    let err = client.get_datastore_usage().await.unwrap_err();

    assert!(matches!(err, ExporterError::Transport(_)));
}

#[tokio::test]
async fn test_scrape_success_end_to_end() {
    let mut server = Server::new_async().await;

    let _mock_usage = server
        .mock("GET", "/api2/json/status/datastore-usage")
        .with_status(200)
        .with_body(r#"{"data": [{"store": "tank", "total": 1000, "used": 400, "avail": 600}]}"#)
        .create_async()
        .await;

    let _mock_namespaces = server
        .mock("GET", "/api2/json/admin/datastore/tank/namespace")
        .with_status(200)
        .with_body(r#"{"data": [{"ns": ""}, {"ns": "prod"}]}"#)
        .create_async()
        .await;

    let mock_snapshots = server
        .mock("GET", "/api2/json/admin/datastore/tank/snapshots")
        .match_query(Matcher::UrlEncoded("ns".into(), "prod".into()))
        .with_status(200)
        .with_body(
            r#"{"data": [{"backup-id": "100"}, {"backup-id": "100"}, {"backup-id": "101"}]}"#,
        )
        .create_async()
        .await;

    // The root namespace entry must not trigger an unfiltered listing.
    let mock_root_snapshots = server
        .mock("GET", "/api2/json/admin/datastore/tank/snapshots")
        .match_query(Matcher::Missing)
        .expect(0)
        .create_async()
        .await;

    let _mock_node = server
        .mock("GET", "/api2/json/nodes/localhost/status")
        .with_status(200)
        .with_body(NODE_STATUS_BODY)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let scrape = run_scrape(&client).await.unwrap();

    assert_eq!(scrape.datastores.len(), 1);
    let report = &scrape.datastores[0];
    assert_eq!(report.usage.store, "tank");
    assert_eq!(report.namespaces.len(), 1);
    assert_eq!(report.namespaces[0].namespace, "prod");
    assert_eq!(report.namespaces[0].snapshot_count, 3);
    assert_eq!(report.namespaces[0].source_counts["100"], 2);
    assert_eq!(report.namespaces[0].source_counts["101"], 1);
    assert_eq!(scrape.host.uptime, 86400);

    mock_snapshots.assert_async().await;
    mock_root_snapshots.assert_async().await;

    let output = metrics::encode_scrape(Some(&scrape)).unwrap();
    assert!(output.contains("pbs_up 1"));
    assert!(output.contains("pbs_available 600"));
    assert!(output.contains(r#"pbs_snapshot_count{namespace="prod"} 3"#));
    assert!(output.contains(r#"vm_id="100"} 2"#));
    assert!(output.contains("pbs_host_cpu_usage 0.25"));
}

#[tokio::test]
async fn test_scrape_short_circuits_on_usage_failure() {
    let mut server = Server::new_async().await;

    let mock_usage = server
        .mock("GET", "/api2/json/status/datastore-usage")
        .with_status(500)
        .create_async()
        .await;

    // Nothing after the failed stage may be attempted.
    let mock_namespaces = server
        .mock("GET", "/api2/json/admin/datastore/tank/namespace")
        .expect(0)
        .create_async()
        .await;
    let mock_node = server
        .mock("GET", "/api2/json/nodes/localhost/status")
        .expect(0)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let result = run_scrape(&client).await;

    assert!(result.is_err());
    mock_usage.assert_async().await;
    mock_namespaces.assert_async().await;
    mock_node.assert_async().await;
}

#[tokio::test]
async fn test_scrape_aborts_on_namespace_listing_failure() {
    let mut server = Server::new_async().await;

    let _mock_usage = server
        .mock("GET", "/api2/json/status/datastore-usage")
        .with_status(200)
        .with_body(r#"{"data": [{"store": "tank", "total": 1000, "used": 400, "avail": 600}]}"#)
        .create_async()
        .await;

    let _mock_namespaces = server
        .mock("GET", "/api2/json/admin/datastore/tank/namespace")
        .with_status(403)
        .with_body(r#"{"error": "forbidden"}"#)
        .create_async()
        .await;

    // Host status comes after the datastore stages and must not be fetched.
    let mock_node = server
        .mock("GET", "/api2/json/nodes/localhost/status")
        .expect(0)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let result = run_scrape(&client).await;

    assert!(matches!(
        result.unwrap_err(),
        ExporterError::Status { code: 403, .. }
    ));
    mock_node.assert_async().await;
}

#[tokio::test]
async fn test_failed_scrape_encodes_only_up() {
    let mut server = Server::new_async().await;

    let _mock_usage = server
        .mock("GET", "/api2/json/status/datastore-usage")
        .with_status(500)
        .create_async()
        .await;

    let client = PbsClient::new(&test_settings(&server.url())).unwrap();
    let outcome = run_scrape(&client).await;
    assert!(outcome.is_err());

    let output = metrics::encode_scrape(outcome.as_ref().ok()).unwrap();
    assert!(output.contains("pbs_up 0"));
    assert!(!output.contains("pbs_available"));
    assert!(!output.contains("pbs_snapshot_count"));
    assert!(!output.contains("pbs_host_cpu_usage"));
}
