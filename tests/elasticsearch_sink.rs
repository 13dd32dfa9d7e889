#![cfg(feature = "elasticsearch")]

use elastic_log_sink::config::TransportConfig;
use elastic_log_sink::document::transform;
use elastic_log_sink::elasticsearch::ElasticsearchSink;
use elastic_log_sink::record::{LogRecord, Severity};
use elastic_log_sink::sink::DocumentSink;
use elastic_log_sink::template::{merge_record, TemplateContext};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(url: String) -> TransportConfig {
    TransportConfig {
        url,
        username: "elastic".to_string(),
        password: "changeme".to_string(),
        index: "logs-a".to_string(),
    }
}

fn document() -> elastic_log_sink::document::ElasticDocument {
    let record = LogRecord::new(Severity::Warning, "Disk {disk} at {pct}")
        .with_value("sda1")
        .with_value(93i64)
        .with_meta("trace.id", "abc");
    transform(&merge_record(record, &TemplateContext::new("node-red", "host-1")).record)
}

#[tokio::test]
async fn posts_document_with_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logs-a/_doc"))
        .and(basic_auth("elastic", "changeme"))
        .and(body_partial_json(json!({
            "message": "Disk 'sda1' at 93",
            "messageTemplate": "Disk {disk} at {pct}",
            "severity": "Warning",
            "level": "Warning",
            "trace": {"id": "abc"},
            "fields": {
                "disk_String": "sda1",
                "pct_Number": 93,
                "Origin_String": "node-red",
                "MachineName_String": "host-1"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_index": "logs-a",
            "_id": "doc-1",
            "result": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // trailing slash on the base url is tolerated
    let sink = ElasticsearchSink::new(&config(format!("{}/", server.uri())), None).unwrap();
    let result = sink.send(&document(), "logs-a", Severity::Warning).await.unwrap();

    assert_eq!(result.index.as_deref(), Some("logs-a"));
    assert_eq!(result.id.as_deref(), Some("doc-1"));
    assert_eq!(result.result.as_deref(), Some("created"));
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/logs-a/_doc"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let sink = ElasticsearchSink::new(&config(server.uri()), None).unwrap();
    let err = sink.send(&document(), "logs-a", Severity::Error).await.unwrap_err();

    let text = err.to_string();
    assert!(text.contains("401"), "unexpected error: {}", text);
    assert!(text.contains("unauthorized"));
}

#[tokio::test]
async fn closed_sink_rejects_new_documents() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let sink = ElasticsearchSink::new(&config(server.uri()), None).unwrap();
    sink.close().await.unwrap();
    assert!(sink.send(&document(), "logs-a", Severity::Debug).await.is_err());
}
