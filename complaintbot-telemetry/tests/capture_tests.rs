use complaintbot_telemetry::{CaptureLayer, LogFormat, TelemetryConfig, env_filter};
use tracing::Level;
use tracing_subscriber::prelude::*;

#[test]
fn captures_level_target_message_and_fields() {
    let (layer, events) = CaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(records = 12u64, path = "data.csv", "records loaded");
        tracing::warn!(chunk_id = "3_1", error = %"backend down", "skipping chunk");
    });

    let all = events.all();
    assert_eq!(all.len(), 2);

    let info = &all[0];
    assert_eq!(info.level, "INFO");
    assert_eq!(info.message.as_deref(), Some("records loaded"));
    assert_eq!(info.fields["records"], serde_json::json!(12));
    assert_eq!(info.field_str("path"), Some("data.csv"));
    assert!(info.target.starts_with("capture_tests"));

    let warns = events.at_level(Level::WARN);
    assert_eq!(warns.len(), 1);
    assert_eq!(warns[0].field_str("chunk_id"), Some("3_1"));
    assert_eq!(warns[0].field_str("error"), Some("backend down"));
}

#[test]
fn clear_and_message_filter() {
    let (layer, events) = CaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("indexing stage");
        tracing::debug!("dedup check complete");
    });
    assert_eq!(events.with_message("stage").len(), 1);

    events.clear();
    assert!(events.all().is_empty());
}

#[test]
fn config_level_is_used_when_rust_log_unset() {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let config =
        TelemetryConfig { level: "debug".into(), format: LogFormat::Json, with_target: true };
    let filter = env_filter(&config).unwrap();
    assert_eq!(filter.to_string(), "debug");

    let bad = TelemetryConfig { level: "complaintbot=loud".into(), ..Default::default() };
    assert!(env_filter(&bad).is_err());
}
