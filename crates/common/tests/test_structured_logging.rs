use common::{JsonFormatter, LoggingConfig, OperationTimer, StructuredLogEntry};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn lines(&self) -> Vec<StructuredLogEntry> {
        let bytes = self.0.lock().expect("buffer lock").clone();
        String::from_utf8(bytes)
            .expect("utf-8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is a log entry"))
            .collect()
    }
}

#[test]
fn test_json_layer_writes_one_entry_per_event() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = Registry::default().with(JsonFormatter::new(move || writer.clone()));

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(key = "components:0:parameters", count = 2u64, "deferred bindings created");
        tracing::warn!(destination = "i32", "coercion failed");
    });

    let entries = captured.lines();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].level, "INFO");
    assert_eq!(entries[0].message, "deferred bindings created");
    assert_eq!(entries[0].fields["count"], serde_json::json!(2));
    assert_eq!(entries[0].fields["key"], serde_json::json!("components:0:parameters"));
    assert_eq!(entries[1].level, "WARN");
    assert!(entries[1].context.is_none());
}

#[test]
fn test_json_layer_timestamp_is_rfc3339() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = Registry::default()
        .with(JsonFormatter::new(move || writer.clone()).with_context(true));

    tracing::subscriber::with_default(subscriber, || tracing::error!("boom"));

    let entries = captured.lines();
    assert!(chrono::DateTime::parse_from_rfc3339(&entries[0].timestamp).is_ok());
    let context = entries[0].context.as_ref().expect("context requested");
    assert_eq!(context.pid, std::process::id());
}

#[test]
fn test_logging_config_builders() {
    let config = LoggingConfig::default()
        .with_level_str("TRACE")
        .expect("level names are case-insensitive")
        .json(true);
    assert_eq!(config.level, tracing::Level::TRACE);
    assert!(config.json_output);
}

#[test]
fn test_operation_timer_reports_failure() {
    let timer = OperationTimer::new("load");
    let result: Result<(), String> = timer.finish_with_result(Err("missing file".to_string()));
    assert_eq!(result, Err("missing file".to_string()));
}
