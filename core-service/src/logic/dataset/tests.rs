use std::fs;

use tempfile::tempdir;

use super::*;
use crate::logic::explain::{Direction, ExplanationItem};
use crate::logic::model::RiskTier;
use crate::logic::pipeline::Diagnostics;

fn result(explainable: bool) -> PredictionResult {
    let explanation = if explainable {
        vec![ExplanationItem {
            feature_name: "age".to_string(),
            human_rule: "age > 61.00".to_string(),
            signed_contribution: 0.18,
            direction: Direction::Increases,
        }]
    } else {
        Vec::new()
    };
    PredictionResult {
        probability: 0.723456,
        predicted_class: 1,
        risk_tier: RiskTier::High,
        explanation,
        explainable,
        local_fit: None,
        diagnostics: Diagnostics::default(),
    }
}

#[test]
fn test_jsonl_append_and_read() {
    let dir = tempdir().unwrap();
    let sink = JsonlSink::new(dir.path().to_path_buf()).unwrap();

    sink.record("P-001", Some("D-7"), &result(true)).unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap()).collect();
    assert_eq!(entries.len(), 1);
    let path = entries[0].path();
    assert!(path.extension().unwrap() == "jsonl");

    let content = fs::read_to_string(&path).unwrap();
    let record: PredictionRecord = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(record.patient_id, "P-001");
    assert_eq!(record.doctor_id.as_deref(), Some("D-7"));
    assert_eq!(record.probability, 0.7235);
    assert_eq!(record.risk_level, "High");
    assert_eq!(record.key_factors.unwrap()["age"], 0.18);

    let stats = sink.stats();
    assert_eq!(stats.kind, "jsonl");
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.total_records, 1);
    assert_eq!(stats.failed_writes, 0);
}

#[test]
fn test_small_records_share_one_file() {
    let dir = tempdir().unwrap();
    let sink = JsonlSink::new(dir.path().to_path_buf()).unwrap();

    sink.record("P-1", None, &result(false)).unwrap();
    sink.record("P-2", None, &result(false)).unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let path = entries[0].as_ref().unwrap().path();
    assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 2);
}

#[test]
fn test_rotation_when_full() {
    let dir = tempdir().unwrap();
    let writer = JsonlWriter::with_max_size(dir.path().to_path_buf(), 1).unwrap();
    let sink = JsonlSink::from_writer(writer);

    sink.record("P-1", None, &result(false)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));
    sink.record("P-2", None, &result(false)).unwrap();

    assert_eq!(sink.stats().total_files, 2);
}

#[test]
fn test_reopens_latest_file() {
    let dir = tempdir().unwrap();
    JsonlSink::new(dir.path().to_path_buf())
        .unwrap()
        .record("P-1", None, &result(false))
        .unwrap();

    // New sink over the same directory keeps appending to the same file
    let sink = JsonlSink::new(dir.path().to_path_buf()).unwrap();
    sink.record("P-2", None, &result(false)).unwrap();

    let stats = sink.stats();
    assert_eq!(stats.total_files, 1);
    let content = fs::read_to_string(dir.path().join(stats.current_file.unwrap())).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn test_empty_patient_id_rejected() {
    let sink = MemorySink::new();
    let err = sink.record("  ", None, &result(true)).unwrap_err();
    assert!(matches!(err, SinkError::MissingPatientId));
    assert!(sink.records().is_empty());
}

#[test]
fn test_memory_sink_by_patient() {
    let sink = MemorySink::new();
    sink.record("P-1", None, &result(true)).unwrap();
    sink.record("P-2", Some("D-1"), &result(false)).unwrap();
    sink.record("P-1", None, &result(false)).unwrap();

    assert_eq!(sink.records().len(), 3);
    let p1 = sink.for_patient("P-1");
    assert_eq!(p1.len(), 2);
    assert!(p1[0].key_factors.is_some());
    assert!(p1[1].key_factors.is_none());
    assert_ne!(p1[0].id, p1[1].id);
}

#[test]
fn test_failed_writes_counted() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("predictions");
    let sink = JsonlSink::new(log_dir.clone()).unwrap();
    assert_eq!(sink.stats().current_file, None);

    fs::remove_dir_all(&log_dir).unwrap();
    assert!(matches!(sink.record("P-1", None, &result(true)), Err(SinkError::Io(_))));

    let stats = sink.stats();
    assert_eq!(stats.total_records, 0);
    assert_eq!(stats.failed_writes, 1);
    assert_eq!(stats.total_files, 0);
}

#[test]
fn test_memory_sink_counts_rejections() {
    let sink = MemorySink::new();
    sink.record("P-1", None, &result(true)).unwrap();
    assert!(sink.record("", None, &result(true)).is_err());

    let stats = sink.stats();
    assert_eq!(stats.kind, "memory");
    assert_eq!(stats.total_records, 1);
    assert_eq!(stats.failed_writes, 1);
}
