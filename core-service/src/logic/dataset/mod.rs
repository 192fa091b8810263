//! Dataset Module - Prediction Records
//!
//! Lưu mỗi kết quả dự đoán (theo patient_id) cho audit và retraining.
//! JSONL với rotation tự động, hoặc in-memory cho tests.

pub mod record;
pub mod writer;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

pub use record::PredictionRecord;
pub use writer::JsonlWriter;

use crate::logic::pipeline::PredictionResult;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("patient_id must not be empty")]
    MissingPatientId,
    #[error("prediction log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write counters plus storage details, for health reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkStats {
    pub kind: &'static str,
    pub total_records: u64,
    /// Writes that returned an error (callers only log them)
    pub failed_writes: u64,
    pub total_files: usize,
    pub total_size_mb: f32,
    pub current_file: Option<String>,
}

/// Persistence collaborator, called after a successful score
pub trait PredictionSink: Send + Sync {
    fn record(&self, patient_id: &str, doctor_id: Option<&str>, result: &PredictionResult) -> Result<(), SinkError>;

    fn stats(&self) -> SinkStats;
}

fn build_record(
    patient_id: &str,
    doctor_id: Option<&str>,
    result: &PredictionResult,
) -> Result<PredictionRecord, SinkError> {
    if patient_id.trim().is_empty() {
        return Err(SinkError::MissingPatientId);
    }
    Ok(PredictionRecord::new(patient_id.trim(), doctor_id, result))
}

#[derive(Default)]
struct WriteCounters {
    written: AtomicU64,
    failed: AtomicU64,
}

impl WriteCounters {
    fn track(&self, outcome: Result<(), SinkError>) -> Result<(), SinkError> {
        match &outcome {
            Ok(()) => self.written.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

// ============================================================================
// JSONL SINK
// ============================================================================

pub struct JsonlSink {
    writer: JsonlWriter,
    counters: WriteCounters,
}

impl JsonlSink {
    pub fn new(base_dir: PathBuf) -> Result<Self, SinkError> {
        Ok(Self::from_writer(JsonlWriter::from_path(base_dir)?))
    }

    pub fn from_writer(writer: JsonlWriter) -> Self {
        log::info!("Prediction log at {}", writer.base_dir().display());
        Self {
            writer,
            counters: WriteCounters::default(),
        }
    }
}

impl PredictionSink for JsonlSink {
    fn record(&self, patient_id: &str, doctor_id: Option<&str>, result: &PredictionResult) -> Result<(), SinkError> {
        let outcome = build_record(patient_id, doctor_id, result)
            .and_then(|record| self.writer.append(&record).map_err(SinkError::from));
        self.counters.track(outcome)
    }

    fn stats(&self) -> SinkStats {
        let (total_files, total_size_mb, current_file) = match self.writer.get_stats() {
            Ok(stats) => stats,
            Err(_) => (0, 0.0, None),
        };
        SinkStats {
            kind: "jsonl",
            total_records: self.counters.written(),
            failed_writes: self.counters.failed(),
            total_files,
            total_size_mb,
            current_file,
        }
    }
}

// ============================================================================
// MEMORY SINK
// ============================================================================

#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<PredictionRecord>>,
    counters: WriteCounters,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        self.records.lock().clone()
    }

    pub fn for_patient(&self, patient_id: &str) -> Vec<PredictionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect()
    }
}

impl PredictionSink for MemorySink {
    fn record(&self, patient_id: &str, doctor_id: Option<&str>, result: &PredictionResult) -> Result<(), SinkError> {
        let outcome = build_record(patient_id, doctor_id, result).map(|record| self.records.lock().push(record));
        self.counters.track(outcome)
    }

    fn stats(&self) -> SinkStats {
        SinkStats {
            kind: "memory",
            total_records: self.counters.written(),
            failed_writes: self.counters.failed(),
            total_files: 0,
            total_size_mb: 0.0,
            current_file: None,
        }
    }
}
