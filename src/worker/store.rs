//! Scan store boundary: pending-queue reads, payload fetches, write-backs.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkerError;
use crate::pipeline::acquire::FetchedScan;
use crate::pipeline::types::{DiagnosisResult, ScanClass};

// ═══════════════════════════════════════════════════════════
// Record types
// ═══════════════════════════════════════════════════════════

/// Lifecycle of a scan record in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

/// A scan awaiting diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingScan {
    pub scan_id: Uuid,
    pub file_path: String,
}

/// Write-back after a diagnosis attempt.
///
/// Confidence is the same 0–1 fraction the pipeline reports — no unit
/// conversion happens between the result and the stored record. A failed
/// attempt carries no diagnosis and no confidence, only the serialized
/// result (which holds the error message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecordUpdate {
    pub diagnosis_status: ScanStatus,
    pub diagnosis_type: Option<ScanClass>,
    pub confidence_score: Option<f32>,
    pub ai_result: Option<serde_json::Value>,
    pub analysis_date: DateTime<Utc>,
}

impl ScanRecordUpdate {
    pub fn completed(result: &DiagnosisResult) -> Self {
        Self {
            diagnosis_status: ScanStatus::Completed,
            diagnosis_type: result.diagnosis,
            confidence_score: Some(result.confidence),
            ai_result: serde_json::to_value(result).ok(),
            analysis_date: Utc::now(),
        }
    }

    pub fn failed(result: &DiagnosisResult) -> Self {
        Self {
            diagnosis_status: ScanStatus::Failed,
            diagnosis_type: None,
            confidence_score: None,
            ai_result: serde_json::to_value(result).ok(),
            analysis_date: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Store trait
// ═══════════════════════════════════════════════════════════

/// CRUD boundary to the scan records and their stored payloads.
pub trait ScanStore: Send + Sync {
    /// All scans currently awaiting diagnosis.
    fn pending_scans(&self) -> Result<Vec<PendingScan>, WorkerError>;

    /// Download the stored payload for a scan.
    fn fetch_scan(&self, file_path: &str) -> Result<FetchedScan, WorkerError>;

    /// Persist the outcome of a diagnosis attempt.
    fn update_scan(&self, scan_id: Uuid, update: ScanRecordUpdate) -> Result<(), WorkerError>;
}

impl<S: ScanStore + ?Sized> ScanStore for std::sync::Arc<S> {
    fn pending_scans(&self) -> Result<Vec<PendingScan>, WorkerError> {
        (**self).pending_scans()
    }

    fn fetch_scan(&self, file_path: &str) -> Result<FetchedScan, WorkerError> {
        (**self).fetch_scan(file_path)
    }

    fn update_scan(&self, scan_id: Uuid, update: ScanRecordUpdate) -> Result<(), WorkerError> {
        (**self).update_scan(scan_id, update)
    }
}

// ═══════════════════════════════════════════════════════════
// Mock store (testing)
// ═══════════════════════════════════════════════════════════

/// In-memory store: configured pending scans and payloads, recorded updates.
/// Fetching a path with no configured payload fails like a missing object.
pub struct MockScanStore {
    pending: Vec<PendingScan>,
    payloads: HashMap<String, FetchedScan>,
    updates: Mutex<Vec<(Uuid, ScanRecordUpdate)>>,
}

impl MockScanStore {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            payloads: HashMap::new(),
            updates: Mutex::new(Vec::new()),
        }
    }

    /// Queue a pending scan with a stored payload. Returns the scan id.
    pub fn with_scan(mut self, file_path: &str, bytes: Vec<u8>, media_type: Option<&str>) -> Self {
        self.pending.push(PendingScan {
            scan_id: Uuid::new_v4(),
            file_path: file_path.to_string(),
        });
        self.payloads.insert(
            file_path.to_string(),
            FetchedScan {
                bytes,
                media_type: media_type.map(str::to_string),
            },
        );
        self
    }

    /// Queue a pending scan whose payload is missing from storage.
    pub fn with_orphan_scan(mut self, file_path: &str) -> Self {
        self.pending.push(PendingScan {
            scan_id: Uuid::new_v4(),
            file_path: file_path.to_string(),
        });
        self
    }

    /// All updates recorded so far, in write order.
    pub fn recorded_updates(&self) -> Vec<(Uuid, ScanRecordUpdate)> {
        self.updates.lock().expect("updates lock").clone()
    }
}

impl Default for MockScanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStore for MockScanStore {
    fn pending_scans(&self) -> Result<Vec<PendingScan>, WorkerError> {
        Ok(self.pending.clone())
    }

    fn fetch_scan(&self, file_path: &str) -> Result<FetchedScan, WorkerError> {
        self.payloads
            .get(file_path)
            .cloned()
            .ok_or_else(|| WorkerError::Store(format!("No object at {file_path}")))
    }

    fn update_scan(&self, scan_id: Uuid, update: ScanRecordUpdate) -> Result<(), WorkerError> {
        self.updates
            .lock()
            .expect("updates lock")
            .push((scan_id, update));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{ClassProbabilities, DiagnosisResult};

    #[test]
    fn status_wire_names() {
        assert_eq!(ScanStatus::Pending.as_str(), "pending");
        assert_eq!(
            serde_json::to_value(ScanStatus::Completed).unwrap(),
            serde_json::json!("completed")
        );
    }

    #[test]
    fn completed_update_carries_diagnosis_and_fraction() {
        let result = DiagnosisResult::valid(
            ScanClass::Pneumonia,
            0.75,
            ClassProbabilities {
                normal: 0.125,
                pneumonia: 0.75,
                cancer_or_other: 0.125,
            },
        );
        let update = ScanRecordUpdate::completed(&result);
        assert_eq!(update.diagnosis_status, ScanStatus::Completed);
        assert_eq!(update.diagnosis_type, Some(ScanClass::Pneumonia));
        assert_eq!(update.confidence_score, Some(0.75));
        let json = update.ai_result.unwrap();
        assert_eq!(json["isValid"], true);
    }

    #[test]
    fn failed_update_has_no_diagnosis() {
        let result = DiagnosisResult::invalid("decode failed");
        let update = ScanRecordUpdate::failed(&result);
        assert_eq!(update.diagnosis_status, ScanStatus::Failed);
        assert_eq!(update.diagnosis_type, None);
        assert_eq!(update.confidence_score, None);
        let json = update.ai_result.unwrap();
        assert_eq!(json["error"], "decode failed");
    }

    #[test]
    fn mock_store_fetch_of_missing_object_errors() {
        let store = MockScanStore::new().with_orphan_scan("scans/gone.png");
        assert!(matches!(
            store.fetch_scan("scans/gone.png"),
            Err(WorkerError::Store(_))
        ));
    }
}
