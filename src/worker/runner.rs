//! DiagnosisWorker — drains the pending queue through the pipeline.
//!
//! Runs sequentially (one inference at a time; the session serializes
//! anyway). One bad scan never aborts the batch: store errors are logged
//! and counted, and the loop moves on — matching how an unattended worker
//! has to behave.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::store::{PendingScan, ScanRecordUpdate, ScanStore};
use super::WorkerError;
use crate::config::DEFAULT_POLL_INTERVAL_SECS;
use crate::pipeline::inference::InferenceEngine;
use crate::pipeline::orchestrator::ScanPipeline;
use crate::pipeline::types::DiagnosisResult;

/// Counts for one drain of the pending queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Scans diagnosed and written back as completed.
    pub completed: usize,
    /// Scans that ran but produced an invalid result (written back failed).
    pub failed: usize,
    /// Scans skipped because the store itself errored on them.
    pub errors: usize,
}

impl BatchOutcome {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Polling batch worker over a [`ScanStore`].
pub struct DiagnosisWorker<E: InferenceEngine> {
    store: Box<dyn ScanStore>,
    pipeline: ScanPipeline<E>,
    poll_interval: Duration,
}

impl<E: InferenceEngine> DiagnosisWorker<E> {
    pub fn new(store: Box<dyn ScanStore>, pipeline: ScanPipeline<E>) -> Self {
        Self {
            store,
            pipeline,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Drain the pending queue once.
    ///
    /// Errors only when the pending-queue read itself fails; per-scan
    /// failures are absorbed into the outcome counts.
    pub fn run_once(&self) -> Result<BatchOutcome, WorkerError> {
        let start = Instant::now();
        let scans = self.store.pending_scans()?;
        info!(count = scans.len(), "Found scans to process");

        let mut outcome = BatchOutcome::default();
        for scan in &scans {
            match self.diagnose_one(scan) {
                Ok(result) if result.is_valid => outcome.completed += 1,
                Ok(_) => outcome.failed += 1,
                Err(e) => {
                    warn!(
                        scan_id = %scan.scan_id,
                        error = %e,
                        "Skipping scan after store error"
                    );
                    outcome.errors += 1;
                }
            }
        }

        info!(
            completed = outcome.completed,
            failed = outcome.failed,
            errors = outcome.errors,
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch drained"
        );
        Ok(outcome)
    }

    /// Poll forever. Store-level failures are logged and retried on the
    /// next tick; this loop only ends with the process.
    pub fn run_forever(&self) -> ! {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Diagnosis worker running"
        );
        loop {
            if let Err(e) = self.run_once() {
                warn!(error = %e, "Worker poll failed");
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Fetch, classify and write back one scan.
    fn diagnose_one(&self, scan: &PendingScan) -> Result<DiagnosisResult, WorkerError> {
        info!(scan_id = %scan.scan_id, "Diagnosing scan");
        let payload = self.store.fetch_scan(&scan.file_path)?;
        let result = self
            .pipeline
            .run_bytes(&payload.bytes, payload.media_type.as_deref());

        let update = if result.is_valid {
            ScanRecordUpdate::completed(&result)
        } else {
            ScanRecordUpdate::failed(&result)
        };
        self.store.update_scan(scan.scan_id, update)?;

        info!(
            scan_id = %scan.scan_id,
            valid = result.is_valid,
            "Scan diagnosis recorded"
        );
        Ok(result)
    }
}
