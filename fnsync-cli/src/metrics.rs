// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Reconciliation metrics in Prometheus text format.
//!
//! `fnsync` is a one-shot process, so metrics are written to a file for the
//! node exporter's textfile collector rather than served.

use std::path::Path;

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

use fnsync_core::{FnsyncError, RemoteError};

lazy_static! {
    pub static ref OPERATIONS: IntCounterVec = register_int_counter_vec!(
        "fnsync_operations_total",
        "Reconciliation operations performed, by operation",
        &["operation"]
    )
    .unwrap();
    pub static ref DRIFT_DETECTED: IntCounter = register_int_counter!(
        "fnsync_drift_detected_total",
        "Resources whose deployed state differed from the manifest"
    )
    .unwrap();
    pub static ref FAILURES: IntCounterVec = register_int_counter_vec!(
        "fnsync_failures_total",
        "Failed reconciliation operations, by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "fnsync_operation_duration_seconds",
        "Time taken to reconcile one resource",
        &["operation"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();
}

/// Short label for an error, used as the `kind` of a failure.
pub fn failure_kind(err: &FnsyncError) -> &'static str {
    match err {
        FnsyncError::Artifact(_) => "artifact",
        FnsyncError::Remote(RemoteError::Transport { .. }) => "transport",
        FnsyncError::Remote(RemoteError::Decode { .. }) => "decode",
        FnsyncError::Remote(RemoteError::UploadFailed { .. }) => "upload",
        FnsyncError::Remote(_) => "rejected",
        _ => "other",
    }
}

pub fn record_operation(operation: &str, seconds: f64) {
    OPERATIONS.with_label_values(&[operation]).inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(seconds);
}

pub fn record_failure(err: &FnsyncError) {
    FAILURES.with_label_values(&[failure_kind(err)]).inc();
}

/// Encode every registered metric and write it to `path`.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    std::fs::write(path, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnsync_core::transport::Endpoint;

    #[test]
    fn test_failure_kinds() {
        let err: FnsyncError = RemoteError::Transport {
            endpoint: Endpoint::List,
            reason: "refused".to_string(),
        }
        .into();
        assert_eq!(failure_kind(&err), "transport");

        let err: FnsyncError = RemoteError::Rejected {
            endpoint: Endpoint::List,
            status: 502,
        }
        .into();
        assert_eq!(failure_kind(&err), "rejected");
    }

    #[test]
    fn test_textfile_contains_counters() {
        record_operation("create", 0.2);
        DRIFT_DETECTED.inc();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fnsync.prom");
        write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("fnsync_operations_total{operation=\"create\"}"));
        assert!(text.contains("fnsync_drift_detected_total"));
    }
}
