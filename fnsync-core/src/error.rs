// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for fnsync.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.
//! Remote failures are never folded into "not found": a listing that could not
//! be fetched or decoded surfaces as a [`RemoteError`], and only a well-formed
//! listing without a matching entry means the function is absent.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::Endpoint;

/// Top-level error type for fnsync.
#[derive(Debug, Error)]
pub enum FnsyncError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Manifest
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Artifact Errors - No Partial Identities
    // =========================================================================
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    // =========================================================================
    // Remote Platform Errors
    // =========================================================================
    #[error("Remote platform error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Failed to initialise HTTP client: {message}")]
    HttpClient { message: String },

    // =========================================================================
    // Resource Lifecycle Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    #[error("State file {path} is unusable: {message}")]
    StateFile { path: PathBuf, message: String },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl FnsyncError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Hard validation errors reject a manifest or value before any remote call.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Duplicate function name {name} on {address} (resources {first} and {second})")]
    DuplicateFunctionName {
        name: String,
        address: String,
        first: String,
        second: String,
    },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// The packaged artifact could not be read.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Cannot read artifact {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the remote platform.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Transport failure on {endpoint}: {reason}")]
    Transport { endpoint: Endpoint, reason: String },

    #[error("Malformed response from {endpoint}: {reason}")]
    Decode { endpoint: Endpoint, reason: String },

    #[error("Cannot encode request for {endpoint}: {reason}")]
    Encode { endpoint: Endpoint, reason: String },

    #[error("Upload of function {name} failed with status {status}: {body}")]
    UploadFailed {
        name: String,
        status: u16,
        body: String,
    },

    #[error("Request to {endpoint} rejected with status {status}")]
    Rejected { endpoint: Endpoint, status: u16 },
}

impl RemoteError {
    /// Transport failures and server-side rejections are worth retrying;
    /// malformed listings and client-side rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Rejected { status, .. } | Self::UploadFailed { status, .. } => *status >= 500,
            Self::Decode { .. } | Self::Encode { .. } => false,
        }
    }
}

/// State transition errors for the resource state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} for resource {resource}")]
    InvalidTransition {
        resource: String,
        from: &'static str,
        to: &'static str,
    },
}

/// Result type alias using FnsyncError.
pub type FnsyncResult<T> = Result<T, FnsyncError>;
