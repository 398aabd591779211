// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Identity derivation.
//!
//! An identity is `"{address} {name} {checksum} {threads}"`. Every identity in
//! the crate, local or derived from a remote listing, goes through
//! [`format_identity`] so that equal inputs always yield byte-identical strings.
//!
//! The environment mapping is deliberately not part of the identity: the
//! platform's listing does not report it, so an identity including it could
//! never match a remote entry. Environment drift is tracked separately with
//! [`environment_digest`].

use std::fmt::Display;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ArtifactError;
use crate::hasher;
use crate::types::{
    ContentChecksum, DesiredState, Environment, FunctionName, Identity, PlatformAddress,
    ThreadCount,
};

pub(crate) fn format_identity(
    address: &str,
    name: &str,
    checksum: &str,
    threads: impl Display,
) -> Identity {
    Identity::from_formatted(format!("{} {} {} {}", address, name, checksum, threads))
}

/// Derive the identity of a deployment from its four components.
pub fn derive(
    address: &PlatformAddress,
    name: &FunctionName,
    checksum: &ContentChecksum,
    threads: ThreadCount,
) -> Identity {
    format_identity(
        address.as_str(),
        name.as_str(),
        checksum.as_str(),
        threads.value(),
    )
}

/// Hash the artifact at `artifact_path` and derive the identity.
pub fn derive_from_path(
    address: &PlatformAddress,
    name: &FunctionName,
    artifact_path: impl AsRef<Path>,
    threads: ThreadCount,
) -> Result<Identity, ArtifactError> {
    let checksum = hasher::hash_file(artifact_path)?;
    Ok(derive(address, name, &checksum, threads))
}

/// Identity the given desired state should have once deployed.
pub fn derive_from_desired(desired: &DesiredState) -> Result<Identity, ArtifactError> {
    derive_from_path(
        &desired.address,
        &desired.name,
        &desired.artifact_path,
        desired.thread_count,
    )
}

/// SHA-256 over the canonical JSON of an environment mapping.
///
/// Returns the empty string when no environment is configured. Object keys
/// serialize in sorted order, so equal mappings always digest identically.
pub fn environment_digest(environment: Option<&Environment>) -> String {
    match environment {
        None => String::new(),
        Some(env) => {
            let canonical = serde_json::to_vec(env).unwrap_or_default();
            hex::encode(Sha256::digest(&canonical))
        }
    }
}
