// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Content hashing for packaged artifacts.
//!
//! SHA-256 over the artifact's full byte stream, hex encoded. A read failure
//! is fatal for the calling operation: there is no partial checksum.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ArtifactError;
use crate::types::ContentChecksum;

/// Hash the artifact at `path`, streaming it through SHA-256.
pub fn hash_file(path: impl AsRef<Path>) -> Result<ContentChecksum, ArtifactError> {
    let path = path.as_ref();
    let unreadable = |source| ArtifactError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unreadable)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(unreadable)?;

    let checksum = ContentChecksum::from_digest(&hasher.finalize());
    tracing::trace!(path = %path.display(), checksum = %checksum, "Hashed artifact");
    Ok(checksum)
}

/// Hash an in-memory artifact.
pub fn hash_bytes(bytes: &[u8]) -> ContentChecksum {
    ContentChecksum::from_digest(&Sha256::digest(bytes))
}
