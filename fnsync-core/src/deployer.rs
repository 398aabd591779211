// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Upload and delete operations against the platform.
//!
//! Upload is create-or-replace: re-uploading an existing name replaces it.
//! Delete is idempotent: a rejection (typically "not found") is logged and
//! tolerated, only transport failures are returned.

use std::path::Path;
use std::sync::Arc;

use base64::prelude::*;
use serde::Serialize;

use crate::error::{ArtifactError, FnsyncResult, RemoteError};
use crate::transport::{Endpoint, Request, Transport};
use crate::types::{Environment, FunctionName, PlatformAddress, ThreadCount};

/// JSON body of `POST /upload`.
#[derive(Debug, Serialize)]
struct UploadPackage<'a> {
    name: &'a str,
    threads: u32,
    tarball: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<&'a Environment>,
}

/// Issues create-or-replace and delete requests.
#[derive(Debug)]
pub struct FunctionDeployer<T> {
    transport: Arc<T>,
}

impl<T> Clone for FunctionDeployer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> FunctionDeployer<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Upload the artifact at `artifact_path` under `name`.
    pub async fn upload(
        &self,
        address: &PlatformAddress,
        name: &FunctionName,
        artifact_path: &Path,
        threads: ThreadCount,
        environment: Option<&Environment>,
    ) -> FnsyncResult<()> {
        let tarball = tokio::fs::read(artifact_path)
            .await
            .map_err(|source| ArtifactError::Unreadable {
                path: artifact_path.to_path_buf(),
                source,
            })?;

        let package = UploadPackage {
            name: name.as_str(),
            threads: threads.value(),
            tarball: BASE64_STANDARD.encode(&tarball),
            environment,
        };
        let body = serde_json::to_vec(&package).map_err(|e| RemoteError::Encode {
            endpoint: Endpoint::Upload,
            reason: e.to_string(),
        })?;

        tracing::info!(
            function = %name,
            address = %address,
            threads = threads.value(),
            artifact_bytes = tarball.len(),
            "Uploading function"
        );

        let response = self
            .transport
            .send(address, Request::post(Endpoint::Upload, body))
            .await?;

        if !response.is_success() {
            return Err(RemoteError::UploadFailed {
                name: name.to_string(),
                status: response.status,
                body: response.body_excerpt(),
            }
            .into());
        }

        Ok(())
    }

    /// Delete the function registered under `name`.
    pub async fn delete(
        &self,
        address: &PlatformAddress,
        name: &FunctionName,
    ) -> Result<(), RemoteError> {
        tracing::info!(function = %name, address = %address, "Deleting function");

        let response = self
            .transport
            .send(
                address,
                Request::post(Endpoint::Delete, name.as_str().as_bytes().to_vec()),
            )
            .await?;

        if !response.is_success() {
            tracing::warn!(
                function = %name,
                status = response.status,
                body = %response.body_excerpt(),
                "Delete rejected by platform, treating as already absent"
            );
        }

        Ok(())
    }
}
