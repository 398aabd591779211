// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Read-only view of the functions deployed on the platform.
//!
//! Always queried fresh; nothing is cached between calls. A listing that
//! cannot be fetched or decoded is an error, never an empty directory.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::identity::format_identity;
use crate::transport::{Endpoint, Request, Transport};
use crate::types::{FunctionName, Identity, PlatformAddress};

/// One deployed function as reported by `GET /list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFunctionEntry {
    pub name: String,
    pub hash: String,
    pub threads: i64,
    #[serde(default)]
    pub resource: String,
}

impl RemoteFunctionEntry {
    /// Identity of this deployment on the platform at `address`.
    pub fn identity(&self, address: &PlatformAddress) -> Identity {
        format_identity(address.as_str(), &self.name, &self.hash, self.threads)
    }
}

/// Directory of deployed functions, backed by a transport.
#[derive(Debug)]
pub struct FunctionDirectory<T> {
    transport: Arc<T>,
}

impl<T> Clone for FunctionDirectory<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> FunctionDirectory<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Fetch the current listing.
    pub async fn list(
        &self,
        address: &PlatformAddress,
    ) -> Result<Vec<RemoteFunctionEntry>, RemoteError> {
        let response = self
            .transport
            .send(address, Request::get(Endpoint::List))
            .await?;

        if !response.is_success() {
            return Err(RemoteError::Rejected {
                endpoint: Endpoint::List,
                status: response.status,
            });
        }

        // An empty platform may answer `null` instead of `[]`.
        let entries: Option<Vec<RemoteFunctionEntry>> = serde_json::from_slice(&response.body)
            .map_err(|e| RemoteError::Decode {
                endpoint: Endpoint::List,
                reason: e.to_string(),
            })?;
        let entries = entries.unwrap_or_default();

        tracing::debug!(address = %address, functions = entries.len(), "Fetched function listing");
        Ok(entries)
    }

    /// Identity of the deployment currently registered under `name`.
    pub async fn find_by_name(
        &self,
        address: &PlatformAddress,
        name: &FunctionName,
    ) -> Result<Option<Identity>, RemoteError> {
        let entries = self.list(address).await?;

        Ok(entries
            .iter()
            .find(|entry| entry.name == name.as_str())
            .map(|entry| entry.identity(address)))
    }

    /// Name of the deployment whose identity equals `identity`.
    pub async fn find_by_identity(
        &self,
        address: &PlatformAddress,
        identity: &Identity,
    ) -> Result<Option<FunctionName>, RemoteError> {
        let entries = self.list(address).await?;

        let Some(entry) = entries
            .into_iter()
            .find(|entry| entry.identity(address) == *identity)
        else {
            return Ok(None);
        };

        FunctionName::new(entry.name)
            .map(Some)
            .map_err(|e| RemoteError::Decode {
                endpoint: Endpoint::List,
                reason: e.to_string(),
            })
    }
}
