// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-process platform.
//!
//! Decodes requests exactly as a real control plane would: uploads are JSON
//! with a base64 tarball, deletes carry the raw function name, and the listing
//! is a JSON array. Records every call and supports fault injection so the
//! reconciler's ordering and error handling can be observed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::prelude::*;
use serde::Deserialize;

use super::{Endpoint, Request, Response, Transport};
use crate::directory::RemoteFunctionEntry;
use crate::error::RemoteError;
use crate::hasher;
use crate::types::{Environment, PlatformAddress};

/// A request observed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    List,
    Upload { name: String },
    Delete { name: String },
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    name: String,
    threads: i64,
    tarball: String,
    #[serde(default)]
    environment: Option<Environment>,
}

#[derive(Debug, Clone)]
struct Deployed {
    entry: RemoteFunctionEntry,
    environment: Option<Environment>,
}

#[derive(Debug, Default)]
struct Inner {
    deployments: HashMap<PlatformAddress, BTreeMap<String, Deployed>>,
    calls: Vec<PlatformCall>,
    unreachable: bool,
    corrupt_listing: bool,
    drop_uploads: bool,
    rejections: HashMap<Endpoint, u16>,
}

/// Platform kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    inner: Mutex<Inner>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place an entry on the platform without recording a call.
    pub fn seed(&self, address: &PlatformAddress, entry: RemoteFunctionEntry) {
        self.lock()
            .deployments
            .entry(address.clone())
            .or_default()
            .insert(
                entry.name.clone(),
                Deployed {
                    entry,
                    environment: None,
                },
            );
    }

    /// Functions currently deployed at `address`, ordered by name.
    pub fn functions(&self, address: &PlatformAddress) -> Vec<RemoteFunctionEntry> {
        self.lock()
            .deployments
            .get(address)
            .map(|fns| fns.values().map(|d| d.entry.clone()).collect())
            .unwrap_or_default()
    }

    /// Environment the named function was last uploaded with.
    pub fn environment(&self, address: &PlatformAddress, name: &str) -> Option<Environment> {
        self.lock()
            .deployments
            .get(address)
            .and_then(|fns| fns.get(name))
            .and_then(|d| d.environment.clone())
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Simulate a network partition: every request fails at the transport level.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Make the listing return a body that is not valid JSON.
    pub fn set_corrupt_listing(&self, corrupt: bool) {
        self.lock().corrupt_listing = corrupt;
    }

    /// Acknowledge uploads without deploying them.
    pub fn set_drop_uploads(&self, drop: bool) {
        self.lock().drop_uploads = drop;
    }

    /// Answer every request to `endpoint` with `status` and no side effect.
    pub fn reject(&self, endpoint: Endpoint, status: u16) {
        self.lock().rejections.insert(endpoint, status);
    }

    pub fn clear_rejections(&self) {
        self.lock().rejections.clear();
    }

    fn respond(status: u16, body: impl Into<Vec<u8>>) -> Response {
        Response {
            status,
            body: body.into(),
        }
    }

    fn handle_upload(inner: &mut Inner, address: &PlatformAddress, body: &[u8]) -> Response {
        let upload: UploadBody = match serde_json::from_slice(body) {
            Ok(upload) => upload,
            Err(e) => return Self::respond(400, format!("invalid upload: {}", e)),
        };
        inner.calls.push(PlatformCall::Upload {
            name: upload.name.clone(),
        });
        if inner.drop_uploads {
            return Self::respond(200, "ok");
        }

        let tarball = match BASE64_STANDARD.decode(upload.tarball.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => return Self::respond(400, format!("invalid tarball encoding: {}", e)),
        };

        let entry = RemoteFunctionEntry {
            resource: format!("/{}", upload.name),
            name: upload.name.clone(),
            hash: hasher::hash_bytes(&tarball).to_string(),
            threads: upload.threads,
        };
        inner
            .deployments
            .entry(address.clone())
            .or_default()
            .insert(
                upload.name,
                Deployed {
                    entry,
                    environment: upload.environment,
                },
            );

        Self::respond(200, "ok")
    }

    fn handle_delete(inner: &mut Inner, address: &PlatformAddress, body: &[u8]) -> Response {
        let name = String::from_utf8_lossy(body).into_owned();
        inner.calls.push(PlatformCall::Delete { name: name.clone() });

        let removed = inner
            .deployments
            .get_mut(address)
            .and_then(|fns| fns.remove(&name));

        match removed {
            Some(_) => Self::respond(200, "ok"),
            None => Self::respond(404, format!("function {} not found", name)),
        }
    }

    fn handle_list(inner: &mut Inner, address: &PlatformAddress) -> Response {
        inner.calls.push(PlatformCall::List);

        if inner.corrupt_listing {
            return Self::respond(200, "<html>gateway timeout</html>");
        }

        let entries: Vec<&RemoteFunctionEntry> = inner
            .deployments
            .get(address)
            .map(|fns| fns.values().map(|d| &d.entry).collect())
            .unwrap_or_default();

        match serde_json::to_vec(&entries) {
            Ok(body) => Self::respond(200, body),
            Err(e) => Self::respond(500, e.to_string()),
        }
    }
}

impl Transport for MemoryPlatform {
    async fn send(
        &self,
        address: &PlatformAddress,
        request: Request,
    ) -> Result<Response, RemoteError> {
        let mut inner = self.lock();

        if inner.unreachable {
            return Err(RemoteError::Transport {
                endpoint: request.endpoint,
                reason: format!("connection to {} refused", address),
            });
        }

        if let Some(status) = inner.rejections.get(&request.endpoint).copied() {
            return Ok(Self::respond(status, "rejected"));
        }

        let response = match request.endpoint {
            Endpoint::Upload => Self::handle_upload(&mut inner, address, &request.body),
            Endpoint::Delete => Self::handle_delete(&mut inner, address, &request.body),
            Endpoint::List => Self::handle_list(&mut inner, address),
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> PlatformAddress {
        PlatformAddress::new("10.0.0.5").unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let platform = MemoryPlatform::new();
        let body = serde_json::json!({
            "name": "greet",
            "threads": 4,
            "tarball": BASE64_STANDARD.encode(b"hello"),
        });

        let resp = platform
            .send(&address(), Request::post(Endpoint::Upload, body.to_string()))
            .await
            .unwrap();
        assert!(resp.is_success());

        let functions = platform.functions(&address());
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].hash, hasher::hash_bytes(b"hello").to_string());
        assert_eq!(functions[0].resource, "/greet");
    }

    #[tokio::test]
    async fn test_delete_missing_is_404() {
        let platform = MemoryPlatform::new();
        let resp = platform
            .send(&address(), Request::post(Endpoint::Delete, "ghost"))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::Delete {
                name: "ghost".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable() {
        let platform = MemoryPlatform::new();
        platform.set_unreachable(true);
        let result = platform.send(&address(), Request::get(Endpoint::List)).await;
        assert!(matches!(result, Err(RemoteError::Transport { .. })));
        assert!(platform.calls().is_empty());
    }
}
