// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Control-plane transport.
//!
//! The reconciler only needs two abstract operations against the platform:
//! POST a body to an endpoint, and GET an endpoint. [`Transport`] captures
//! exactly that; [`HttpTransport`] speaks HTTP to a real platform and
//! [`MemoryPlatform`] is an in-process platform honouring the same contract.

use std::fmt;
use std::future::Future;

use crate::error::RemoteError;
use crate::types::PlatformAddress;

mod http;
mod memory;

pub use http::{HttpTransport, CONTROL_PORT, DEFAULT_REQUEST_TIMEOUT};
pub use memory::{MemoryPlatform, PlatformCall};

/// Maximum number of response body bytes carried into error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Control-plane endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Create-or-replace a function. JSON body.
    Upload,
    /// Remove a function. Raw body holding the function name.
    Delete,
    /// Read-only listing of deployed functions.
    List,
}

impl Endpoint {
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }

    /// Only the listing is fetched with GET.
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::List)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// A single request to the platform.
#[derive(Debug, Clone)]
pub struct Request {
    pub endpoint: Endpoint,
    pub body: Vec<u8>,
}

impl Request {
    pub fn get(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            body: Vec::new(),
        }
    }

    pub fn post(endpoint: Endpoint, body: impl Into<Vec<u8>>) -> Self {
        Self {
            endpoint,
            body: body.into(),
        }
    }
}

/// Raw platform response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, truncated for inclusion in error messages.
    pub fn body_excerpt(&self) -> String {
        let end = self.body.len().min(ERROR_BODY_LIMIT);
        String::from_utf8_lossy(&self.body[..end]).trim().to_string()
    }
}

/// Abstract request/response exchange with a platform at a given address.
///
/// Implementations report connection-level failures as
/// [`RemoteError::Transport`] and return every HTTP-level response, successful
/// or not, as a [`Response`] for the caller to interpret.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        address: &PlatformAddress,
        request: Request,
    ) -> impl Future<Output = Result<Response, RemoteError>> + Send;
}
