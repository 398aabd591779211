// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time. Address, name and
//! checksum never contain whitespace, so the space-joined [`Identity`] built
//! from them is unambiguous for equality comparison.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Maximum length of a function name.
const MAX_NAME_LEN: usize = 128;
/// Length of a hex-encoded SHA-256 digest.
const CHECKSUM_HEX_LEN: usize = 64;

/// Environment passed through to a deployed function at upload time.
/// Values are arbitrary JSON; keys are ordered so serialization is canonical.
pub type Environment = BTreeMap<String, serde_json::Value>;

fn reject_whitespace(field: &'static str, value: &str) -> Result<(), HardValidationError> {
    if value.is_empty() {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: value.to_string(),
            reason: format!("{} cannot be empty", field),
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: value.to_string(),
            reason: format!("{} must not contain whitespace or control characters", field),
        });
    }

    Ok(())
}

/// Network location of the remote platform (host name or IP, no scheme or port).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformAddress(String);

impl PlatformAddress {
    /// Create a new PlatformAddress with validation.
    pub fn new(address: impl Into<String>) -> Result<Self, HardValidationError> {
        let address = address.into();
        reject_whitespace("address", &address)?;

        if address.contains('/') {
            return Err(HardValidationError::InvalidFieldValue {
                field: "address",
                value: address,
                reason: "Address must be a bare host, without scheme or path".to_string(),
            });
        }

        // The control port is fixed, so a colon is only valid inside an IPv6 literal.
        if address.contains(':') && address.parse::<Ipv6Addr>().is_err() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "address",
                value: address,
                reason: "Address must not carry a port".to_string(),
            });
        }

        Ok(Self(address))
    }

    /// Whether the address is an IPv6 literal.
    pub fn is_ipv6(&self) -> bool {
        self.0.parse::<Ipv6Addr>().is_ok()
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PlatformAddress {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlatformAddress> for String {
    fn from(address: PlatformAddress) -> Self {
        address.0
    }
}

/// Logical function name, the natural key on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionName(String);

impl FunctionName {
    /// Create a new FunctionName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();
        reject_whitespace("name", &name)?;

        if name.len() > MAX_NAME_LEN {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Function name too long: {} chars (max {})",
                    name.len(),
                    MAX_NAME_LEN
                ),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FunctionName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FunctionName> for String {
    fn from(name: FunctionName) -> Self {
        name.0
    }
}

/// Validated thread count.
/// Must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ThreadCount(u32);

impl ThreadCount {
    /// Create a new ThreadCount with validation.
    pub fn new(threads: u32) -> Result<Self, HardValidationError> {
        if threads == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "num_threads",
                value: "0".to_string(),
                reason: "Thread count must be greater than 0".to_string(),
            });
        }
        Ok(Self(threads))
    }

    /// Get the inner value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThreadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for ThreadCount {
    type Error = HardValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ThreadCount> for u32 {
    fn from(threads: ThreadCount) -> Self {
        threads.0
    }
}

/// Hex-encoded SHA-256 digest of an artifact's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentChecksum(String);

impl ContentChecksum {
    /// Parse a checksum from its hex form.
    pub fn new(hex: impl Into<String>) -> Result<Self, HardValidationError> {
        let hex = hex.into();

        if hex.len() != CHECKSUM_HEX_LEN
            || !hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "checksum",
                value: hex,
                reason: format!("Expected {} lowercase hex characters", CHECKSUM_HEX_LEN),
            });
        }

        Ok(Self(hex))
    }

    /// Wrap the lowercase hex encoding of a digest the hasher just produced.
    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContentChecksum {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentChecksum> for String {
    fn from(checksum: ContentChecksum) -> Self {
        checksum.0
    }
}

/// Opaque fingerprint of a deployment: address, name, checksum and threads.
///
/// Only ever compared for equality against values produced by
/// [`crate::identity`]; never parsed back into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub(crate) fn from_formatted(formatted: String) -> Self {
        Self(formatted)
    }

    /// Rehydrate an identity previously written to durable storage.
    pub fn from_persisted(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable reference to a managed function.
/// Serialized as the identity string; the empty string means "does not exist".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PersistedHandle(Option<Identity>);

impl PersistedHandle {
    /// A handle for a resource that does not exist.
    pub fn empty() -> Self {
        Self(None)
    }

    /// A handle pointing at the given identity.
    pub fn present(identity: Identity) -> Self {
        Self(Some(identity))
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn set(&mut self, identity: Identity) {
        self.0 = Some(identity);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// The identity string, or `""` when absent.
    pub fn as_str(&self) -> &str {
        self.0.as_ref().map(Identity::as_str).unwrap_or("")
    }
}

impl fmt::Display for PersistedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for PersistedHandle {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Self(None)
        } else {
            Self(Some(Identity(value)))
        }
    }
}

impl From<PersistedHandle> for String {
    fn from(handle: PersistedHandle) -> Self {
        handle.0.map(|id| id.0).unwrap_or_default()
    }
}

/// Desired configuration of one function, as declared in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub address: PlatformAddress,
    pub name: FunctionName,
    pub artifact_path: PathBuf,
    pub thread_count: ThreadCount,
    pub environment: Option<Environment>,
}

impl DesiredState {
    pub fn new(
        address: PlatformAddress,
        name: FunctionName,
        artifact_path: impl Into<PathBuf>,
        thread_count: ThreadCount,
    ) -> Self {
        Self {
            address,
            name,
            artifact_path: artifact_path.into(),
            thread_count,
            environment: None,
        }
    }

    /// Attach an environment mapping.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}
