// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! fnsync Core Library
//!
//! Keeps functions on a remote FaaS platform in line with a declared desired
//! state. Provides artifact hashing, identity derivation, the remote function
//! directory, the deployer, and the create/read/update/delete reconciler.

pub mod config;
pub mod deployer;
pub mod directory;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod reconciler;
pub mod state;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, FunctionConfig, PlatformConfig};
pub use directory::{FunctionDirectory, RemoteFunctionEntry};
pub use error::{ArtifactError, FnsyncError, FnsyncResult, HardValidationError, RemoteError};
pub use reconciler::{ManagedResource, ReadOutcome, Reconciler};
pub use state::{ResourceState, ResourceStateMachine};
pub use store::{HandleStore, StoredResource};
pub use transport::{HttpTransport, MemoryPlatform, Transport};
pub use types::{
    ContentChecksum, DesiredState, Environment, FunctionName, Identity, PersistedHandle,
    PlatformAddress, ThreadCount,
};
