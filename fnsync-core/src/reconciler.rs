// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Create/read/update/delete reconciliation of one managed function.
//!
//! Drift detection is identity equality: the identity derived from the
//! desired state must equal the identity derived from the platform's entry
//! for the same name. Every remote call is issued sequentially; the platform
//! is queried fresh on every read.

use std::sync::Arc;

use crate::deployer::FunctionDeployer;
use crate::directory::FunctionDirectory;
use crate::error::{FnsyncResult, RemoteError};
use crate::identity;
use crate::state::{ResourceState, ResourceStateMachine};
use crate::transport::Transport;
use crate::types::{DesiredState, FunctionName, Identity, PersistedHandle, PlatformAddress};

/// Result of comparing desired and deployed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The platform runs exactly the desired configuration.
    InSync,
    /// The platform runs something else under this name, or nothing.
    Drifted { actual: Option<Identity> },
}

impl ReadOutcome {
    pub fn is_in_sync(&self) -> bool {
        matches!(self, Self::InSync)
    }
}

/// A function under management: its desired state, persisted handle and
/// lifecycle state.
#[derive(Debug)]
pub struct ManagedResource {
    desired: DesiredState,
    handle: PersistedHandle,
    state: ResourceStateMachine,
}

impl ManagedResource {
    /// A resource that has never been created.
    pub fn new(key: impl Into<String>, desired: DesiredState) -> Self {
        Self::with_handle(key, desired, PersistedHandle::empty())
    }

    /// A resource known by a previously persisted handle.
    pub fn with_handle(
        key: impl Into<String>,
        desired: DesiredState,
        handle: PersistedHandle,
    ) -> Self {
        let initial = if handle.is_present() {
            ResourceState::Present
        } else {
            ResourceState::Absent
        };

        Self {
            desired,
            handle,
            state: ResourceStateMachine::new(key, initial),
        }
    }

    pub fn key(&self) -> &str {
        self.state.resource()
    }

    pub fn desired(&self) -> &DesiredState {
        &self.desired
    }

    pub fn handle(&self) -> &PersistedHandle {
        &self.handle
    }

    pub fn state(&self) -> ResourceState {
        self.state.state()
    }

    pub fn transition_count(&self) -> u64 {
        self.state.transition_count()
    }
}

/// Drives managed resources towards their desired state.
#[derive(Debug)]
pub struct Reconciler<T> {
    directory: FunctionDirectory<T>,
    deployer: FunctionDeployer<T>,
}

impl<T> Clone for Reconciler<T> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
            deployer: self.deployer.clone(),
        }
    }
}

impl<T: Transport> Reconciler<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            directory: FunctionDirectory::new(Arc::clone(&transport)),
            deployer: FunctionDeployer::new(transport),
        }
    }

    pub fn directory(&self) -> &FunctionDirectory<T> {
        &self.directory
    }

    pub fn deployer(&self) -> &FunctionDeployer<T> {
        &self.deployer
    }

    /// Upload the desired function, record its identity, then confirm with a read.
    ///
    /// The identity is derived before any remote call, so an unreadable
    /// artifact fails the operation without touching the platform.
    pub async fn create(&self, resource: &mut ManagedResource) -> FnsyncResult<ReadOutcome> {
        let desired = identity::derive_from_desired(&resource.desired)?;

        tracing::info!(
            resource = %resource.key(),
            function = %resource.desired.name,
            identity = %desired,
            "Creating function"
        );

        self.deploy(resource, desired).await
    }

    /// Compare the desired identity with what the platform reports for the name.
    ///
    /// On a match the handle is (re)set to the desired identity; otherwise it is
    /// cleared and the resource is Absent. Remote failures are returned, never
    /// reported as absence.
    pub async fn read(&self, resource: &mut ManagedResource) -> FnsyncResult<ReadOutcome> {
        let desired = identity::derive_from_desired(&resource.desired)?;
        let actual = self
            .directory
            .find_by_name(&resource.desired.address, &resource.desired.name)
            .await?;

        if actual.as_ref() == Some(&desired) {
            resource.handle.set(desired);
            resource.state.settle(ResourceState::Present)?;
            return Ok(ReadOutcome::InSync);
        }

        match &actual {
            None => tracing::info!(
                resource = %resource.key(),
                function = %resource.desired.name,
                "Function not deployed"
            ),
            Some(actual) => tracing::info!(
                resource = %resource.key(),
                function = %resource.desired.name,
                desired = %desired,
                actual = %actual,
                "Drift detected"
            ),
        }

        resource.handle.clear();
        resource.state.settle(ResourceState::Absent)?;
        Ok(ReadOutcome::Drifted { actual })
    }

    /// Replace the deployment behind the resource's current handle with the
    /// desired one.
    ///
    /// The deployment matching the old handle is deleted first, which also
    /// removes it when the function was renamed. The function is briefly
    /// absent between the delete and the upload.
    pub async fn update(&self, resource: &mut ManagedResource) -> FnsyncResult<ReadOutcome> {
        let desired = identity::derive_from_desired(&resource.desired)?;

        // Without a handle there is nothing to replace; upload as a create.
        if let Some(prior) = resource.handle.identity().cloned() {
            resource.state.settle(ResourceState::Replacing)?;

            let stale = self
                .directory
                .find_by_identity(&resource.desired.address, &prior)
                .await?;

            match stale {
                Some(old_name) => {
                    tracing::info!(
                        resource = %resource.key(),
                        old = %old_name,
                        new = %resource.desired.name,
                        "Removing stale deployment"
                    );
                    self.deployer
                        .delete(&resource.desired.address, &old_name)
                        .await?;
                }
                None => tracing::debug!(
                    resource = %resource.key(),
                    handle = %prior,
                    "No deployment matches the previous handle"
                ),
            }
        }

        self.deploy(resource, desired).await
    }

    /// Delete the function and clear the handle.
    ///
    /// Always succeeds from the caller's point of view; a failed delete is
    /// logged and the handle is cleared regardless.
    pub async fn delete(&self, resource: &mut ManagedResource) -> FnsyncResult<()> {
        // Failures are already logged; the handle is cleared either way.
        let _ = self
            .delete_deployment(
                resource.key(),
                &resource.desired.address,
                &resource.desired.name,
            )
            .await;

        resource.handle.clear();
        resource.state.settle(ResourceState::Absent)?;
        Ok(())
    }

    /// Delete a deployment known only by its address and name.
    ///
    /// A resource remembered from an earlier run but gone from the manifest
    /// has no artifact or thread count left, so it cannot be a
    /// [`ManagedResource`]. The error is returned for accounting after being
    /// logged.
    pub async fn delete_deployment(
        &self,
        key: &str,
        address: &PlatformAddress,
        name: &FunctionName,
    ) -> Result<(), RemoteError> {
        let result = self.deployer.delete(address, name).await;
        if let Err(e) = &result {
            tracing::warn!(
                resource = %key,
                function = %name,
                error = %e,
                "Delete failed, forgetting deployment anyway"
            );
        }
        result
    }

    async fn deploy(
        &self,
        resource: &mut ManagedResource,
        desired: Identity,
    ) -> FnsyncResult<ReadOutcome> {
        let target = &resource.desired;
        self.deployer
            .upload(
                &target.address,
                &target.name,
                &target.artifact_path,
                target.thread_count,
                target.environment.as_ref(),
            )
            .await?;

        resource.handle.set(desired);

        let outcome = self.read(resource).await?;
        if !outcome.is_in_sync() {
            tracing::warn!(
                resource = %resource.key(),
                function = %resource.desired.name,
                "Platform does not report the uploaded configuration"
            );
        }
        Ok(outcome)
    }
}
