// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Decides what each resource needs, without changing anything remotely.

use std::fmt;

use fnsync_core::identity;
use fnsync_core::{
    FnsyncResult, FunctionConfig, ManagedResource, ReadOutcome, Reconciler, StoredResource,
    Transport,
};

/// Why an existing resource has to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// The platform no longer has the function.
    Missing,
    /// The platform runs a different artifact or thread count.
    Drift,
    /// Only the environment mapping changed.
    Environment,
    /// The function name changed.
    Renamed,
}

/// Action a resource needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update(UpdateReason),
    /// The platform address changed; delete at the old address, create at the new.
    Move,
    Noop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update(UpdateReason::Missing) => write!(f, "update (missing on platform)"),
            Self::Update(UpdateReason::Drift) => write!(f, "update (drift)"),
            Self::Update(UpdateReason::Environment) => write!(f, "update (environment changed)"),
            Self::Update(UpdateReason::Renamed) => write!(f, "update (renamed)"),
            Self::Move => write!(f, "replace (address changed)"),
            Self::Noop => write!(f, "no changes"),
        }
    }
}

/// Result of planning one resource.
pub struct Plan {
    pub action: Action,
    /// The resource as refreshed from the platform, when a read was needed.
    pub refreshed: Option<ManagedResource>,
}

/// Compare the manifest entry with its stored handle and the platform.
pub async fn decide<T: Transport>(
    reconciler: &Reconciler<T>,
    func: &FunctionConfig,
    stored: Option<&StoredResource>,
) -> FnsyncResult<Plan> {
    let Some(stored) = stored.filter(|s| s.handle.is_present()) else {
        return Ok(Plan {
            action: Action::Create,
            refreshed: None,
        });
    };

    if stored.address != func.desired.address {
        return Ok(Plan {
            action: Action::Move,
            refreshed: None,
        });
    }

    let mut probe = ManagedResource::new(func.key.clone(), func.desired.clone());
    let outcome = reconciler.read(&mut probe).await?;

    let action = match outcome {
        ReadOutcome::Drifted { actual: None } => Action::Update(UpdateReason::Missing),
        ReadOutcome::Drifted { actual: Some(_) } => Action::Update(UpdateReason::Drift),
        ReadOutcome::InSync if stored.name != func.desired.name => {
            Action::Update(UpdateReason::Renamed)
        }
        ReadOutcome::InSync
            if stored.environment_digest
                != identity::environment_digest(func.desired.environment.as_ref()) =>
        {
            Action::Update(UpdateReason::Environment)
        }
        ReadOutcome::InSync => Action::Noop,
    };

    Ok(Plan {
        action,
        refreshed: Some(probe),
    })
}
