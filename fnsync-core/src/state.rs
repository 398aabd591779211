// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resource state machine with typed state transitions.
//!
//! Lifecycle: Absent → Present → (drift) → Replacing → Present, with Absent as
//! both initial and terminal state. Only a deployed function can be replaced;
//! invalid transitions result in StateTransitionError.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Lifecycle states of a managed function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Not deployed, or deployed with a configuration other than the desired one.
    Absent,

    /// Deployed and matching the desired configuration.
    Present,

    /// Stale deployment removed, replacement upload in flight.
    Replacing,
}

impl ResourceState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Absent => "Absent",
            Self::Present => "Present",
            Self::Replacing => "Replacing",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: ResourceState) -> bool {
        matches!(
            (self, target),
            // From Absent
            (Self::Absent, Self::Present) |
            // From Present
            (Self::Present, Self::Absent) |
            (Self::Present, Self::Replacing) |
            // From Replacing
            (Self::Replacing, Self::Present) |
            (Self::Replacing, Self::Absent)
        )
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one managed function.
/// Enforces valid transitions and tracks timing.
#[derive(Debug)]
pub struct ResourceStateMachine {
    resource: String,
    current_state: ResourceState,
    last_transition: Instant,
    transition_count: u64,
}

impl ResourceStateMachine {
    /// Create a state machine starting in `initial`.
    pub fn new(resource: impl Into<String>, initial: ResourceState) -> Self {
        Self {
            resource: resource.into(),
            current_state: initial,
            last_transition: Instant::now(),
            transition_count: 0,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> ResourceState {
        self.current_state
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Get total number of transitions.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ResourceState) -> Result<(), StateTransitionError> {
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                resource: self.resource.clone(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            resource = %self.resource,
            from = self.current_state.name(),
            to = target.name(),
            held_ms = self.last_transition.elapsed().as_millis() as u64,
            "State transition"
        );

        self.current_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;

        Ok(())
    }

    /// Move to `target` unless already there.
    pub fn settle(&mut self, target: ResourceState) -> Result<(), StateTransitionError> {
        if self.current_state == target {
            return Ok(());
        }
        self.transition_to(target)
    }
}
