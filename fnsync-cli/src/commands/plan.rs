// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnsync plan` command - Show what `apply` would do.
//!
//! Only reads from the platform; nothing is uploaded, deleted or persisted.

use std::sync::Arc;

use fnsync_core::{ConfigLoader, HandleStore, HttpTransport, Reconciler};

use crate::planner::{self, Action};

pub async fn execute(
    config_path: &str,
    state_path: &str,
    prune: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let store = HandleStore::load(state_path)?;
    let transport = Arc::new(HttpTransport::new(config.platform.request_timeout)?);
    let reconciler = Reconciler::new(transport);

    let mut changes = 0usize;
    for func in &config.functions {
        let stored = store.get(&func.key);
        let plan = planner::decide(&reconciler, func, stored.as_ref()).await?;

        if plan.action != Action::Noop {
            changes += 1;
        }
        println!(
            "  {:<24} {:<16} {}",
            func.key, func.desired.name, plan.action
        );
    }

    for key in store.keys() {
        if config.function(&key).is_some() {
            continue;
        }
        if let Some(stored) = store.get(&key) {
            let action = if prune {
                changes += 1;
                "delete"
            } else {
                "orphaned (use --prune to delete)"
            };
            println!("  {:<24} {:<16} {}", key, stored.name, action);
        }
    }

    println!();
    if changes == 0 {
        println!("✓ Platform matches the manifest");
    } else {
        println!("{} change(s) pending. Run `fnsync apply` to converge.", changes);
    }

    Ok(())
}
