// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnsync destroy` command - Delete every managed function.

use std::sync::Arc;

use fnsync_core::transport::DEFAULT_REQUEST_TIMEOUT;
use fnsync_core::{ConfigLoader, HandleStore, HttpTransport, Reconciler};

use super::apply::remove_stored;

pub async fn execute(
    config_path: &str,
    state_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = HandleStore::load(state_path)?;

    if store.is_empty() {
        println!("No managed functions in {}.", state_path);
        return Ok(());
    }

    // The manifest only supplies the request deadline here.
    let request_timeout = match ConfigLoader::load_file(config_path) {
        Ok(config) => config.platform.request_timeout,
        Err(e) => {
            tracing::debug!(error = %e, "Manifest unavailable, using default request timeout");
            DEFAULT_REQUEST_TIMEOUT
        }
    };

    let transport = Arc::new(HttpTransport::new(request_timeout)?);
    let reconciler = Reconciler::new(transport);

    for key in store.keys() {
        if let Some(stored) = store.remove(&key) {
            remove_stored(&reconciler, &key, &stored).await;
            println!("✓ {:<24} deleted {} on {}", key, stored.name, stored.address);
        }
    }

    store.save(state_path)?;
    println!();
    println!("All managed functions destroyed.");
    Ok(())
}
