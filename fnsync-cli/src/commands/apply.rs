// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fnsync apply` command - Converge the platform to the manifest.
//!
//! Resources are reconciled concurrently; names are unique per address, so
//! they never touch the same deployment. The state file is saved even when
//! some resources fail.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use fnsync_core::{
    Config, ConfigLoader, FnsyncError, FnsyncResult, FunctionConfig, HandleStore, HttpTransport,
    ManagedResource, Reconciler, StoredResource, Transport,
};

use crate::metrics;
use crate::planner::{self, Action};

pub async fn execute(
    config_path: &str,
    state_path: &str,
    prune: bool,
    metrics_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, state = %state_path, prune = prune, "Applying manifest");

    let config = ConfigLoader::load_file(config_path)?;
    let store = Arc::new(HandleStore::load(state_path)?);
    let transport = Arc::new(HttpTransport::new(config.platform.request_timeout)?);
    let reconciler = Reconciler::new(transport);

    let outcomes = reconcile_all(&reconciler, &store, &config.functions).await;

    let mut failed = 0usize;
    for (key, outcome) in &outcomes {
        match outcome {
            Ok(action) => println!("✓ {:<24} {}", key, action),
            Err(message) => {
                failed += 1;
                println!("✗ {:<24} {}", key, message);
            }
        }
    }

    if prune {
        for key in prune_orphans(&reconciler, &store, &config).await {
            println!("✓ {:<24} deleted (no longer in manifest)", key);
        }
    }

    store.save(state_path)?;

    if let Some(path) = metrics_file {
        metrics::write_textfile(Path::new(path))?;
    }

    println!();
    println!(
        "Applied {} resource(s), {} failed",
        outcomes.len() - failed,
        failed
    );

    if failed > 0 {
        return Err(format!("{} resource(s) failed to reconcile", failed).into());
    }
    Ok(())
}

/// Outcome of one resource: the action taken, or a printable failure.
type Outcome = Result<Action, String>;

/// Reconcile every manifest entry concurrently, sorted by key.
///
/// A task that panics is reported as a failure of its own resource; the
/// handles recorded by the others are kept.
async fn reconcile_all<T: Transport + 'static>(
    reconciler: &Reconciler<T>,
    store: &Arc<HandleStore>,
    functions: &[FunctionConfig],
) -> Vec<(String, Outcome)> {
    let mut tasks = JoinSet::new();
    let mut keys = HashMap::new();

    for func in functions.iter().cloned() {
        let key = func.key.clone();
        let reconciler = reconciler.clone();
        let store = Arc::clone(store);
        let handle = tasks.spawn(async move { apply_one(&reconciler, &store, &func).await });
        keys.insert(handle.id(), key);
    }

    let mut outcomes = Vec::with_capacity(functions.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, Ok(action))) => (id, Ok(action)),
            Ok((id, Err(e))) => {
                let hint = if e.is_retryable() { " (retryable)" } else { "" };
                (id, Err(format!("{}{}", e, hint)))
            }
            Err(e) => {
                tracing::error!(error = %e, "Reconcile task aborted");
                (e.id(), Err(format!("task aborted: {}", e)))
            }
        };
        outcomes.push((keys.remove(&id).unwrap_or_default(), outcome));
    }

    outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    outcomes
}

/// Delete stored resources the manifest no longer names. Returns their keys.
async fn prune_orphans<T: Transport>(
    reconciler: &Reconciler<T>,
    store: &HandleStore,
    config: &Config,
) -> Vec<String> {
    let mut pruned = Vec::new();
    for key in store.keys() {
        if config.function(&key).is_some() {
            continue;
        }
        if let Some(stored) = store.remove(&key) {
            remove_stored(reconciler, &key, &stored).await;
            pruned.push(key);
        }
    }
    pruned
}

/// Reconcile one manifest entry and record its new handle.
async fn apply_one<T: Transport>(
    reconciler: &Reconciler<T>,
    store: &HandleStore,
    func: &FunctionConfig,
) -> FnsyncResult<Action> {
    let started = Instant::now();
    let stored = store.get(&func.key);

    let plan = planner::decide(reconciler, func, stored.as_ref())
        .await
        .inspect_err(metrics::record_failure)?;

    let result = match plan.action {
        Action::Noop => {
            if let Some(refreshed) = &plan.refreshed {
                store.put(func.key.clone(), StoredResource::from_resource(refreshed));
            }
            return Ok(Action::Noop);
        }
        Action::Create => {
            let mut resource = ManagedResource::new(func.key.clone(), func.desired.clone());
            let result = reconciler.create(&mut resource).await;
            record(store, &resource, &result);
            result
        }
        Action::Move => {
            if let Some(stored) = &stored {
                remove_stored(reconciler, &func.key, stored).await;
            }
            let mut resource = ManagedResource::new(func.key.clone(), func.desired.clone());
            let result = reconciler.create(&mut resource).await;
            record(store, &resource, &result);
            result
        }
        Action::Update(_) => {
            metrics::DRIFT_DETECTED.inc();
            let handle = stored.map(|s| s.handle).unwrap_or_default();
            let mut resource =
                ManagedResource::with_handle(func.key.clone(), func.desired.clone(), handle);
            let result = reconciler.update(&mut resource).await;
            record(store, &resource, &result);
            result
        }
    };

    match result {
        Ok(_) => {
            let operation = match plan.action {
                Action::Update(_) => "update",
                _ => "create",
            };
            metrics::record_operation(operation, started.elapsed().as_secs_f64());
            Ok(plan.action)
        }
        Err(e) => {
            metrics::record_failure(&e);
            Err(e)
        }
    }
}

/// Persist the outcome of a create or update.
///
/// A failed operation leaves the previous record untouched so the next run
/// retries from the same handle.
fn record<R>(store: &HandleStore, resource: &ManagedResource, result: &FnsyncResult<R>) {
    if result.is_err() {
        return;
    }

    if resource.handle().is_present() {
        store.put(resource.key(), StoredResource::from_resource(resource));
    } else {
        store.remove(resource.key());
    }
}

/// Delete a resource known only from the state file.
pub(crate) async fn remove_stored<T: Transport>(
    reconciler: &Reconciler<T>,
    key: &str,
    stored: &StoredResource,
) {
    let started = Instant::now();
    match reconciler
        .delete_deployment(key, &stored.address, &stored.name)
        .await
    {
        Ok(()) => metrics::record_operation("delete", started.elapsed().as_secs_f64()),
        Err(e) => metrics::record_failure(&FnsyncError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnsync_core::transport::{Endpoint, PlatformCall, Request, Response};
    use fnsync_core::{MemoryPlatform, PlatformAddress, RemoteError};

    fn config(dir: &std::path::Path, functions: &[(&str, &str, &str, u32)]) -> Config {
        std::fs::write(dir.join("fn.tar.gz"), b"hello").unwrap();
        let mut yaml = String::from("functions:\n");
        for (key, address, name, threads) in functions {
            yaml.push_str(&format!(
                "  {}:\n    name: {}\n    address: {}\n    tarball_path: {}\n    num_threads: {}\n",
                key,
                name,
                address,
                dir.join("fn.tar.gz").display(),
                threads
            ));
        }
        ConfigLoader::load_string(&yaml).unwrap()
    }

    fn address(address: &str) -> PlatformAddress {
        PlatformAddress::new(address).unwrap()
    }

    #[tokio::test]
    async fn test_create_records_handle() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = Reconciler::new(Arc::new(MemoryPlatform::new()));
        let store = HandleStore::new();
        let config = config(dir.path(), &[("greet", "10.0.0.5", "greet", 4)]);

        let action = apply_one(&reconciler, &store, &config.functions[0])
            .await
            .unwrap();
        assert_eq!(action, Action::Create);
        assert!(store.get("greet").unwrap().handle.is_present());

        let action = apply_one(&reconciler, &store, &config.functions[0])
            .await
            .unwrap();
        assert_eq!(action, Action::Noop);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let reconciler = Reconciler::new(Arc::clone(&platform));
        let store = HandleStore::new();

        let before = config(dir.path(), &[("greet", "10.0.0.5", "greet", 4)]);
        apply_one(&reconciler, &store, &before.functions[0])
            .await
            .unwrap();
        let recorded = store.get("greet").unwrap();

        platform.reject(Endpoint::Upload, 500);
        let after = config(dir.path(), &[("greet", "10.0.0.5", "greet", 8)]);
        let err = apply_one(&reconciler, &store, &after.functions[0])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.get("greet").unwrap(), recorded);

        // The next run retries from the old handle and converges.
        platform.clear_rejections();
        let action = apply_one(&reconciler, &store, &after.functions[0])
            .await
            .unwrap();
        assert_eq!(action, Action::Update(planner::UpdateReason::Missing));
        assert_eq!(platform.functions(&address("10.0.0.5"))[0].threads, 8);
        assert_ne!(store.get("greet").unwrap(), recorded);
    }

    #[tokio::test]
    async fn test_unconfirmed_deploy_forgets_record() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let reconciler = Reconciler::new(Arc::clone(&platform));
        let store = HandleStore::new();

        let before = config(dir.path(), &[("greet", "10.0.0.5", "greet", 4)]);
        apply_one(&reconciler, &store, &before.functions[0])
            .await
            .unwrap();

        platform.set_drop_uploads(true);
        let after = config(dir.path(), &[("greet", "10.0.0.5", "greet", 8)]);
        apply_one(&reconciler, &store, &after.functions[0])
            .await
            .unwrap();

        assert!(platform.functions(&address("10.0.0.5")).is_empty());
        assert!(store.get("greet").is_none());
    }

    #[tokio::test]
    async fn test_address_change_deletes_before_create() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let reconciler = Reconciler::new(Arc::clone(&platform));
        let store = HandleStore::new();

        let before = config(dir.path(), &[("greet", "10.0.0.5", "greet", 4)]);
        apply_one(&reconciler, &store, &before.functions[0])
            .await
            .unwrap();
        platform.clear_calls();

        let after = config(dir.path(), &[("greet", "10.0.0.6", "greet", 4)]);
        let action = apply_one(&reconciler, &store, &after.functions[0])
            .await
            .unwrap();
        assert_eq!(action, Action::Move);

        let mutations: Vec<PlatformCall> = platform
            .calls()
            .into_iter()
            .filter(|c| !matches!(c, PlatformCall::List))
            .collect();
        assert_eq!(
            mutations,
            vec![
                PlatformCall::Delete {
                    name: "greet".to_string()
                },
                PlatformCall::Upload {
                    name: "greet".to_string()
                },
            ]
        );
        assert!(platform.functions(&address("10.0.0.5")).is_empty());
        assert_eq!(platform.functions(&address("10.0.0.6")).len(), 1);
        assert_eq!(store.get("greet").unwrap().address, address("10.0.0.6"));
    }

    #[tokio::test]
    async fn test_prune_deletes_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let reconciler = Reconciler::new(Arc::clone(&platform));
        let store = HandleStore::new();

        let both = config(
            dir.path(),
            &[("greet", "10.0.0.5", "greet", 4), ("old", "10.0.0.5", "old", 1)],
        );
        for func in &both.functions {
            apply_one(&reconciler, &store, func).await.unwrap();
        }

        let kept = config(dir.path(), &[("greet", "10.0.0.5", "greet", 4)]);
        let pruned = prune_orphans(&reconciler, &store, &kept).await;

        assert_eq!(pruned, vec!["old".to_string()]);
        assert_eq!(store.keys(), vec!["greet".to_string()]);
        let names: Vec<String> = platform
            .functions(&address("10.0.0.5"))
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["greet".to_string()]);
    }

    /// Memory platform that panics on any request to one address.
    struct Panicking {
        inner: MemoryPlatform,
        address: PlatformAddress,
    }

    impl Transport for Panicking {
        async fn send(
            &self,
            address: &PlatformAddress,
            request: Request,
        ) -> Result<Response, RemoteError> {
            if *address == self.address {
                panic!("control plane handler crashed");
            }
            self.inner.send(address, request).await
        }
    }

    #[tokio::test]
    async fn test_panicked_task_is_a_resource_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Panicking {
            inner: MemoryPlatform::new(),
            address: address("10.0.0.9"),
        });
        let reconciler = Reconciler::new(transport);
        let store = Arc::new(HandleStore::new());
        let config = config(
            dir.path(),
            &[("broken", "10.0.0.9", "broken", 1), ("greet", "10.0.0.5", "greet", 4)],
        );

        let outcomes = reconcile_all(&reconciler, &store, &config.functions).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].0, "broken");
        assert!(outcomes[0].1.is_err());
        assert_eq!(outcomes[1], ("greet".to_string(), Ok(Action::Create)));
        assert!(store.get("greet").unwrap().handle.is_present());
        assert!(store.get("broken").is_none());
    }
}
