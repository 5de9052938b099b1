//! Policy file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::observability::metrics;
use crate::policy::{PolicyHandle, PolicyStore};

/// Watches the policy file and publishes a fresh [`PolicyStore`] on change.
pub struct PolicyWatcher {
    path: PathBuf,
    healthcheck_path: String,
    strict: bool,
    handle: PolicyHandle,
}

impl PolicyWatcher {
    /// Create a watcher that publishes into `handle`.
    pub fn new(
        path: &Path,
        healthcheck_path: impl Into<String>,
        strict: bool,
        handle: PolicyHandle,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            healthcheck_path: healthcheck_path.into(),
            strict,
            handle,
        }
    }

    /// Re-read the policy file and publish it.
    ///
    /// On failure the current store stays in place.
    pub fn reload(&self) -> bool {
        match PolicyStore::load_file(&self.path, self.healthcheck_path.clone(), self.strict) {
            Ok(store) => {
                tracing::info!(
                    path = %self.path.display(),
                    header_rules = store.header_rules().len(),
                    denied_paths = store.path_deny().len(),
                    "Policy reloaded"
                );
                metrics::record_policy_snapshot(&store);
                metrics::record_policy_reload(true);
                self.handle.replace(store);
                true
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to reload policy. Keeping current policy."
                );
                metrics::record_policy_reload(false);
                false
            }
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for reloads to happen.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Policy file change detected, reloading...");
                        self.reload();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Policy watcher started");
        Ok(watcher)
    }
}
