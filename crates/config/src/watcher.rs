use crate::schema::Config;
use arc_swap::ArcSwap;
use std::{path::PathBuf, sync::Arc};

/// Watches a configuration file and hot-reloads tenant settings on change.
///
/// Reloads re-apply the `TENANTGATE_*` environment layer, so env overrides
/// survive edits to the file.
pub struct ConfigWatcher {
    /// Current configuration, atomically swappable.
    current: Arc<ArcSwap<Config>>,
    /// Path to the configuration file.
    path: PathBuf,
}

impl ConfigWatcher {
    /// Creates a new watcher from a file path, loading the initial configuration immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the configuration file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn new(path: PathBuf) -> Result<Self, figment::Error> {
        let config = Config::load(Some(&path))?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            path,
        })
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn load(&self) -> arc_swap::Guard<Arc<Config>> {
        self.current.load()
    }

    /// Returns a shareable `ArcSwap` handle (for use in axum `AppState`).
    #[must_use]
    pub fn arc(&self) -> Arc<ArcSwap<Config>> {
        Arc::clone(&self.current)
    }

    /// Reloads the configuration from disk. The previous snapshot stays in
    /// place when the new file does not parse.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the configuration file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn reload(&self) -> Result<(), figment::Error> {
        let new_config = Config::load(Some(&self.path))?;
        self.current.store(Arc::new(new_config));
        tracing::info!(path = %self.path.display(), "configuration reloaded");
        Ok(())
    }

    /// Starts background file watching on a blocking tokio task.
    ///
    /// Watcher setup failures are logged and leave the current snapshot in
    /// place; the gateway keeps serving with the configuration it has.
    pub fn watch(self: Arc<Self>) {
        use notify::{RecursiveMode, Watcher as _};
        let watcher_self = Arc::clone(&self);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let (tx, rx) = std::sync::mpsc::channel();
            let mut watcher =
                match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                    if let Ok(event) = res
                        && (event.kind.is_modify() || event.kind.is_create())
                    {
                        let _ = tx.send(());
                    }
                }) {
                    Ok(w) => w,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create config watcher");
                        return;
                    }
                };

            if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                tracing::error!(path = %path.display(), error = %e, "failed to watch config file");
                return;
            }

            for () in rx {
                if let Err(e) = watcher_self.reload() {
                    tracing::warn!(error = %e, "config reload failed, keeping previous snapshot");
                }
            }
        });
    }
}
