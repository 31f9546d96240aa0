use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;
use tracing::{error, info, warn};

/// Quiet period after the first event before `on_change` runs
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Calls `on_change` when the config file or agent directory changes
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl ConfigWatcher {
    pub fn new<F>(paths: Vec<PathBuf>, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (tx, rx) = channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        let mut watched = Vec::new();
        for path in paths {
            if path.exists() {
                let mode = if path.is_dir() {
                    RecursiveMode::Recursive
                } else {
                    RecursiveMode::NonRecursive
                };
                watcher.watch(&path, mode)?;
                info!(path = %path.display(), "Watching configuration path");
                watched.push(path);
            } else {
                warn!(path = %path.display(), "Configuration path does not exist, skipping");
            }
        }

        std::thread::spawn(move || loop {
            match rx.recv() {
                Ok(Ok(event)) => {
                    if !is_content_change(&event.kind) {
                        continue;
                    }
                    // Editors write in bursts; drain them before reloading
                    std::thread::sleep(DEBOUNCE);
                    while rx.try_recv().is_ok() {}
                    info!("Configuration change detected, reloading");
                    on_change();
                }
                Ok(Err(e)) => error!("Watch error: {:?}", e),
                Err(_) => break,
            }
        });

        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }

    /// Paths that exist and are being watched
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};

    #[test]
    fn test_missing_paths_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("consilium.toml");
        std::fs::write(&file, "").unwrap();

        let watcher = ConfigWatcher::new(vec![file.clone(), dir.path().join("nope")], || {}).unwrap();
        assert_eq!(watcher.watched(), &[file]);
    }

    #[test]
    fn test_content_change_kinds() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }
}
