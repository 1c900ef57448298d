//! Source file watching for `-watch` rebuilds
//!
//! Watches the parent directories of a set of files and reports changes to
//! those files only. Bursts of events (editors often write a file in several
//! steps) are collapsed into one change set.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::ConfigError;

/// Default debounce window in milliseconds
const DEBOUNCE_MS: u64 = 100;

/// Watches a fixed set of files
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<PathBuf>,
    debounce: Duration,
    files: HashSet<PathBuf>,
}

impl SourceWatcher {
    pub fn new<I>(files: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        SourceWatcherBuilder::new().build(files)
    }

    /// Files being watched
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Block until a watched file changes, then collect everything else that
    /// changes within the debounce window. `None` if the watcher shut down.
    pub fn wait(&self) -> Option<BTreeSet<PathBuf>> {
        let first = self.receiver.recv().ok()?;
        let mut changed = BTreeSet::from([first]);

        let deadline = Instant::now() + self.debounce;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(path) => {
                    changed.insert(path);
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Some(changed)
    }

    /// Changes already reported, without blocking
    pub fn drain(&self) -> BTreeSet<PathBuf> {
        self.receiver.try_iter().collect()
    }
}

/// Builder for creating a SourceWatcher with custom options
pub struct SourceWatcherBuilder {
    debounce_ms: u64,
}

impl Default for SourceWatcherBuilder {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
        }
    }
}

impl SourceWatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set debounce duration in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn build<I>(self, files: I) -> Result<SourceWatcher, ConfigError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let files: HashSet<PathBuf> = files
            .into_iter()
            .map(|path| path.canonicalize().unwrap_or(path))
            .collect();
        let (tx, rx) = mpsc::channel();

        let watched = files.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    for path in event.paths {
                        if watched.contains(&path) {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => log::error!("Watch error: {:?}", e),
            }
        })
        .map_err(|e| ConfigError::WatchError(e.to_string()))?;

        let directories: BTreeSet<&Path> = files.iter().filter_map(|f| f.parent()).collect();
        for dir in &directories {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| ConfigError::WatchError(format!("{}: {}", dir.display(), e)))?;
        }
        log::info!(
            "Watching {} file(s) in {} director(ies)",
            files.len(),
            directories.len()
        );

        Ok(SourceWatcher {
            _watcher: watcher,
            receiver: rx,
            debounce: Duration::from_millis(self.debounce_ms),
            files,
        })
    }
}
