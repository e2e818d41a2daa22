//! Filesystem watching for the dev loop

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use autosmoke_common::CONFIG_FILE_NAME;

use crate::error::E2eResult;

/// Quiet period that ends a burst of changes
pub const DEBOUNCE: Duration = Duration::from_secs(2);

const ROUTE_EXTENSIONS: [&str; 4] = ["tsx", "jsx", "ts", "js"];
const IGNORED_COMPONENTS: [&str; 2] = ["node_modules", ".git"];
const ROUTE_DIRS: [&str; 2] = ["app", "pages"];

/// Whether a changed path can affect discovered routes or their config
pub fn is_watched_path(project_root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(project_root) else {
        return false;
    };

    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    if parts.iter().any(|p| IGNORED_COMPONENTS.contains(p)) {
        return false;
    }

    let has_route_extension = relative
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ROUTE_EXTENSIONS.contains(&e))
        .unwrap_or(false);

    match parts.as_slice() {
        [name] => *name == CONFIG_FILE_NAME,
        ["app", .., _] => {
            has_route_extension && relative.file_stem().and_then(|s| s.to_str()) == Some("page")
        }
        ["pages", .., _] => has_route_extension,
        _ => false,
    }
}

/// Watches `app/`, `pages/`, and `.smoke.yml` under a project root.
///
/// A route directory missing at startup is picked up once it is created.
pub struct RouteWatcher {
    project_root: PathBuf,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    debounce: Duration,
    watcher: RecommendedWatcher,
    route_dirs: BTreeSet<PathBuf>,
}

impl RouteWatcher {
    pub fn new(project_root: &Path) -> E2eResult<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        let mut route_dirs = BTreeSet::new();
        for dir in ROUTE_DIRS {
            let path = project_root.join(dir);
            if path.is_dir() {
                watcher.watch(&path, RecursiveMode::Recursive)?;
                route_dirs.insert(path);
            }
        }
        // The root itself, for .smoke.yml and route directories appearing
        watcher.watch(project_root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            project_root: project_root.to_path_buf(),
            events,
            debounce: DEBOUNCE,
            watcher,
            route_dirs,
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Wait for the next burst of relevant changes, returning the paths
    /// touched once the debounce window closes. `None` when the watcher
    /// has shut down.
    pub async fn next_change(&mut self) -> Option<Vec<PathBuf>> {
        let mut changed = BTreeSet::new();

        while changed.is_empty() {
            let event = self.events.recv().await?;
            self.collect(event, &mut changed);
        }

        loop {
            match tokio::time::timeout(self.debounce, self.events.recv()).await {
                Ok(Some(event)) => self.collect(event, &mut changed),
                Ok(None) | Err(_) => break,
            }
        }

        Some(changed.into_iter().collect())
    }

    fn collect(&mut self, event: notify::Result<Event>, changed: &mut BTreeSet<PathBuf>) {
        match event {
            Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                for path in event.paths {
                    if self.is_new_route_dir(&path) {
                        self.watch_route_dir(path, changed);
                    } else if is_watched_path(&self.project_root, &path) {
                        debug!("{:?}: {}", event.kind, path.display());
                        changed.insert(path);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Watch error: {}", e),
        }
    }

    fn is_new_route_dir(&self, path: &Path) -> bool {
        path.parent() == Some(self.project_root.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| ROUTE_DIRS.contains(&n))
                .unwrap_or(false)
            && !self.route_dirs.contains(path)
            && path.is_dir()
    }

    /// Start watching a route directory created after startup. Files written
    /// into it before the watch took hold are reported as changed.
    fn watch_route_dir(&mut self, dir: PathBuf, changed: &mut BTreeSet<PathBuf>) {
        if let Err(e) = self.watcher.watch(&dir, RecursiveMode::Recursive) {
            warn!("Failed to watch {}: {}", dir.display(), e);
            return;
        }
        info!("Watching new route directory {}", dir.display());

        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if entry.file_type().is_file() && is_watched_path(&self.project_root, path) {
                changed.insert(path.to_path_buf());
            }
        }
        self.route_dirs.insert(dir);
    }
}
