//! Route discovery engine
//!
//! Walks the `app/` and `pages/` routing roots, turns each route file
//! into a [`DiscoveredRoute`], adds routes declared only in
//! `.smoke.yml`, and resolves dynamic segments from `sample_params`.
//! Routes whose placeholders cannot be filled are dropped and reported
//! in [`Discovery::skipped`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use autosmoke_common::{DiscoveredRoute, Result, RouteConfig, RouteOverrides, SmokeConfig};

use crate::convention::{normalize_route, placeholders, Convention, IGNORED_DIRS};

/// Outcome of one discovery pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    /// Testable routes in discovery order
    pub routes: Vec<DiscoveredRoute>,

    /// Dynamic routes dropped for lack of sample parameters
    pub skipped: Vec<SkippedRoute>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRoute {
    pub path: String,
    pub source_file: PathBuf,
    /// Placeholder names left without a value
    pub unresolved: Vec<String>,
}

/// Discovers routes for one project.
///
/// The config is loaded once at construction and only read afterwards,
/// so a `RouteDiscovery` can be shared by reference across tasks.
#[derive(Debug, Clone)]
pub struct RouteDiscovery {
    project_root: PathBuf,
    config: SmokeConfig,
}

impl RouteDiscovery {
    /// Create a discovery engine, loading `.smoke.yml` if present
    pub fn new(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        let config = SmokeConfig::load(&project_root)?;
        Ok(Self::with_config(project_root, config))
    }

    /// Create a discovery engine with an already-loaded config.
    ///
    /// Override keys are rewritten to canonical route form here, so a key
    /// written as `/about/` applies to the discovered `/about`.
    pub fn with_config(project_root: impl Into<PathBuf>, mut config: SmokeConfig) -> Self {
        config.routes = canonical_overrides(std::mem::take(&mut config.routes));
        Self {
            project_root: project_root.into(),
            config,
        }
    }

    pub fn config(&self) -> &SmokeConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Discover routes, dropping unresolvable dynamic ones
    pub fn discover_routes(&self) -> Result<Vec<DiscoveredRoute>> {
        Ok(self.discover()?.routes)
    }

    /// Discover routes and report which dynamic routes were dropped
    pub fn discover(&self) -> Result<Discovery> {
        let mut table = RouteTable::default();

        for convention in Convention::ALL {
            for file in self.route_files(convention)? {
                let relative = file
                    .strip_prefix(self.project_root.join(convention.root_dir()))
                    .unwrap_or(&file);
                let Some(path) = convention.route_for(relative) else {
                    continue;
                };

                let route = DiscoveredRoute {
                    is_dynamic: path.contains('['),
                    config: self.config.resolve(&path),
                    path,
                    source_file: file,
                };
                table.insert_file_route(route);
            }
        }

        for (path, route_config) in &self.config.routes {
            if table.contains(path) {
                continue;
            }
            debug!("Adding config-only route {}", path);
            table.insert_declared_route(DiscoveredRoute {
                is_dynamic: path.contains('['),
                config: RouteConfig::merged(&self.config.defaults, route_config),
                path: path.clone(),
                source_file: PathBuf::new(),
            });
        }

        let mut discovery = Discovery::default();
        for route in table.into_routes() {
            match resolve_dynamic(route) {
                Ok(route) => discovery.routes.push(route),
                Err(skipped) => discovery.skipped.push(skipped),
            }
        }

        info!(
            "Discovered {} route(s) in {} ({} dynamic route(s) skipped)",
            discovery.routes.len(),
            self.project_root.display(),
            discovery.skipped.len()
        );
        Ok(discovery)
    }

    /// Candidate files under a routing root, sorted for reproducible order
    fn route_files(&self, convention: Convention) -> Result<Vec<PathBuf>> {
        let root = self.project_root.join(convention.root_dir());
        if !root.is_dir() {
            debug!("No {} directory in {}", convention.root_dir(), self.project_root.display());
            return Ok(Vec::new());
        }

        let mut files: Vec<(String, PathBuf)> = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && IGNORED_DIRS.iter().any(|d| e.file_name() == *d))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let key = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            files.push((key, path));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }
}

/// Routes keyed by path, preserving first-seen position
#[derive(Default)]
struct RouteTable {
    routes: Vec<DiscoveredRoute>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Later files replace earlier ones with the same path
    fn insert_file_route(&mut self, route: DiscoveredRoute) {
        match self.index.get(&route.path) {
            Some(&slot) => {
                warn!(
                    "Route {} from {} replaces the one from {}",
                    route.path,
                    route.source_file.display(),
                    self.routes[slot].source_file.display()
                );
                self.routes[slot] = route;
            }
            None => {
                self.index.insert(route.path.clone(), self.routes.len());
                self.routes.push(route);
            }
        }
    }

    fn insert_declared_route(&mut self, route: DiscoveredRoute) {
        if !self.contains(&route.path) {
            self.index.insert(route.path.clone(), self.routes.len());
            self.routes.push(route);
        }
    }

    fn into_routes(self) -> Vec<DiscoveredRoute> {
        self.routes
    }
}

/// Normalize override keys, keeping declaration order. Keys that collide
/// after normalization keep the first slot and the last body.
fn canonical_overrides(declared: RouteOverrides) -> RouteOverrides {
    let mut canonical = RouteOverrides::default();
    for (key, config) in declared {
        let path = normalize_route(&key);
        if path != key {
            debug!("Config route {} normalized to {}", key, path);
        }
        if canonical.insert(path.clone(), config).is_some() {
            warn!("Config route {} declared more than once (last as {}), using the last entry", path, key);
        }
    }
    canonical
}

/// Fill `[name]` placeholders from `sample_params`.
///
/// Each placeholder is replaced once, textually. A route that still has a
/// placeholder afterwards is returned as skipped.
pub fn resolve_dynamic(route: DiscoveredRoute) -> std::result::Result<DiscoveredRoute, SkippedRoute> {
    if !route.is_dynamic {
        return Ok(route);
    }

    let Some(params) = route.config.sample_params.as_ref() else {
        warn!("Skipping dynamic route {} - no sample_params provided", route.path);
        return Err(SkippedRoute {
            unresolved: placeholders(&route.path),
            path: route.path,
            source_file: route.source_file,
        });
    };

    let mut path = route.path.clone();
    for (name, value) in params {
        path = path.replacen(&format!("[{}]", name), value, 1);
    }

    if path.contains('[') {
        let unresolved = placeholders(&path);
        warn!(
            "Skipping dynamic route {} - sample_params missing {:?}",
            route.path, unresolved
        );
        return Err(SkippedRoute {
            path: route.path,
            source_file: route.source_file,
            unresolved,
        });
    }

    debug!("Resolved dynamic route {} -> {}", route.path, path);
    Ok(DiscoveredRoute {
        path,
        is_dynamic: false,
        ..route
    })
}

/// Persist the discovered route list as JSON
pub fn write_manifest(routes: &[DiscoveredRoute], path: &Path) -> Result<()> {
    autosmoke_common::write_json(path, routes)?;
    info!("Route manifest written to {}", path.display());
    Ok(())
}
