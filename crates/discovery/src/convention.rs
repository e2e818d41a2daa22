//! File-routing conventions
//!
//! Two layouts are understood:
//!
//! - **App** (`app/`): nested directories, each route's leaf file is
//!   `page.<ext>`. Parenthesised directories such as `(marketing)` are
//!   route groups and never appear in the URL.
//! - **Pages** (`pages/`): every source file is a route, `index` maps to
//!   its directory. `_app`, `_document`, and the `api/` subtree are not
//!   pages.

use std::path::{Component, Path};

/// Source extensions recognised under both routing roots
pub const ROUTE_EXTENSIONS: [&str; 4] = ["tsx", "jsx", "ts", "js"];

/// Directories never descended into
pub const IGNORED_DIRS: [&str; 1] = ["node_modules"];

const APP_LEAF_STEM: &str = "page";
const PAGES_SPECIAL_FILES: [&str; 2] = ["_app", "_document"];
const PAGES_API_DIR: &str = "api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    App,
    Pages,
}

impl Convention {
    /// Discovery order
    pub const ALL: [Convention; 2] = [Convention::App, Convention::Pages];

    /// Routing root, relative to the project root
    pub fn root_dir(&self) -> &'static str {
        match self {
            Convention::App => "app",
            Convention::Pages => "pages",
        }
    }

    /// Route path for a file given relative to the routing root.
    ///
    /// Returns `None` when the file is not a route under this convention.
    pub fn route_for(&self, relative: &Path) -> Option<String> {
        let mut segments = path_segments(relative)?;
        if segments.iter().any(|s| IGNORED_DIRS.contains(&s.as_str())) {
            return None;
        }

        let file = segments.pop()?;
        let (stem, ext) = split_extension(&file)?;
        if !ROUTE_EXTENSIONS.contains(&ext) {
            return None;
        }

        match self {
            Convention::App => {
                if stem != APP_LEAF_STEM {
                    return None;
                }
                segments.retain(|s| !is_route_group(s));
            }
            Convention::Pages => {
                if segments.is_empty() && PAGES_SPECIAL_FILES.contains(&stem) {
                    return None;
                }
                if segments.first().map(String::as_str) == Some(PAGES_API_DIR) {
                    return None;
                }
                if stem != "index" {
                    segments.push(stem.to_string());
                }
            }
        }

        Some(normalize_route(&segments.join("/")))
    }
}

/// Canonical form: exactly one leading `/`, no trailing `/`, `/` for the root.
pub fn normalize_route(raw: &str) -> String {
    let joined = raw
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", joined)
}

/// `(group)` segments organise files without affecting the URL
pub fn is_route_group(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('(') && segment.ends_with(')')
}

/// Names of the `[placeholder]` segments still present in a path
pub fn placeholders(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                names.push(after[..close].to_string());
                rest = &after[close + 1..];
            }
            None => {
                names.push(after.to_string());
                break;
            }
        }
    }
    names
}

fn path_segments(relative: &Path) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(segments)
}

fn split_extension(file: &str) -> Option<(&str, &str)> {
    let dot = file.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some((&file[..dot], &file[dot + 1..]))
}
