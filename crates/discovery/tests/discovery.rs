//! Route discovery against real project trees on disk

use std::fs;
use std::path::Path;

use autosmoke_discovery::{write_manifest, RouteDiscovery};
use tempfile::TempDir;

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "export default function Page() {}\n").unwrap();
}

fn write_config(root: &Path, yaml: &str) {
    fs::write(root.join(".smoke.yml"), yaml).unwrap();
}

fn paths(discovery: &RouteDiscovery) -> Vec<String> {
    discovery
        .discover_routes()
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect()
}

#[test]
fn discovers_both_conventions_in_order() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/page.tsx");
    touch(root, "app/(marketing)/pricing/page.tsx");
    touch(root, "app/dashboard/page.jsx");
    touch(root, "app/dashboard/layout.tsx");
    touch(root, "pages/legacy.tsx");
    touch(root, "pages/blog/index.js");
    touch(root, "pages/_app.tsx");
    touch(root, "pages/_document.tsx");
    touch(root, "pages/api/health.ts");
    touch(root, "app/node_modules/lib/page.js");

    let discovery = RouteDiscovery::new(root).unwrap();

    // app/ sorted lexicographically by relative path, then pages/
    assert_eq!(
        paths(&discovery),
        vec!["/pricing", "/dashboard", "/", "/blog", "/legacy"]
    );
}

#[test]
fn discovery_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/a/page.tsx");
    touch(root, "app/b/page.tsx");
    touch(root, "pages/c.tsx");
    write_config(root, "routes:\n  /declared:\n");

    let discovery = RouteDiscovery::new(root).unwrap();
    let first = discovery.discover_routes().unwrap();
    let second = discovery.discover_routes().unwrap();
    assert_eq!(first, second);
}

#[test]
fn dynamic_route_resolved_from_sample_params() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/items/[id]/page.tsx");
    write_config(
        root,
        r#"
routes:
  '/items/[id]':
    sample_params:
      id: "42"
"#,
    );

    let result = RouteDiscovery::new(root).unwrap().discover().unwrap();
    assert_eq!(result.routes.len(), 1);
    assert_eq!(result.routes[0].path, "/items/42");
    assert!(!result.routes[0].is_dynamic);
    assert!(result.skipped.is_empty());
}

#[test]
fn dynamic_route_without_params_is_dropped_and_reported() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/items/[id]/page.tsx");
    touch(root, "app/about/page.tsx");

    let result = RouteDiscovery::new(root).unwrap().discover().unwrap();
    let routes: Vec<_> = result.routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(routes, vec!["/about"]);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].path, "/items/[id]");
    assert_eq!(result.skipped[0].unresolved, vec!["id"]);
}

#[test]
fn route_config_overrides_defaults() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/settings/page.tsx");
    touch(root, "app/profile/page.tsx");
    write_config(
        root,
        r#"
defaults:
  must_exist: ['main']
  must_not_error: false
routes:
  /settings:
    must_exist: ['[data-testid="settings-form"]']
"#,
    );

    let routes = RouteDiscovery::new(root).unwrap().discover_routes().unwrap();
    let settings = routes.iter().find(|r| r.path == "/settings").unwrap();
    let profile = routes.iter().find(|r| r.path == "/profile").unwrap();

    assert_eq!(
        settings.config.must_exist,
        Some(vec!["[data-testid=\"settings-form\"]".to_string()])
    );
    // Not set on the route, so the default applies
    assert_eq!(settings.config.must_not_error, Some(false));
    assert_eq!(profile.config.must_exist, Some(vec!["main".to_string()]));
}

#[test]
fn config_only_routes_appended_after_file_routes() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "pages/about.tsx");
    write_config(
        root,
        r#"
defaults:
  must_not_error: false
routes:
  /about:
    must_exist: ['#about']
  /status:
  external/docs/:
"#,
    );

    let routes = RouteDiscovery::new(root).unwrap().discover_routes().unwrap();
    let listed: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(listed, vec!["/about", "/status", "/external/docs"]);

    // The file-derived /about wins; it still carries the route config
    assert_eq!(routes[0].source_file, root.join("pages/about.tsx"));
    assert_eq!(routes[0].config.must_exist, Some(vec!["#about".to_string()]));

    // Config-only routes have no backing file and still get defaults
    assert!(routes[2].is_config_only());
    assert_eq!(routes[2].config.must_not_error, Some(false));
}

#[test]
fn config_only_routes_keep_declaration_order() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/page.tsx");
    write_config(root, "routes:\n  /zeta:\n  /alpha:\n  /mid:\n");

    assert_eq!(
        paths(&RouteDiscovery::new(root).unwrap()),
        vec!["/", "/zeta", "/alpha", "/mid"]
    );
}

#[test]
fn non_canonical_config_keys_still_apply() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "pages/about.tsx");
    write_config(
        root,
        r#"
routes:
  /about/:
    must_exist: ['#about']
  team:
    must_exist: ['#team']
  /team/:
    must_exist: ['#people']
"#,
    );

    let discovery = RouteDiscovery::new(root).unwrap();
    let keys: Vec<_> = discovery.config().routes.keys().collect();
    assert_eq!(keys, vec!["/about", "/team"]);

    let routes = discovery.discover_routes().unwrap();
    let listed: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(listed, vec!["/about", "/team"]);
    assert_eq!(routes[0].source_file, root.join("pages/about.tsx"));
    assert_eq!(routes[0].config.must_exist, Some(vec!["#about".to_string()]));
    // Both spellings of /team collapse to one route; the later body wins
    assert_eq!(routes[1].config.must_exist, Some(vec!["#people".to_string()]));
}

#[test]
fn colliding_files_resolve_deterministically() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    // Both map to /about within the app convention
    touch(root, "app/(a)/about/page.tsx");
    touch(root, "app/(b)/about/page.tsx");

    let routes = RouteDiscovery::new(root).unwrap().discover_routes().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].source_file, root.join("app/(b)/about/page.tsx"));
}

#[test]
fn missing_config_and_routing_roots_yield_empty_result() {
    let tmp = TempDir::new().unwrap();
    let result = RouteDiscovery::new(tmp.path()).unwrap().discover().unwrap();
    assert!(result.routes.is_empty());
    assert!(result.skipped.is_empty());
}

#[test]
fn malformed_config_fails_construction() {
    let tmp = TempDir::new().unwrap();
    write_config(tmp.path(), "routes: [not, a, mapping]\n");
    assert!(RouteDiscovery::new(tmp.path()).is_err());
}

#[test]
fn manifest_round_trips_as_json() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    touch(root, "app/page.tsx");

    let routes = RouteDiscovery::new(root).unwrap().discover_routes().unwrap();
    let manifest = root.join(".cache/routes/generated.json");
    write_manifest(&routes, &manifest).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(manifest).unwrap()).unwrap();
    assert_eq!(json[0]["path"], "/");
    assert_eq!(json[0]["isDynamic"], false);
}
