//! AutoSmoke route discovery
//!
//! Infers the set of testable routes of a web application from its file
//! layout plus the declarative overrides in `.smoke.yml`.
//!
//! ```text
//! app/**/page.{tsx,jsx,ts,js}   ─┐
//! pages/**/*.{tsx,jsx,ts,js}    ─┼─> normalize ─> merge config ─> resolve [params] ─> routes
//! .smoke.yml routes (declared)  ─┘
//! ```

pub mod convention;
pub mod discovery;

pub use convention::{normalize_route, Convention, ROUTE_EXTENSIONS};
pub use discovery::{resolve_dynamic, write_manifest, Discovery, RouteDiscovery, SkippedRoute};
