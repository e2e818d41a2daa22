//! AutoSmoke Common Library
//!
//! Shared data model, configuration loading, and file IO for the
//! AutoSmoke workspace.

pub mod config;
pub mod error;
pub mod io;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use config::{AuthMode, AuthSection, DemoStep, RouteConfig, RouteOverrides, SmokeConfig, CONFIG_FILE_NAME};
pub use error::{Error, Result};
pub use io::{write_atomic, write_json};
pub use settings::RunnerConfig;
pub use types::*;
