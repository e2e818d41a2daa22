//! AutoSmoke CLI
//!
//! Command-line interface for route discovery, smoke runs, Lighthouse
//! audits, and test proposals.

pub mod commands;
pub mod output;
