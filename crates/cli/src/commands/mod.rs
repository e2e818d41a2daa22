//! CLI Commands

pub mod batch;
pub mod dev;
pub mod lighthouse;
pub mod propose;
pub mod routes;
pub mod run;
