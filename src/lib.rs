//! Reference-fixture generation pipeline for external command-line tools.
//!
//! The pipeline discovers a tool's option surface from its documentation,
//! plans budget-bounded invocation scenarios across complexity tiers,
//! executes each scenario inside a Docker container, and persists the
//! results as content-addressed JSON fixtures with a manifest index.

pub mod artifacts;
pub mod cli;
pub mod combine;
pub mod config;
pub mod discover;
pub mod enrich;
pub mod pipeline;
pub mod plan;
pub mod runner;
pub mod schema;
pub mod store;
pub mod util;
