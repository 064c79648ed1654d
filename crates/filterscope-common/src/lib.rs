//! # filterscope-common
//!
//! Shared types, error definitions, run configuration and constants
//! used across the filterscope workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and carries no platform-specific code, so the decoding
//! crates can be tested anywhere.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
