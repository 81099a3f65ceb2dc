// ABOUTME: Library root for keel - exposes public types for the CLI and tests.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod crypto;
pub mod deploy;
pub mod error;
pub mod labels;
pub mod manifest;
pub mod model;
pub mod output;
pub mod runtime;
pub mod store;
pub mod types;
