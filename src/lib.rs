// ABOUTME: Library root for lparclone - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod cloud;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod output;
pub mod poll;
pub mod provision;
pub mod types;
