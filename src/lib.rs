// ABOUTME: Library root for kssh - exposes the tunnel core for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod directory;
pub mod error;
pub mod procedure;
pub mod prompt;
pub mod resolve;
pub mod ssh;
pub mod target;
