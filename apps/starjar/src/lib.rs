//! # Starjar Application Library
//!
//! HTTP server, CLI and configuration around `starjar-core`.
//! The binary in `main.rs` is a thin wrapper over [`cli::execute`].

pub mod api;
pub mod cli;
pub mod config;
