//! HTTP API and command line for the foxden session supervisor.
//!
//! `foxden serve` exposes profile management and session control over a
//! small JSON API; `foxden check` reports whether a browser can be launched.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod store;
pub mod styles;
pub mod validate;
