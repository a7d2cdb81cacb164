//! Browser engine runtime for foxden.
//!
//! The session supervisor only talks to the [`Engine`] and [`EngineContext`]
//! traits. [`ChromiumEngine`] is the production implementation: it launches a
//! Chromium-family browser with remote debugging enabled and drives it over the
//! Chrome DevTools Protocol.

pub mod browser_finder;
pub mod cdp;
pub mod chromium;
pub mod engine;
pub mod error;

pub use chromium::{ChromiumConfig, ChromiumEngine};
pub use engine::{CloseHandler, DataDir, Engine, EngineContext, LaunchOptions, PageId, ProxyEndpoint, Viewport, WindowSize};
pub use error::{Error, Result};
