//! Minimal Chrome DevTools Protocol client.
//!
//! Only what the Chromium engine needs: request/response correlation over a
//! single browser-level WebSocket (flattened target sessions), an event
//! broadcast, and discovery of the debugging endpoint.

mod connection;
mod probe;

pub use connection::{CdpConnection, CdpEvent};
pub use probe::{CdpVersionInfo, DEVTOOLS_PORT_FILE, fetch_version, parse_devtools_port_file, wait_for_devtools_endpoint};
