//! Session lifecycle supervisor.
//!
//! [`Supervisor`] starts, tracks and tears down one isolated browser session
//! per profile. Each session runs on its own OS thread (the execution unit)
//! with a private single-threaded runtime; the supervisor only keeps the
//! session's public fields, its stop signal, its ephemeral directory slot and
//! the handle needed to wait for the unit.
//!
//! ```ignore
//! let supervisor = Supervisor::new(Arc::new(ChromiumEngine::default()), SupervisorConfig::default());
//! let session = supervisor.start(&Profile::named("Work"), None).await?;
//! supervisor.stop(&session.id).await?;
//! ```

pub mod dirs;
pub mod error;
pub mod options;
mod registry;
pub mod supervisor;
pub mod testing;
mod unit;

pub use error::{Result, SessionError};
pub use foxden_protocol::{Profile, ProxyConfig, ProxyProtocol, PublicSession, ScreenSize, SessionId, SessionStatus};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use unit::UnitOutcome;
