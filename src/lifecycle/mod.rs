//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build routers → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Listeners stop accepting → Drain in-flight requests → Exit 0
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Configuration is validated before any listener binds
//! - A listener failure is fatal for the process

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
