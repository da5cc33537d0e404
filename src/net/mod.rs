//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Plain listener (always)          TLS listener (when configured)
//!     → listener.rs serve_plain        → tls.rs (load PEM cert + key)
//!                                      → listener.rs serve_tls
//!     → Hand off to the HTTP layer with the peer address attached
//! ```
//!
//! # Design Decisions
//! - Both listeners share the same upstream; only the `secure` flag differs
//! - Each accepted connection is served on its own task
//! - Shutdown stops accepting and lets in-flight requests finish

pub mod listener;
pub mod tls;

pub use listener::ListenerError;
