//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (optional dial deadline, then response-head deadline)
//!     → dial deadline elapsed: 502, response deadline elapsed: 504
//! ```
//!
//! # Design Decisions
//! - No retries: a backend request may already have consumed the request body
//! - Deadlines are off unless configured

pub mod timeouts;
