//! cliprelay-core: shared types, IDs, errors, configuration, and relay events.
//!
//! This crate is the foundational dependency for the wire codec and the
//! producer/consumer runtime, providing the [`Segment`] data model, typed
//! identifiers, a unified error type, configuration sections, and a
//! broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod segment;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use segment::Segment;
