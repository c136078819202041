//! # engram-core
//!
//! Foundation crate for the engram memory system.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod models;
pub mod sector;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use cancel::CancellationToken;
pub use config::EngramConfig;
pub use context::SecurityContext;
pub use errors::{EngramError, EngramResult};
pub use models::{MemoryRecord, Waypoint};
pub use sector::Sector;
