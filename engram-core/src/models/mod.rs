//! Data model structs shared across the workspace.

mod classifier;
mod embed_log;
mod fact;
mod memory;
mod retrieved;
mod stats;
mod waypoint;

pub use classifier::ClassifierRecord;
pub use embed_log::{EmbedLog, EmbedLogStatus};
pub use fact::{TemporalEdge, TemporalFact};
pub use memory::{AddMemoryResult, MemoryRecord};
pub use retrieved::RetrievedMemory;
pub use stats::{OpsLogEntry, SectorStats};
pub use waypoint::Waypoint;
