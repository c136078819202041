//! # engram-dynamics
//!
//! The numbers behind memory behaviour: salience decay and
//! reinforcement formulas, the cross-sector resonance matrix, and the
//! paged dual-phase decay sweep.

pub mod resonance;
pub mod salience;
pub mod sweep;

pub use resonance::cross_sector;
pub use sweep::DecaySweep;
