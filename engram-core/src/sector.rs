//! The five memory sectors and their canonical ordering.

use serde::{Deserialize, Serialize};

/// One of the five semantic buckets a memory can live in.
///
/// The discriminant order is load-bearing: it indexes the cross-sector
/// resonance matrix and the per-sector vector tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Episodic,
    Semantic,
    Procedural,
    Emotional,
    Reflective,
}

impl Sector {
    /// All sectors in canonical order.
    pub const ALL: [Sector; 5] = [
        Sector::Episodic,
        Sector::Semantic,
        Sector::Procedural,
        Sector::Emotional,
        Sector::Reflective,
    ];

    /// Position in the canonical order.
    pub fn index(self) -> usize {
        match self {
            Sector::Episodic => 0,
            Sector::Semantic => 1,
            Sector::Procedural => 2,
            Sector::Emotional => 3,
            Sector::Reflective => 4,
        }
    }

    /// Stable lowercase name used in storage keys and columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Sector::Episodic => "episodic",
            Sector::Semantic => "semantic",
            Sector::Procedural => "procedural",
            Sector::Emotional => "emotional",
            Sector::Reflective => "reflective",
        }
    }

    /// Parse a sector name. Unknown names return `None`; callers that need
    /// a lenient default should fall back to [`Sector::Semantic`].
    pub fn parse(name: &str) -> Option<Sector> {
        match name {
            "episodic" => Some(Sector::Episodic),
            "semantic" => Some(Sector::Semantic),
            "procedural" => Some(Sector::Procedural),
            "emotional" => Some(Sector::Emotional),
            "reflective" => Some(Sector::Reflective),
            _ => None,
        }
    }

    /// Lenient parse: unknown sector names map to `Semantic`.
    pub fn parse_or_semantic(name: &str) -> Sector {
        Sector::parse(name).unwrap_or(Sector::Semantic)
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
