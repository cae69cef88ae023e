//! Game rulesets (modes), each backed by its own high-scores table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A ruleset (game mode). Discriminants match the wire `rulesetId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Ruleset {
    /// osu!standard.
    Osu = 0,
    /// osu!taiko.
    Taiko = 1,
    /// osu!catch.
    Fruits = 2,
    /// osu!mania.
    Mania = 3,
}

impl Ruleset {
    /// All rulesets, ordered by id.
    pub const ALL: [Self; 4] = [Self::Osu, Self::Taiko, Self::Fruits, Self::Mania];

    /// Wire id of this ruleset.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Position of this ruleset in [`Ruleset::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Osu => "osu",
            Self::Taiko => "taiko",
            Self::Fruits => "fruits",
            Self::Mania => "mania",
        }
    }
}

impl TryFrom<u8> for Ruleset {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(id))
            .copied()
            .ok_or(Error::InvalidRuleset(id))
    }
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
