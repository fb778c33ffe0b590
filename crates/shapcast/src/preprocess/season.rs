//! Season encoding used by the `season` feature.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Meteorological season, encoded as the integer the model was trained on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Season {
    Winter = 0,
    Spring = 1,
    Summer = 2,
    Fall = 3,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Season of a calendar month (1 = January). December joins Winter.
    ///
    /// Computed as `(month % 12) / 3`, so any integer maps to a season.
    pub fn from_month(month: u32) -> Self {
        match (month % 12) / 3 {
            0 => Season::Winter,
            1 => Season::Spring,
            2 => Season::Summer,
            _ => Season::Fall,
        }
    }

    /// Season for an encoded value, `None` outside `0..=3`.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Season::Winter),
            1 => Some(Season::Spring),
            2 => Some(Season::Summer),
            3 => Some(Season::Fall),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Season {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(value as i64).ok_or_else(|| format!("season must be 0..=3, got {value}"))
    }
}

impl From<Season> for u8 {
    fn from(season: Season) -> Self {
        season.index()
    }
}
