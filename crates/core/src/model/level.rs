use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── LADDER ────────────────────────────────────────────────────────────────────
//

/// Names of every ladder position, ordered from lowest to highest.
///
/// Index 0 is the `A0` sentinel; everything after it is a testable level.
/// Extending the ladder means adding a name here and a matching constant
/// below, nothing else.
const LEVEL_NAMES: [&str; 10] = [
    "A0", "A1.1", "A1.2", "A2.1", "A2.2", "B1.1", "B1.2", "B1.3", "B2.1", "B2.2",
];

/// A position on the placement ladder.
///
/// Levels form an explicit ordered list and compare by list index, so
/// "harder than" is exactly "later in the list". `A0` is a sentinel meaning
/// "below the lowest testable level": it never has questions and is only
/// produced as a final result when a taker fails the bottom of the ladder.
///
/// # Examples
///
/// ```
/// use placement_core::model::LanguageLevel;
///
/// assert!(LanguageLevel::A1_2 > LanguageLevel::A1_1);
/// assert_eq!(LanguageLevel::A1_1.next()?, LanguageLevel::A1_2);
/// assert_eq!(LanguageLevel::B2_2.name(), "B2.2");
/// # Ok::<(), placement_core::model::LevelRangeError>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LanguageLevel(u8);

impl LanguageLevel {
    /// Sentinel below the testable range; never carries questions.
    pub const A0: Self = Self(0);
    pub const A1_1: Self = Self(1);
    pub const A1_2: Self = Self(2);
    pub const A2_1: Self = Self(3);
    pub const A2_2: Self = Self(4);
    pub const B1_1: Self = Self(5);
    pub const B1_2: Self = Self(6);
    pub const B1_3: Self = Self(7);
    pub const B2_1: Self = Self(8);
    pub const B2_2: Self = Self(9);

    /// Lowest level a test can run at.
    pub const MIN_TESTABLE: Self = Self::A1_1;
    /// Highest level a test can run at.
    pub const MAX_TESTABLE: Self = Self::B2_2;

    /// Rebuilds a level from its stored ladder index.
    ///
    /// # Errors
    ///
    /// Returns `LevelRangeError::UnknownIndex` if `index` is past the end of
    /// the ladder.
    pub fn from_index(index: u8) -> Result<Self, LevelRangeError> {
        if usize::from(index) < LEVEL_NAMES.len() {
            Ok(Self(index))
        } else {
            Err(LevelRangeError::UnknownIndex { provided: index })
        }
    }

    /// Returns the ladder index, suitable for storage.
    #[must_use]
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Returns the display name, e.g. `"A1.1"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        LEVEL_NAMES[usize::from(self.0)]
    }

    /// Returns the next level up the ladder.
    ///
    /// # Errors
    ///
    /// Returns `LevelRangeError::AboveMax` when called on the highest level;
    /// the ladder never wraps.
    pub fn next(&self) -> Result<Self, LevelRangeError> {
        if *self == Self::MAX_TESTABLE {
            Err(LevelRangeError::AboveMax { level: *self })
        } else {
            Ok(Self(self.0 + 1))
        }
    }

    /// Returns the next level down the ladder.
    ///
    /// # Errors
    ///
    /// Returns `LevelRangeError::BelowMin` when called on the `A0` sentinel;
    /// the ladder never wraps.
    pub fn previous(&self) -> Result<Self, LevelRangeError> {
        if *self == Self::A0 {
            Err(LevelRangeError::BelowMin { level: *self })
        } else {
            Ok(Self(self.0 - 1))
        }
    }

    /// Returns true for every level except the `A0` sentinel.
    #[must_use]
    pub fn is_testable(&self) -> bool {
        *self != Self::A0
    }

    /// Iterates the testable levels in ladder order (sentinel excluded).
    pub fn testable() -> impl Iterator<Item = Self> {
        (Self::MIN_TESTABLE.0..=Self::MAX_TESTABLE.0).map(Self)
    }
}

impl fmt::Debug for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LanguageLevel({})", self.name())
    }
}

impl fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for LanguageLevel {
    type Error = LevelRangeError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::from_index(index)
    }
}

impl From<LanguageLevel> for u8 {
    fn from(level: LanguageLevel) -> Self {
        level.index()
    }
}

impl FromStr for LanguageLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LEVEL_NAMES
            .iter()
            .position(|name| *name == s)
            .map(|index| {
                // position is bounded by the array length
                #[allow(clippy::cast_possible_truncation)]
                Self(index as u8)
            })
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A ladder move or lookup left the known range.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LevelRangeError {
    #[error("no level above {level}")]
    AboveMax { level: LanguageLevel },
    #[error("no level below {level}")]
    BelowMin { level: LanguageLevel },
    #[error("ladder index {provided} is out of range")]
    UnknownIndex { provided: u8 },
}

/// Error type for parsing a level from its display name
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown language level name: {0:?}")]
pub struct ParseLevelError(String);

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
