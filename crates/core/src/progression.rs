use thiserror::Error;

use crate::model::{LanguageLevel, LevelRangeError, PassedLevelStats};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressionError {
    #[error("cannot choose a next action before any level is completed")]
    NoLevelStats,
    #[error(transparent)]
    Ladder(#[from] LevelRangeError),
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// What the test does after a completed level batch: continue at another
/// level, or stop with a detected level. Never both, never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionOutcome {
    /// Serve the next batch at this level.
    NextLevel(LanguageLevel),
    /// The walk has terminated; this is the final result.
    Finished(LanguageLevel),
}

impl ProgressionOutcome {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    /// The level the outcome points at, whichever variant it is.
    #[must_use]
    pub fn level(&self) -> LanguageLevel {
        match self {
            Self::NextLevel(level) | Self::Finished(level) => *level,
        }
    }
}

//
// ─── LADDER WALK ───────────────────────────────────────────────────────────────
//

/// Decides the next move of the placement walk from the per-level outcomes
/// seen so far, ordered oldest first.
///
/// The rules, checked in this order:
///
/// 1. **Reversal.** If the last two completed levels disagree (one passed,
///    one failed), the walk has bracketed the taker's ability and stops at
///    the lower of the two levels, which is always the passed one.
/// 2. **Pass.** A passed level moves one rung up; passing the top of the
///    ladder finishes there.
/// 3. **Fail.** A failed level moves one rung down; failing the bottom
///    finishes at the `A0` sentinel.
///
/// # Errors
///
/// - `NoLevelStats` if `stats` is empty; callers must complete a batch
///   before asking for a move.
/// - `Ladder` if a step runs off the ladder, which the rules above make
///   unreachable for well-formed input.
///
/// # Examples
///
/// ```
/// use placement_core::model::{LanguageLevel, PassedLevelStats};
/// use placement_core::progression::{next_action, ProgressionOutcome};
///
/// // 3 of 4 at A1.1 is 75%: passed, so the walk climbs.
/// let first = PassedLevelStats::from_counts(LanguageLevel::A1_1, 3, 4)?;
/// assert_eq!(
///     next_action(&[first])?,
///     ProgressionOutcome::NextLevel(LanguageLevel::A1_2)
/// );
///
/// // 1 of 3 at A1.2 fails; the climb reverses and settles on A1.1.
/// let second = PassedLevelStats::from_counts(LanguageLevel::A1_2, 1, 3)?;
/// assert_eq!(
///     next_action(&[first, second])?,
///     ProgressionOutcome::Finished(LanguageLevel::A1_1)
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn next_action(
    stats: &[PassedLevelStats],
) -> Result<ProgressionOutcome, ProgressionError> {
    let last = stats.last().ok_or(ProgressionError::NoLevelStats)?;

    if stats.len() >= 2 {
        let second_last = &stats[stats.len() - 2];
        if last.has_passed() != second_last.has_passed() {
            // bracketed: settle on the lower of the two, the passed one
            let detected = if last.level() > second_last.level() {
                second_last.level()
            } else {
                last.level()
            };
            return Ok(ProgressionOutcome::Finished(detected));
        }
    }

    if last.has_passed() {
        if last.level() == LanguageLevel::MAX_TESTABLE {
            Ok(ProgressionOutcome::Finished(LanguageLevel::MAX_TESTABLE))
        } else {
            Ok(ProgressionOutcome::NextLevel(last.level().next()?))
        }
    } else if last.level() == LanguageLevel::MIN_TESTABLE {
        Ok(ProgressionOutcome::Finished(LanguageLevel::A0))
    } else {
        Ok(ProgressionOutcome::NextLevel(last.level().previous()?))
    }
}

/// The detected level if the walk has terminated; `None` while it is still
/// running or has not started.
#[must_use]
pub fn detect_finished(stats: &[PassedLevelStats]) -> Option<LanguageLevel> {
    match next_action(stats) {
        Ok(ProgressionOutcome::Finished(level)) => Some(level),
        _ => None,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
