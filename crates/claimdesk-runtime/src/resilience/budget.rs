//! Budget levels for prompt escalation.
//!
//! Each level caps the rule text, the document excerpt and the model
//! output. Levels must shrink strictly from one to the next so that every
//! retry sends a smaller prompt and the escalation ends after a fixed
//! number of rounds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fewest and most levels a schedule may hold.
pub const MIN_LEVELS: usize = 2;
pub const MAX_LEVELS: usize = 3;

/// Errors from building a budget schedule.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BudgetError {
    #[error("Budget schedule needs {min} to {max} levels, got {0}", min = MIN_LEVELS, max = MAX_LEVELS)]
    LevelCount(usize),

    #[error("Budget level {index} has a zero limit")]
    ZeroLimit { index: usize },

    #[error("Budget level {index} is not smaller than the level before it")]
    NotDecreasing { index: usize },
}

/// One point in the shrinking sequence of prompt limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLevel {
    /// Characters of rule text across both rule families
    pub rules_char_limit: usize,

    /// Characters of the compacted document
    pub document_char_limit: usize,

    /// Output tokens requested from the model
    pub max_output_tokens: u32,

    /// Rules selected per family
    pub max_rules: usize,
}

impl BudgetLevel {
    pub const fn new(
        rules_char_limit: usize,
        document_char_limit: usize,
        max_output_tokens: u32,
        max_rules: usize,
    ) -> Self {
        Self {
            rules_char_limit,
            document_char_limit,
            max_output_tokens,
            max_rules,
        }
    }

    fn has_zero_limit(&self) -> bool {
        self.rules_char_limit == 0
            || self.document_char_limit == 0
            || self.max_output_tokens == 0
            || self.max_rules == 0
    }

    /// Whether `self` is a valid successor of `prev`.
    fn shrinks_from(&self, prev: &BudgetLevel) -> bool {
        self.rules_char_limit < prev.rules_char_limit
            && self.document_char_limit < prev.document_char_limit
            && self.max_output_tokens < prev.max_output_tokens
            && self.max_rules <= prev.max_rules
    }
}

/// Validated, ordered budget levels (generous first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BudgetSchedule {
    levels: Vec<BudgetLevel>,
}

impl BudgetSchedule {
    pub fn new(levels: Vec<BudgetLevel>) -> Result<Self, BudgetError> {
        if !(MIN_LEVELS..=MAX_LEVELS).contains(&levels.len()) {
            return Err(BudgetError::LevelCount(levels.len()));
        }

        for (index, level) in levels.iter().enumerate() {
            if level.has_zero_limit() {
                return Err(BudgetError::ZeroLimit { index });
            }
            if index > 0 && !level.shrinks_from(&levels[index - 1]) {
                return Err(BudgetError::NotDecreasing { index });
            }
        }

        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[BudgetLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BudgetLevel> {
        self.levels.get(index)
    }
}

impl Default for BudgetSchedule {
    /// Generous, medium and terse levels.
    fn default() -> Self {
        Self {
            levels: vec![
                BudgetLevel::new(4_000, 12_000, 4_000, 5),
                BudgetLevel::new(2_500, 7_000, 3_000, 3),
                BudgetLevel::new(1_200, 3_500, 2_000, 2),
            ],
        }
    }
}

impl<'de> Deserialize<'de> for BudgetSchedule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let levels = Vec::<BudgetLevel>::deserialize(deserializer)?;
        BudgetSchedule::new(levels).map_err(serde::de::Error::custom)
    }
}

/// Conservative token estimate: characters divided by `divisor`, rounded
/// up.
pub fn estimate_tokens(chars: usize, divisor: f64) -> u32 {
    if divisor <= 0.0 {
        return u32::MAX;
    }
    (chars as f64 / divisor).ceil() as u32
}

/// Characters that fit in `tokens` at `divisor` chars per token.
pub fn chars_for_tokens(tokens: u32, divisor: f64) -> usize {
    (tokens as f64 * divisor).floor().max(0.0) as usize
}
