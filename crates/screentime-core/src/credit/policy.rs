//! Reward and debt penalty policy.
//!
//! Both functions are pure: they read a policy table and their inputs and
//! hold no state. Callers feed the reward into `add_credit`.
//!
//! ## Reward
//!
//! A correct answer earns credit seconds by difficulty, plus a flat bonus
//! when the streak reaches a milestone. Answer speed only affects score
//! points, never seconds.
//!
//! ```text
//! seconds = base(difficulty) + (streak % milestone == 0 ? milestone_bonus : 0)
//! points  = base_points
//!         + base_points * fast_bonus_pct/100 * max(0, window - response_ms) / window
//!         + base_points * streak_points_pct/100 * (streak - 1)
//! ```
//!
//! `streak` counts correct answers in a row, this one included.
//!
//! ## Penalty
//!
//! | Debt | Points |
//! |------|--------|
//! | < grace_secs | 0 |
//! | otherwise | floor(debt_minutes * points_per_minute), capped at max_points |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ValidationError::InvalidValue {
                field: "difficulty".into(),
                message: format!("unknown difficulty '{other}', expected easy, medium or hard"),
            }),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(s)
    }
}

/// Credit and score granted per correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTable {
    #[serde(default = "default_easy_secs")]
    pub easy_secs: u64,
    #[serde(default = "default_medium_secs")]
    pub medium_secs: u64,
    #[serde(default = "default_hard_secs")]
    pub hard_secs: u64,
    /// Flat credit bonus when the streak hits a milestone.
    #[serde(default = "default_milestone_bonus_secs")]
    pub milestone_bonus_secs: u64,
    /// Correct answers per milestone.
    #[serde(default = "default_streak_milestone")]
    pub streak_milestone: u64,
    #[serde(default = "default_base_points")]
    pub base_points: u64,
    /// Answers faster than this earn a points bonus.
    #[serde(default = "default_fast_answer_window_ms")]
    pub fast_answer_window_ms: u64,
    /// Points bonus for an instant answer, as a percentage of `base_points`.
    #[serde(default = "default_fast_answer_bonus_pct")]
    pub fast_answer_bonus_pct: u64,
    /// Points bonus per earlier answer in the streak, as a percentage of `base_points`.
    #[serde(default = "default_streak_points_pct")]
    pub streak_points_pct: u64,
}

fn default_easy_secs() -> u64 {
    60
}
fn default_medium_secs() -> u64 {
    120
}
fn default_hard_secs() -> u64 {
    180
}
fn default_milestone_bonus_secs() -> u64 {
    120
}
fn default_streak_milestone() -> u64 {
    5
}
fn default_base_points() -> u64 {
    100
}
fn default_fast_answer_window_ms() -> u64 {
    20_000
}
fn default_fast_answer_bonus_pct() -> u64 {
    50
}
fn default_streak_points_pct() -> u64 {
    50
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            easy_secs: default_easy_secs(),
            medium_secs: default_medium_secs(),
            hard_secs: default_hard_secs(),
            milestone_bonus_secs: default_milestone_bonus_secs(),
            streak_milestone: default_streak_milestone(),
            base_points: default_base_points(),
            fast_answer_window_ms: default_fast_answer_window_ms(),
            fast_answer_bonus_pct: default_fast_answer_bonus_pct(),
            streak_points_pct: default_streak_points_pct(),
        }
    }
}

impl RewardTable {
    pub fn base_secs(&self, difficulty: Difficulty) -> u64 {
        match difficulty {
            Difficulty::Easy => self.easy_secs,
            Difficulty::Medium => self.medium_secs,
            Difficulty::Hard => self.hard_secs,
        }
    }

    /// True when `streak` lands exactly on a milestone. A zero milestone
    /// disables milestones.
    pub fn is_milestone(&self, streak: u32) -> bool {
        streak > 0
            && u64::from(streak)
                .checked_rem(self.streak_milestone)
                .is_some_and(|r| r == 0)
    }
}

/// What one correct answer is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReward {
    /// Credit seconds, milestone bonus included.
    pub seconds: i64,
    pub points: u64,
    pub milestone: bool,
}

/// Score points lost while in debt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    #[serde(default = "default_points_per_minute")]
    pub points_per_minute: u64,
    /// Debt below this many seconds costs nothing.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    #[serde(default = "default_max_points")]
    pub max_points: u64,
}

fn default_points_per_minute() -> u64 {
    50
}
fn default_grace_secs() -> u64 {
    30
}
fn default_max_points() -> u64 {
    9999
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            points_per_minute: default_points_per_minute(),
            grace_secs: default_grace_secs(),
            max_points: default_max_points(),
        }
    }
}

/// Credit and points earned by one correct answer.
///
/// # Errors
/// `response_time_ms` must be finite and non-negative.
pub fn reward_for_answer(
    table: &RewardTable,
    difficulty: Difficulty,
    response_time_ms: f64,
    streak: u32,
) -> Result<AnswerReward, ValidationError> {
    if !response_time_ms.is_finite() || response_time_ms < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "response_time_ms".into(),
            message: format!("must be a finite, non-negative number, got {response_time_ms}"),
        });
    }

    let milestone = table.is_milestone(streak);
    let bonus_secs = if milestone { table.milestone_bonus_secs } else { 0 };
    let seconds = table.base_secs(difficulty).saturating_add(bonus_secs);

    let base = table.base_points as f64;
    let window = table.fast_answer_window_ms as f64;
    let speed_factor = if window > 0.0 {
        ((window - response_time_ms) / window).max(0.0)
    } else {
        0.0
    };
    let speed_bonus = base * table.fast_answer_bonus_pct as f64 / 100.0 * speed_factor;
    let streak_bonus =
        base * table.streak_points_pct as f64 / 100.0 * f64::from(streak.saturating_sub(1));

    Ok(AnswerReward {
        seconds: i64::try_from(seconds).unwrap_or(i64::MAX),
        points: (base + speed_bonus + streak_bonus).round() as u64,
        milestone,
    })
}

/// Credit seconds earned by one correct answer.
///
/// # Errors
/// See [`reward_for_answer`].
pub fn reward_seconds(
    table: &RewardTable,
    difficulty: Difficulty,
    response_time_ms: f64,
    streak: u32,
) -> Result<i64, ValidationError> {
    reward_for_answer(table, difficulty, response_time_ms, streak).map(|r| r.seconds)
}

/// Penalty points for carrying `debt_secs` of debt.
pub fn debt_penalty(policy: &PenaltyPolicy, debt_secs: u64) -> u64 {
    if debt_secs < policy.grace_secs {
        return 0;
    }
    let points = debt_secs.saturating_mul(policy.points_per_minute) / 60;
    points.min(policy.max_points)
}
