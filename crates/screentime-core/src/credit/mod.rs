mod engine;
mod policy;
mod snapshot;

pub use engine::{CreditEngine, Transition, MAX_CREDIT_ADJUSTMENT};
pub use policy::{
    debt_penalty, reward_for_answer, reward_seconds, AnswerReward, Difficulty, PenaltyPolicy,
    RewardTable,
};
pub use snapshot::{CreditStatus, TimerSnapshot};
