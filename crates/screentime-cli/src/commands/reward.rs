use clap::{Args, Subcommand};
use screentime_core::{debt_penalty, reward_for_answer, Config, CreditKind, Difficulty};
use serde::Serialize;

use super::timer::record;
use super::{open_service, print_json, CliResult};

#[derive(Args)]
pub struct AnswerArgs {
    /// Question difficulty (easy, medium, hard)
    #[arg(long)]
    difficulty: Difficulty,
    /// Time taken to answer, in milliseconds
    #[arg(long, default_value = "20000")]
    response_ms: f64,
    /// Correct answers in a row, this one included
    #[arg(long, default_value = "1")]
    streak: u32,
}

#[derive(Subcommand)]
pub enum RewardAction {
    /// Print the reward for an answer without granting it
    Calc(AnswerArgs),
    /// Grant the reward for an answer as credit
    Grant(AnswerArgs),
}

#[derive(Serialize)]
struct RewardOutput {
    difficulty: Difficulty,
    seconds: i64,
    points: u64,
    milestone: bool,
}

#[derive(Serialize)]
struct PenaltyOutput {
    debt_secs: u64,
    points: u64,
}

pub fn run(action: RewardAction) -> CliResult {
    let config = Config::load_or_default();

    match action {
        RewardAction::Calc(args) => {
            let reward = reward_for_answer(&config.rewards, args.difficulty, args.response_ms, args.streak)?;
            print_json(&RewardOutput {
                difficulty: args.difficulty,
                seconds: reward.seconds,
                points: reward.points,
                milestone: reward.milestone,
            })
        }
        RewardAction::Grant(args) => {
            let reward = reward_for_answer(&config.rewards, args.difficulty, args.response_ms, args.streak)?;
            let service = open_service(&config)?;
            let status = service.add_credit(reward.seconds)?;
            record(&service, CreditKind::Earned, reward.seconds, &status);
            print_json(&status)
        }
    }
}

pub fn penalty(debt: Option<u64>) -> CliResult {
    let config = Config::load_or_default();
    let debt_secs = match debt {
        Some(d) => d,
        None => open_service(&config)?.snapshot()?.debt(),
    };
    print_json(&PenaltyOutput {
        debt_secs,
        points: debt_penalty(&config.penalty, debt_secs),
    })
}
