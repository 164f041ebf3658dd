//! # Screen-Time Core Library
//!
//! This library provides the core logic for tracking a screen-time credit
//! balance: seconds earned by completing tasks, drained while the host app is
//! backgrounded and the screen is on, turning into debt once exhausted.
//! All operations are available through a standalone CLI binary; any GUI or
//! mobile bridge is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Credit Engine**: A wall-clock-based state machine that reconciles
//!   elapsed time on every call, so it survives missed ticks and restarts
//! - **Storage**: SQLite key-value state and credit ledger, TOML configuration
//! - **Service / Scheduler**: Serialised engine access, event broadcast and a
//!   best-effort 1 Hz tick loop
//! - **Policy**: Pure reward and debt-penalty functions
//!
//! ## Key Components
//!
//! - [`CreditEngine`]: Core reconciliation state machine
//! - [`CreditService`]: Mutex-guarded engine plus event channel
//! - [`TickScheduler`]: Periodic reconciliation task
//! - [`Database`]: State and ledger persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod credit;
pub mod error;
pub mod events;
pub mod presentation;
pub mod scheduler;
pub mod service;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credit::{
    debt_penalty, reward_for_answer, reward_seconds, AnswerReward, CreditEngine, CreditStatus,
    Difficulty, PenaltyPolicy, RewardTable, TimerSnapshot, Transition,
};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use presentation::{format_duration, render_notification, NotificationContent};
pub use scheduler::{TickScheduler, MIN_TICK_INTERVAL};
pub use service::CreditService;
pub use storage::{Config, CreditKind, Database, LedgerStats, MemoryStore, StateStore};
