//! Progression and question selection for a kanji reading quiz.
//!
//! Answers feed a [`ProgressionCoordinator`], which awards XP through the
//! [`LevelLedger`], commits finished sessions to the [`StatsLedger`], advances
//! the daily challenge and reports newly earned badges. A
//! [`QuestionSelector`] picks the next question from the item store.

pub mod badges;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod error;
pub mod level;
pub mod models;
pub mod progression;
pub mod selector;
pub mod stats;
pub mod storage;

pub use badges::{BADGES, Badge, BadgeRule, BadgeStatus};
pub use challenge::{ChallengeProgress, DailyChallengeLedger};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::AppError;
pub use level::{LevelLedger, XpAward};
pub use models::{
    DailyChallenge, LevelState, QuestionFilter, QuizItem, SessionRecord, SessionResult,
    StatsSnapshot,
};
pub use progression::{AnswerOutcome, ProgressionCoordinator, SessionOutcome};
pub use selector::QuestionSelector;
pub use stats::{SessionCommit, StatsLedger};
pub use storage::{ItemStore, KeyValueStore, MemoryItemStore, MemoryKeyValueStore};
