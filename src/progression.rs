use crate::badges::{self, Badge, BadgeStatus};
use crate::challenge::DailyChallengeLedger;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::AppError;
use crate::level::{LevelLedger, XpAward};
use crate::models::{
    BadgeId, DailyChallenge, LevelState, QuestionFilter, QuizItem, SessionResult, StatsSnapshot,
};
use crate::selector::QuestionSelector;
use crate::stats::StatsLedger;
use crate::storage::{ItemStore, KeyValueStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters for the session in progress, committed only when it ends
#[derive(Clone, Copy, Debug, Default)]
struct SessionProgress {
    answered: u32,
    correct: u32,
    streak: u32,
    best_streak: u32,
    score: u32,
    hard_correct: u32,
    retry_correct: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub xp_gained: u32,
    pub score_gained: u32,
    pub leveled_up: bool,
    pub levels_gained: u32,
    pub new_level: u32,
    /// Consecutive correct answers in the current session after this one
    pub streak: u32,
}

#[derive(Clone, Debug)]
pub struct SessionOutcome {
    pub result: SessionResult,
    pub stars: u8,
    pub updated_stats: StatsSnapshot,
    pub new_badges: Vec<&'static Badge>,
    pub challenge: DailyChallenge,
    pub bonus_xp: u32,
    /// Level change caused by the daily challenge bonus, if one was paid
    pub bonus_award: Option<XpAward>,
}

/// Turns answers and finished sessions into XP, stats, challenge progress and badges
pub struct ProgressionCoordinator {
    levels: Arc<LevelLedger>,
    stats: Arc<StatsLedger>,
    challenges: Arc<DailyChallengeLedger>,
    selector: QuestionSelector,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    session: SessionProgress,
}

impl ProgressionCoordinator {
    pub fn new(
        levels: Arc<LevelLedger>,
        stats: Arc<StatsLedger>,
        challenges: Arc<DailyChallengeLedger>,
        selector: QuestionSelector,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            levels,
            stats,
            challenges,
            selector,
            clock,
            config,
            session: SessionProgress::default(),
        }
    }

    /// Load every ledger from `store` and wire them up with the system clock
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        items: Arc<dyn ItemStore>,
        config: EngineConfig,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let levels = Arc::new(LevelLedger::load(store.clone(), &config).await);
        let stats = Arc::new(StatsLedger::load(store.clone(), &config).await);
        let challenges = Arc::new(DailyChallengeLedger::load(store, &config).await);
        let selector = QuestionSelector::new(items, clock.clone());
        Self::new(levels, stats, challenges, selector, clock, config)
    }

    pub fn start_session(&mut self) {
        self.session = SessionProgress::default();
    }

    pub async fn next_question(&mut self, filter: &QuestionFilter) -> Result<QuizItem, AppError> {
        self.selector.next(filter).await
    }

    pub async fn on_answer_submitted(
        &mut self,
        item: &QuizItem,
        is_correct: bool,
    ) -> AnswerOutcome {
        self.session.answered += 1;

        let outcome = if is_correct {
            let session = &mut self.session;
            session.correct += 1;
            session.streak += 1;
            session.best_streak = session.best_streak.max(session.streak);
            session.score += self.config.score_per_correct;
            if item.is_hard() {
                session.hard_correct += 1;
            }
            if self.stats.forget_missed(item.id).await {
                self.session.retry_correct += 1;
            }

            let award = self.levels.apply_xp(self.config.xp_per_correct).await;
            AnswerOutcome {
                correct: true,
                xp_gained: self.config.xp_per_correct,
                score_gained: self.config.score_per_correct,
                leveled_up: award.leveled_up,
                levels_gained: award.levels_gained,
                new_level: award.state.level,
                streak: self.session.streak,
            }
        } else {
            self.session.streak = 0;
            self.stats.remember_missed(item.id).await;
            AnswerOutcome {
                correct: false,
                xp_gained: 0,
                score_gained: 0,
                leveled_up: false,
                levels_gained: 0,
                new_level: self.levels.current_state().await.level,
                streak: 0,
            }
        };

        // 解答日時を更新
        if let Err(e) = self.selector.mark_answered(item.id).await {
            warn!("Failed to update answered time of item {}: {}", item.id, e);
        }
        debug!(
            item = item.id,
            correct = is_correct,
            streak = outcome.streak,
            "Answer recorded"
        );
        outcome
    }

    pub fn is_session_complete(&self) -> bool {
        self.session.answered >= self.config.session_length
    }

    pub fn answered_count(&self) -> u32 {
        self.session.answered
    }

    pub fn current_streak(&self) -> u32 {
        self.session.streak
    }

    /// The session in progress as a result, counted against the full session length
    pub fn session_result(&self) -> SessionResult {
        SessionResult {
            correct_count: self.session.correct,
            total_count: self.config.session_length.max(self.session.answered),
            best_streak: self.session.best_streak,
            score_gained: self.session.score,
            hard_correct: self.session.hard_correct,
            retry_correct: self.session.retry_correct,
        }
    }

    /// Commit a finished session; clears the in-progress counters
    pub async fn on_session_complete(&mut self, result: &SessionResult) -> SessionOutcome {
        let today = self.clock.today();

        let commit = self.stats.commit_session(result, today).await;

        let progress = self.challenges.record_progress(today, result.correct_count).await;
        let bonus_award = if progress.bonus_xp > 0 {
            Some(self.levels.apply_xp(progress.bonus_xp).await)
        } else {
            None
        };

        // Earn counts are incremented only after the diff
        let new_badges = badges::diff_newly_earned(&commit.recorded, Some(&commit.previous));
        let ids: Vec<BadgeId> = new_badges.iter().map(|b| b.id).collect();
        let updated_stats = self.stats.increment_badge_counts(&ids).await;
        for badge in &new_badges {
            info!(badge = badge.id, name = badge.name, "Badge earned");
        }

        self.session = SessionProgress::default();

        SessionOutcome {
            result: *result,
            stars: result.stars(),
            updated_stats,
            new_badges,
            challenge: progress.challenge,
            bonus_xp: progress.bonus_xp,
            bonus_award,
        }
    }

    pub async fn finish_session(&mut self) -> SessionOutcome {
        let result = self.session_result();
        self.on_session_complete(&result).await
    }

    pub async fn level_state(&self) -> LevelState {
        self.levels.current_state().await
    }

    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot().await
    }

    pub async fn badge_statuses(&self) -> Vec<BadgeStatus> {
        badges::evaluate(&self.stats.snapshot().await)
    }

    pub async fn daily_challenge(&self) -> DailyChallenge {
        self.challenges.current(self.clock.today()).await
    }
}
