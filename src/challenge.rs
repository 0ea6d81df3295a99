use crate::config::EngineConfig;
use crate::models::DailyChallenge;
use crate::storage::{self, DAILY_CHALLENGE_KEY, KeyValueStore};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeProgress {
    pub challenge: DailyChallenge,
    /// Non-zero only on the update that first completes the day's challenge
    pub bonus_xp: u32,
}

/// Today's correct-answer goal; a new challenge starts every day
pub struct DailyChallengeLedger {
    store: Arc<dyn KeyValueStore>,
    goal: u32,
    bonus_xp: u32,
    state: Mutex<Option<DailyChallenge>>,
}

impl DailyChallengeLedger {
    pub async fn load(store: Arc<dyn KeyValueStore>, config: &EngineConfig) -> Self {
        let saved = storage::load_record::<DailyChallenge>(store.as_ref(), DAILY_CHALLENGE_KEY)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to load daily challenge: {}", e);
                None
            });

        Self {
            store,
            goal: config.daily_goal,
            bonus_xp: config.daily_bonus_xp,
            state: Mutex::new(saved),
        }
    }

    pub async fn current(&self, today: NaiveDate) -> DailyChallenge {
        let state = self.state.lock().await;
        match state.as_ref() {
            Some(challenge) if challenge.date == today => challenge.clone(),
            _ => DailyChallenge::new(today, self.goal),
        }
    }

    pub async fn record_progress(&self, today: NaiveDate, correct: u32) -> ChallengeProgress {
        let mut state = self.state.lock().await;
        let mut challenge = match state.as_ref() {
            Some(challenge) if challenge.date == today => challenge.clone(),
            _ => DailyChallenge::new(today, self.goal),
        };

        let was_completed = challenge.completed;
        challenge.progress += correct;
        challenge.completed = challenge.progress >= challenge.goal;
        let bonus_xp = if challenge.completed && !was_completed {
            info!(goal = challenge.goal, "Daily challenge completed");
            self.bonus_xp
        } else {
            0
        };

        if let Err(e) =
            storage::save_record(self.store.as_ref(), DAILY_CHALLENGE_KEY, &challenge).await
        {
            warn!("Failed to save daily challenge: {}", e);
        }
        *state = Some(challenge.clone());

        ChallengeProgress {
            challenge,
            bonus_xp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use crate::storage::testing::FailingStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    async fn ledger() -> (DailyChallengeLedger, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let ledger = DailyChallengeLedger::load(store.clone(), &EngineConfig::default()).await;
        (ledger, store)
    }

    #[tokio::test]
    async fn test_new_day_starts_fresh_challenge() {
        let (ledger, _store) = ledger().await;
        let challenge = ledger.current(day(1)).await;
        assert_eq!(challenge, DailyChallenge::new(day(1), 20));
        assert_eq!(challenge.remaining(), 20);
    }

    #[tokio::test]
    async fn test_bonus_is_awarded_once_per_day() {
        let (ledger, _store) = ledger().await;
        let first = ledger.record_progress(day(1), 12).await;
        assert_eq!(first.bonus_xp, 0);
        assert!(!first.challenge.completed);

        let second = ledger.record_progress(day(1), 9).await;
        assert_eq!(second.bonus_xp, 50);
        assert!(second.challenge.completed);
        assert_eq!(second.challenge.progress, 21);

        let third = ledger.record_progress(day(1), 10).await;
        assert_eq!(third.bonus_xp, 0);
        assert!(third.challenge.completed);
    }

    #[tokio::test]
    async fn test_progress_resets_on_next_day() {
        let (ledger, store) = ledger().await;
        ledger.record_progress(day(1), 25).await;

        let reloaded = DailyChallengeLedger::load(store, &EngineConfig::default()).await;
        assert!(reloaded.current(day(1)).await.completed);

        let next = reloaded.record_progress(day(2), 20).await;
        assert_eq!(next.challenge.progress, 20);
        assert_eq!(next.bonus_xp, 50);
    }

    #[tokio::test]
    async fn test_failing_store_still_tracks_progress() {
        let ledger =
            DailyChallengeLedger::load(Arc::new(FailingStore), &EngineConfig::default()).await;
        ledger.record_progress(day(1), 5).await;
        assert_eq!(ledger.current(day(1)).await.progress, 5);
    }
}
