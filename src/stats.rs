use crate::config::EngineConfig;
use crate::models::{BadgeId, DailyActivity, SessionRecord, SessionResult, StatsSnapshot};
use crate::storage::{
    self, DAILY_ACTIVITY_KEY, KeyValueStore, MISSED_ITEMS_KEY, SESSION_HISTORY_KEY, STATS_KEY,
};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Problems answered per calendar day
pub type ActivityLog = BTreeMap<NaiveDate, u32>;

/// Oldest records are dropped beyond this many
pub const SESSION_HISTORY_LIMIT: usize = 100;

/// Stats just before and just after one committed session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionCommit {
    pub previous: StatsSnapshot,
    pub recorded: StatsSnapshot,
}

#[derive(Default)]
struct StatsState {
    stats: StatsSnapshot,
    activity: ActivityLog,
    /// Items answered wrongly and not answered correctly since
    missed: BTreeSet<i64>,
    /// Finished sessions, oldest first
    history: Vec<SessionRecord>,
}

/// Cumulative quiz statistics and the daily activity log
pub struct StatsLedger {
    store: Arc<dyn KeyValueStore>,
    lookback_days: u32,
    state: Mutex<StatsState>,
}

/// Consecutive active days ending at `today`, most recent first.
/// A day without activity ends the run; no activity today means no streak.
pub fn consecutive_days(
    activity: &ActivityLog,
    today: NaiveDate,
    lookback_days: u32,
) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    for i in 0..lookback_days {
        let date = today - Duration::days(i64::from(i));
        match activity.get(&date) {
            Some(&count) if count > 0 => days.push(date),
            _ => break,
        }
    }
    days
}

fn session_accuracy(result: &SessionResult) -> f64 {
    if result.total_count == 0 {
        return 0.0;
    }
    if result.is_perfect() {
        return 100.0;
    }
    let correct = result.correct_count.min(result.total_count);
    100.0 * f64::from(correct) / f64::from(result.total_count)
}

async fn load_or_default<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> T {
    match storage::load_record(store, key).await {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!("Failed to load {}, using defaults: {}", key, e);
            T::default()
        }
    }
}

async fn save_logged<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    if let Err(e) = storage::save_record(store, key, value).await {
        warn!("Failed to save {}: {}", key, e);
    }
}

impl StatsLedger {
    pub async fn load(store: Arc<dyn KeyValueStore>, config: &EngineConfig) -> Self {
        let mut stats: StatsSnapshot = load_or_default(store.as_ref(), STATS_KEY).await;
        // Keep the invariant even if an older record violates it
        stats.total_attempts = stats.total_attempts.max(stats.total_correct);
        let activity = load_or_default(store.as_ref(), DAILY_ACTIVITY_KEY).await;
        let missed = load_or_default(store.as_ref(), MISSED_ITEMS_KEY).await;
        let history = load_or_default(store.as_ref(), SESSION_HISTORY_KEY).await;

        Self {
            store,
            lookback_days: config.streak_lookback_days.max(1),
            state: Mutex::new(StatsState {
                stats,
                activity,
                missed,
                history,
            }),
        }
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.state.lock().await.stats.clone()
    }

    /// Count one more problem for `date`; returns that day's total
    pub async fn record_daily_activity(&self, date: NaiveDate) -> u32 {
        let mut state = self.state.lock().await;
        let count = state.activity.entry(date).or_insert(0);
        *count += 1;
        let count = *count;
        save_logged(self.store.as_ref(), DAILY_ACTIVITY_KEY, &state.activity).await;
        count
    }

    pub async fn active_day_streak(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let state = self.state.lock().await;
        consecutive_days(&state.activity, today, self.lookback_days)
    }

    /// Recompute the day-dependent fields for `today`
    pub async fn refresh(&self, today: NaiveDate) -> StatsSnapshot {
        let mut state = self.state.lock().await;
        self.recompute_daily(&mut state, today);
        save_logged(self.store.as_ref(), STATS_KEY, &state.stats).await;
        state.stats.clone()
    }

    pub async fn record_session(&self, result: &SessionResult, today: NaiveDate) -> StatsSnapshot {
        let mut state = self.state.lock().await;
        self.apply_session(&mut state, result, today).await;
        state.stats.clone()
    }

    /// Refresh for `today` and record `result` under one lock, so the
    /// before and after snapshots differ only by this session
    pub async fn commit_session(
        &self,
        result: &SessionResult,
        today: NaiveDate,
    ) -> SessionCommit {
        let mut state = self.state.lock().await;
        self.recompute_daily(&mut state, today);
        let previous = state.stats.clone();
        self.apply_session(&mut state, result, today).await;
        SessionCommit {
            previous,
            recorded: state.stats.clone(),
        }
    }

    /// Finished sessions, oldest first
    pub async fn session_history(&self) -> Vec<SessionRecord> {
        self.state.lock().await.history.clone()
    }

    pub async fn increment_badge_counts(&self, ids: &[BadgeId]) -> StatsSnapshot {
        let mut state = self.state.lock().await;
        if ids.is_empty() {
            return state.stats.clone();
        }
        for id in ids {
            *state.stats.badge_earn_counts.entry(*id).or_insert(0) += 1;
        }
        save_logged(self.store.as_ref(), STATS_KEY, &state.stats).await;
        state.stats.clone()
    }

    /// Per-day problem counts for the last `days` days, oldest first
    pub async fn recent_activity(&self, today: NaiveDate, days: u32) -> Vec<DailyActivity> {
        let state = self.state.lock().await;
        (0..days)
            .rev()
            .map(|i| {
                let date = today - Duration::days(i64::from(i));
                DailyActivity {
                    date,
                    problems: state.activity.get(&date).copied().unwrap_or(0),
                }
            })
            .collect()
    }

    pub async fn remember_missed(&self, item_id: i64) {
        let mut state = self.state.lock().await;
        if state.missed.insert(item_id) {
            save_logged(self.store.as_ref(), MISSED_ITEMS_KEY, &state.missed).await;
        }
    }

    /// Drop an item from the missed set; true if it was there
    pub async fn forget_missed(&self, item_id: i64) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.missed.remove(&item_id);
        if removed {
            save_logged(self.store.as_ref(), MISSED_ITEMS_KEY, &state.missed).await;
        }
        removed
    }

    pub async fn was_missed(&self, item_id: i64) -> bool {
        self.state.lock().await.missed.contains(&item_id)
    }

    pub async fn reset(&self) -> StatsSnapshot {
        let mut state = self.state.lock().await;
        *state = StatsState::default();
        save_logged(self.store.as_ref(), STATS_KEY, &state.stats).await;
        save_logged(self.store.as_ref(), DAILY_ACTIVITY_KEY, &state.activity).await;
        save_logged(self.store.as_ref(), MISSED_ITEMS_KEY, &state.missed).await;
        save_logged(self.store.as_ref(), SESSION_HISTORY_KEY, &state.history).await;
        state.stats.clone()
    }

    async fn apply_session(
        &self,
        state: &mut StatsState,
        result: &SessionResult,
        today: NaiveDate,
    ) {
        *state.activity.entry(today).or_insert(0) += result.total_count;

        let correct = result.correct_count.min(result.total_count);
        let stats = &mut state.stats;
        stats.total_correct += correct;
        stats.total_attempts += result.total_count;
        stats.total_score += result.score_gained;
        stats.hard_question_correct += result.hard_correct;
        stats.retry_correct += result.retry_correct;
        stats.sessions_completed += 1;
        stats.max_streak = stats.max_streak.max(result.best_streak);
        stats.session_accuracy = session_accuracy(result);
        // 現在のストリークはセッション終了時にリセット
        stats.current_streak = 0;

        self.recompute_daily(state, today);

        state.history.push(SessionRecord::new(today, result));
        if state.history.len() > SESSION_HISTORY_LIMIT {
            let excess = state.history.len() - SESSION_HISTORY_LIMIT;
            state.history.drain(..excess);
        }
        debug!(
            sessions = state.stats.sessions_completed,
            accuracy = state.stats.session_accuracy,
            "Session recorded"
        );

        save_logged(self.store.as_ref(), DAILY_ACTIVITY_KEY, &state.activity).await;
        save_logged(self.store.as_ref(), STATS_KEY, &state.stats).await;
        save_logged(self.store.as_ref(), SESSION_HISTORY_KEY, &state.history).await;
    }

    fn recompute_daily(&self, state: &mut StatsState, today: NaiveDate) {
        state.stats.daily_problem_count = state.activity.get(&today).copied().unwrap_or(0);
        state.stats.active_days = consecutive_days(&state.activity, today, self.lookback_days);
    }
}
