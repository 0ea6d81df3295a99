use crate::config::EngineConfig;
use crate::models::LevelState;
use crate::storage::{self, KeyValueStore, LEVEL_KEY};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// XP needed to leave `level`: `floor(base * level^1.5)`
pub fn threshold_for(level: u32, base: u32) -> u32 {
    let level = f64::from(level.max(1));
    (f64::from(base.max(1)) * level * level.sqrt()).floor() as u32
}

/// Result of one XP award
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XpAward {
    pub state: LevelState,
    pub leveled_up: bool,
    pub levels_gained: u32,
}

/// Fold `amount` into `state`, consuming one threshold per level-up
pub fn advance(state: LevelState, amount: u32, base: u32) -> XpAward {
    let mut level = state.level.max(1);
    let mut xp = state.xp.saturating_add(amount);
    let mut threshold = threshold_for(level, base);
    let mut levels_gained = 0;

    while xp >= threshold {
        xp -= threshold;
        level += 1;
        levels_gained += 1;
        threshold = threshold_for(level, base);
    }

    XpAward {
        state: LevelState {
            level,
            xp,
            xp_for_next_level: threshold,
        },
        leveled_up: levels_gained > 0,
        levels_gained,
    }
}

/// XP and level of the player, persisted as a single record
pub struct LevelLedger {
    store: Arc<dyn KeyValueStore>,
    base: u32,
    state: Mutex<LevelState>,
}

impl LevelLedger {
    pub fn initial_state(base: u32) -> LevelState {
        LevelState {
            level: 1,
            xp: 0,
            xp_for_next_level: threshold_for(1, base),
        }
    }

    pub async fn load(store: Arc<dyn KeyValueStore>, config: &EngineConfig) -> Self {
        let base = config.level_base_xp;
        let state = match storage::load_record::<LevelState>(store.as_ref(), LEVEL_KEY).await {
            // The curve may have changed since the record was written
            Ok(Some(saved)) => advance(saved, 0, base).state,
            Ok(None) => Self::initial_state(base),
            Err(e) => {
                warn!("Failed to load level data, starting from level 1: {}", e);
                Self::initial_state(base)
            }
        };

        Self {
            store,
            base,
            state: Mutex::new(state),
        }
    }

    pub async fn current_state(&self) -> LevelState {
        *self.state.lock().await
    }

    pub async fn apply_xp(&self, amount: u32) -> XpAward {
        let mut state = self.state.lock().await;
        let award = advance(*state, amount, self.base);

        if let Err(e) = storage::save_record(self.store.as_ref(), LEVEL_KEY, &award.state).await {
            warn!("Failed to save level data: {}", e);
        }
        *state = award.state;

        if award.leveled_up {
            info!(
                new_level = award.state.level,
                levels_gained = award.levels_gained,
                "Level up"
            );
        }
        award
    }

    pub async fn reset(&self) -> LevelState {
        let mut state = self.state.lock().await;
        let initial = Self::initial_state(self.base);
        if let Err(e) = storage::save_record(self.store.as_ref(), LEVEL_KEY, &initial).await {
            warn!("Failed to save level data: {}", e);
        }
        *state = initial;
        initial
    }
}
