//! Collaborators the engine reads from and writes to

use crate::error::AppError;
use crate::models::{QuestionFilter, QuizItem};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub const LEVEL_KEY: &str = "kanjiyomi_level";
pub const STATS_KEY: &str = "kanjiyomi_user_stats";
pub const DAILY_ACTIVITY_KEY: &str = "kanjiyomi_daily_activity";
pub const MISSED_ITEMS_KEY: &str = "kanjiyomi_missed_items";
pub const DAILY_CHALLENGE_KEY: &str = "kanjiyomi_daily_challenge";
pub const SESSION_HISTORY_KEY: &str = "kanjiyomi_session_history";

/// Pool of quiz items, usually backed by the app's embedded database
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// All items matching the filter
    async fn query(&self, filter: &QuestionFilter) -> Result<Vec<QuizItem>, AppError>;

    /// Record when an item was last answered
    async fn mark_answered(&self, id: i64, at: DateTime<Local>) -> Result<(), AppError>;
}

/// String key-value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
}

/// Read and decode a JSON record; `Ok(None)` when the key was never written
pub async fn load_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, AppError> {
    match store.get(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub async fn save_record<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), AppError> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json).await
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryItemStore {
    items: RwLock<Vec<QuizItem>>,
}

impl MemoryItemStore {
    pub fn new(items: Vec<QuizItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub async fn get(&self, id: i64) -> Option<QuizItem> {
        self.items.read().await.iter().find(|i| i.id == id).cloned()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn query(&self, filter: &QuestionFilter) -> Result<Vec<QuizItem>, AppError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn mark_answered(&self, id: i64, at: DateTime<Local>) -> Result<(), AppError> {
        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(AppError::UnknownItem(id))?;
        item.last_answered_at = Some(at);
        Ok(())
    }
}
