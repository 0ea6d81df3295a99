use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{QuestionFilter, QuizItem};
use crate::storage::ItemStore;
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// Never-answered items sort first, then the longest-unseen ones
fn rank(item: &QuizItem) -> (bool, Option<DateTime<Local>>) {
    (item.is_answered(), item.last_answered_at)
}

/// Chooses the next question from the item store
pub struct QuestionSelector {
    items: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl QuestionSelector {
    pub fn new(items: Arc<dyn ItemStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(items, clock, StdRng::from_os_rng())
    }

    pub fn with_rng(items: Arc<dyn ItemStore>, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self { items, clock, rng }
    }

    /// Pick the best-ranked item matching `filter`, breaking ties at random
    pub fn pick<'a, R: Rng + ?Sized>(
        pool: &'a [QuizItem],
        filter: &QuestionFilter,
        rng: &mut R,
    ) -> Result<&'a QuizItem, AppError> {
        let candidates: Vec<&QuizItem> = pool.iter().filter(|item| filter.matches(item)).collect();
        let empty = || AppError::EmptyPoolError { filter: *filter };

        let best = candidates.iter().map(|item| rank(item)).min().ok_or_else(empty)?;
        let ties: Vec<&QuizItem> = candidates
            .into_iter()
            .filter(|item| rank(item) == best)
            .collect();

        ties.choose(rng).copied().ok_or_else(empty)
    }

    pub async fn next(&mut self, filter: &QuestionFilter) -> Result<QuizItem, AppError> {
        let pool = self.items.query(filter).await?;
        let item = Self::pick(&pool, filter, &mut self.rng)?;
        debug!(item = item.id, candidates = pool.len(), "Question selected");
        Ok(item.clone())
    }

    /// Stamp an item as answered now so it drops to the back of the queue
    pub async fn mark_answered(&self, item_id: i64) -> Result<(), AppError> {
        self.items.mark_answered(item_id, self.clock.now()).await
    }
}
