use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a badge definition (1-based, matches `Badge::id`)
pub type BadgeId = u8;

pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 6;
pub const MIN_DIFFICULTY: u8 = 1;
/// Difficulty of the hardest questions; correct answers on these count as hard-correct
pub const MAX_DIFFICULTY: u8 = 7;

/// One reading question: a sentence with the kanji word to be read
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QuizItem {
    pub id: i64,
    pub kanji: String,
    pub sentence: String,
    pub target: String,
    pub reading: String,
    pub difficulty: u8,
    pub grade: u8,
    #[serde(default)]
    pub last_answered_at: Option<DateTime<Local>>,
}

impl QuizItem {
    /// Check a typed answer against the expected reading
    pub fn check_reading(&self, answer: &str) -> bool {
        answer.trim() == self.reading
    }

    pub fn is_hard(&self) -> bool {
        self.difficulty >= MAX_DIFFICULTY
    }

    pub fn is_answered(&self) -> bool {
        self.last_answered_at.is_some()
    }
}

/// Range of questions the player wants to be asked
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuestionFilter {
    pub min_grade: u8,
    pub max_grade: u8,
    pub max_difficulty: u8,
}

impl Default for QuestionFilter {
    fn default() -> Self {
        Self {
            min_grade: MIN_GRADE,
            max_grade: MAX_GRADE,
            max_difficulty: MAX_DIFFICULTY,
        }
    }
}

impl QuestionFilter {
    pub fn new(max_grade: u8, max_difficulty: u8) -> Self {
        Self {
            min_grade: MIN_GRADE,
            max_grade: max_grade.clamp(MIN_GRADE, MAX_GRADE),
            max_difficulty: max_difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
        }
    }

    pub fn matches(&self, item: &QuizItem) -> bool {
        item.grade >= self.min_grade
            && item.grade <= self.max_grade
            && item.difficulty <= self.max_difficulty
    }

    /// Raise or lower the lowest grade, dragging the other bounds along so the range stays non-empty
    pub fn set_min_grade(&mut self, grade: u8) {
        let grade = grade.clamp(MIN_GRADE, MAX_GRADE);
        if grade > self.max_grade {
            self.max_grade = grade;
        }
        if self.max_difficulty < grade {
            self.max_difficulty = grade;
        }
        self.min_grade = grade;
    }

    pub fn set_max_grade(&mut self, grade: u8) {
        let grade = grade.clamp(MIN_GRADE, MAX_GRADE);
        if grade < self.min_grade {
            self.min_grade = grade;
        }
        self.max_grade = grade;
    }

    pub fn set_max_difficulty(&mut self, difficulty: u8) {
        self.max_difficulty = difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
    }
}

impl fmt::Display for QuestionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grade {}-{}, difficulty <= {}",
            self.min_grade, self.max_grade, self.max_difficulty
        )
    }
}

/// Cumulative player statistics, the input to badge evaluation
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct StatsSnapshot {
    pub total_correct: u32,
    pub total_attempts: u32,
    pub max_streak: u32,
    pub current_streak: u32,
    pub daily_problem_count: u32,
    pub session_accuracy: f64,
    /// Consecutive active days ending today, most recent first
    pub active_days: Vec<NaiveDate>,
    pub hard_question_correct: u32,
    pub retry_correct: u32,
    pub total_score: u32,
    pub sessions_completed: u32,
    pub badge_earn_counts: BTreeMap<BadgeId, u32>,
}

impl StatsSnapshot {
    pub fn overall_accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        100.0 * f64::from(self.total_correct) / f64::from(self.total_attempts)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelState {
    pub level: u32,
    pub xp: u32,
    pub xp_for_next_level: u32,
}

impl LevelState {
    /// Fraction of the way to the next level, in `0.0..1.0`
    pub fn progress_ratio(&self) -> f64 {
        if self.xp_for_next_level == 0 {
            return 0.0;
        }
        f64::from(self.xp) / f64::from(self.xp_for_next_level)
    }
}

/// Outcome of one finished session, consumed by the coordinator right away
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionResult {
    pub correct_count: u32,
    pub total_count: u32,
    /// Longest run of consecutive correct answers within the session
    pub best_streak: u32,
    pub score_gained: u32,
    pub hard_correct: u32,
    pub retry_correct: u32,
}

impl SessionResult {
    pub fn is_perfect(&self) -> bool {
        self.total_count > 0 && self.correct_count == self.total_count
    }

    /// One to three stars; a session with no questions earns none
    pub fn stars(&self) -> u8 {
        if self.total_count == 0 {
            return 0;
        }
        let correct = self.correct_count.min(self.total_count);
        let stars = correct * 3 / self.total_count + 1;
        stars.min(3) as u8
    }
}

/// One finished session as kept in the session history
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub date: NaiveDate,
    pub correct_count: u32,
    pub total_count: u32,
    pub stars: u8,
}

impl SessionRecord {
    pub fn new(date: NaiveDate, result: &SessionResult) -> Self {
        Self {
            date,
            correct_count: result.correct_count.min(result.total_count),
            total_count: result.total_count,
            stars: result.stars(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DailyChallenge {
    pub date: NaiveDate,
    pub goal: u32,
    pub progress: u32,
    pub completed: bool,
}

impl DailyChallenge {
    pub fn new(date: NaiveDate, goal: u32) -> Self {
        Self {
            date,
            goal,
            progress: 0,
            completed: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.goal.saturating_sub(self.progress)
    }
}

/// Number of problems answered on one day
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub problems: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(grade: u8, difficulty: u8) -> QuizItem {
        QuizItem {
            id: 1,
            kanji: "山".to_string(),
            sentence: "山に登る。".to_string(),
            target: "山".to_string(),
            reading: "やま".to_string(),
            difficulty,
            grade,
            last_answered_at: None,
        }
    }

    #[test]
    fn test_check_reading_trims_input() {
        let q = item(1, 1);
        assert!(q.check_reading("  やま "));
        assert!(!q.check_reading("さん"));
    }

    #[test]
    fn test_filter_bounds() {
        let filter = QuestionFilter::new(3, 4);
        assert!(filter.matches(&item(3, 4)));
        assert!(!filter.matches(&item(4, 1)));
        assert!(!filter.matches(&item(1, 5)));
    }

    #[test]
    fn test_min_grade_drags_other_bounds() {
        let mut filter = QuestionFilter::new(2, 1);
        filter.set_min_grade(4);
        assert_eq!(filter.min_grade, 4);
        assert_eq!(filter.max_grade, 4);
        assert_eq!(filter.max_difficulty, 4);

        filter.set_max_grade(2);
        assert_eq!(filter.min_grade, 2);
        assert_eq!(filter.max_grade, 2);
    }

    #[test]
    fn test_stars() {
        let result = |correct| SessionResult {
            correct_count: correct,
            total_count: 10,
            ..Default::default()
        };
        assert_eq!(result(0).stars(), 1);
        assert_eq!(result(4).stars(), 2);
        assert_eq!(result(7).stars(), 3);
        assert_eq!(result(10).stars(), 3);
        assert_eq!(SessionResult::default().stars(), 0);
    }

    #[test]
    fn test_stats_snapshot_fills_missing_fields() {
        let stats: StatsSnapshot = serde_json::from_str(r#"{"total_correct": 3}"#).unwrap();
        assert_eq!(stats.total_correct, 3);
        assert_eq!(stats.total_attempts, 0);
        assert!(stats.badge_earn_counts.is_empty());
    }

    #[test]
    fn test_accuracy_and_progress_ratios() {
        assert_eq!(StatsSnapshot::default().overall_accuracy(), 0.0);
        let stats = StatsSnapshot {
            total_correct: 3,
            total_attempts: 4,
            ..Default::default()
        };
        assert_eq!(stats.overall_accuracy(), 75.0);

        let level = LevelState {
            level: 1,
            xp: 25,
            xp_for_next_level: 50,
        };
        assert_eq!(level.progress_ratio(), 0.5);
        let empty = LevelState {
            xp_for_next_level: 0,
            ..level
        };
        assert_eq!(empty.progress_ratio(), 0.0);
    }

    #[test]
    fn test_session_record_clamps_correct_count() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let result = SessionResult {
            correct_count: 12,
            total_count: 10,
            ..Default::default()
        };
        let record = SessionRecord::new(date, &result);
        assert_eq!(record.correct_count, 10);
        assert_eq!(record.stars, 3);
    }
}
