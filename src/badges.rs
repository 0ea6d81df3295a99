//! Badge table and evaluation
//!
//! Badges are plain data: a rule kind plus a threshold, interpreted by one
//! dispatcher. The crown badge counts the others, so evaluation runs in two
//! passes and never lets it count itself.

use crate::models::{BadgeId, StatsSnapshot};
use serde::Serialize;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeRule {
    TotalCorrect,
    MaxStreak,
    DailyProblems,
    /// Last session's accuracy, in percent
    PerfectSession,
    ActiveDays,
    HardCorrect,
    RetryCorrect,
    TotalScore,
    /// Number of other badges currently earned
    AllOthers,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Badge {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub rule: BadgeRule,
    pub threshold: u32,
}

pub static BADGES: [Badge; 9] = [
    Badge {
        id: 1,
        name: "スタートバッジ",
        description: "最初の正解を達成した証",
        icon: "🐣",
        rule: BadgeRule::TotalCorrect,
        threshold: 1,
    },
    Badge {
        id: 2,
        name: "連続正解バッジ",
        description: "5問連続正解を達成",
        icon: "🔥",
        rule: BadgeRule::MaxStreak,
        threshold: 5,
    },
    Badge {
        id: 3,
        name: "学習の達人",
        description: "1日に20問以上解いた",
        icon: "📚",
        rule: BadgeRule::DailyProblems,
        threshold: 20,
    },
    Badge {
        id: 4,
        name: "ミスゼロバッジ",
        description: "1回のセッションで全問正解",
        icon: "💎",
        rule: BadgeRule::PerfectSession,
        threshold: 100,
    },
    Badge {
        id: 5,
        name: "継続バッジ",
        description: "3日連続で利用",
        icon: "🕒",
        rule: BadgeRule::ActiveDays,
        threshold: 3,
    },
    Badge {
        id: 6,
        name: "難問突破バッジ",
        description: "難問（レベル7）に正解した回数1回以上",
        icon: "🐉",
        rule: BadgeRule::HardCorrect,
        threshold: 1,
    },
    Badge {
        id: 7,
        name: "復習マスター",
        description: "間違った問題を再挑戦して正解",
        icon: "🧠",
        rule: BadgeRule::RetryCorrect,
        threshold: 1,
    },
    Badge {
        id: 8,
        name: "目標達成バッジ",
        description: "累計スコア100点以上",
        icon: "🎯",
        rule: BadgeRule::TotalScore,
        threshold: 100,
    },
    Badge {
        id: 9,
        name: "王者の証",
        description: "他の8個すべてを獲得",
        icon: "👑",
        rule: BadgeRule::AllOthers,
        threshold: 8,
    },
];

impl Badge {
    /// Get the display text for this badge
    pub fn get_display_text(&self) -> String {
        format!("{} {}", self.name, self.icon)
    }

    fn is_earned(&self, stats: &StatsSnapshot, others_earned: u32) -> bool {
        let value = match self.rule {
            BadgeRule::TotalCorrect => stats.total_correct,
            BadgeRule::MaxStreak => stats.max_streak,
            BadgeRule::DailyProblems => stats.daily_problem_count,
            BadgeRule::PerfectSession => {
                return stats.session_accuracy >= f64::from(self.threshold);
            }
            BadgeRule::ActiveDays => stats.active_days.len() as u32,
            BadgeRule::HardCorrect => stats.hard_question_correct,
            BadgeRule::RetryCorrect => stats.retry_correct,
            BadgeRule::TotalScore => stats.total_score,
            BadgeRule::AllOthers => others_earned,
        };
        value >= self.threshold
    }
}

pub fn find_badge(id: BadgeId) -> Option<&'static Badge> {
    BADGES.iter().find(|b| b.id == id)
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct BadgeStatus {
    pub badge: &'static Badge,
    pub earned: bool,
    pub earned_count: u32,
}

/// Number of earned badges, not counting the ones that count others
pub fn earned_badge_count(stats: &StatsSnapshot) -> u32 {
    BADGES
        .iter()
        .filter(|b| b.rule != BadgeRule::AllOthers && b.is_earned(stats, 0))
        .count() as u32
}

pub fn evaluate(stats: &StatsSnapshot) -> Vec<BadgeStatus> {
    let others_earned = earned_badge_count(stats);

    BADGES
        .iter()
        .map(|badge| {
            let earned = badge.is_earned(stats, others_earned);
            let earned_count = match stats.badge_earn_counts.get(&badge.id) {
                Some(&count) if count > 0 => count,
                _ if earned => 1,
                _ => 0,
            };
            BadgeStatus {
                badge,
                earned,
                earned_count,
            }
        })
        .collect()
}

/// Badges earned under `current` but not under `previous`.
/// Without a previous snapshot every earned badge counts as new.
pub fn diff_newly_earned(
    current: &StatsSnapshot,
    previous: Option<&StatsSnapshot>,
) -> Vec<&'static Badge> {
    let current_badges = evaluate(current);

    let Some(previous) = previous else {
        return current_badges
            .into_iter()
            .filter(|s| s.earned)
            .map(|s| s.badge)
            .collect();
    };

    let previous_badges = evaluate(previous);
    current_badges
        .into_iter()
        .filter(|now| {
            now.earned
                && !previous_badges
                    .iter()
                    .any(|before| before.badge.id == now.badge.id && before.earned)
        })
        .map(|s| s.badge)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn all_eight() -> StatsSnapshot {
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        StatsSnapshot {
            total_correct: 50,
            total_attempts: 60,
            max_streak: 5,
            daily_problem_count: 20,
            session_accuracy: 100.0,
            active_days: vec![day(3), day(2), day(1)],
            hard_question_correct: 1,
            retry_correct: 1,
            total_score: 500,
            ..Default::default()
        }
    }

    fn earned_ids(stats: &StatsSnapshot) -> Vec<BadgeId> {
        evaluate(stats)
            .into_iter()
            .filter(|s| s.earned)
            .map(|s| s.badge.id)
            .collect()
    }

    #[test]
    fn test_fresh_stats_earn_nothing() {
        assert!(earned_ids(&StatsSnapshot::default()).is_empty());
    }

    #[test]
    fn test_single_rules() {
        let stats = StatsSnapshot {
            total_correct: 1,
            total_attempts: 10,
            session_accuracy: 10.0,
            total_score: 100,
            ..Default::default()
        };
        assert_eq!(earned_ids(&stats), vec![1, 8]);
    }

    #[test]
    fn test_near_perfect_session_is_not_perfect() {
        let stats = StatsSnapshot {
            session_accuracy: 99.99,
            ..Default::default()
        };
        assert!(!earned_ids(&stats).contains(&4));
    }

    #[test]
    fn test_crown_badge_needs_all_eight() {
        let stats = all_eight();
        assert_eq!(earned_badge_count(&stats), 8);
        assert!(earned_ids(&stats).contains(&9));

        let seven = StatsSnapshot {
            retry_correct: 0,
            ..all_eight()
        };
        assert_eq!(earned_badge_count(&seven), 7);
        assert!(!earned_ids(&seven).contains(&9));
    }

    #[test]
    fn test_earned_count_defaults() {
        let mut stats = StatsSnapshot {
            total_correct: 1,
            total_attempts: 1,
            ..Default::default()
        };
        stats.badge_earn_counts.insert(2, 4);

        let statuses = evaluate(&stats);
        assert_eq!(statuses[0].earned_count, 1); // earned, never counted
        assert_eq!(statuses[1].earned_count, 4); // counted, not earned now
        assert_eq!(statuses[2].earned_count, 0);
    }

    #[test]
    fn test_zero_count_on_earned_badge_counts_once() {
        let mut stats = StatsSnapshot {
            total_correct: 1,
            total_attempts: 1,
            ..Default::default()
        };
        stats.badge_earn_counts.insert(1, 0);
        stats.badge_earn_counts.insert(2, 0);

        let statuses = evaluate(&stats);
        assert_eq!(statuses[0].earned_count, 1);
        assert_eq!(statuses[1].earned_count, 0);
    }

    #[test]
    fn test_diff_without_previous_reports_all_earned() {
        let stats = all_eight();
        assert_eq!(diff_newly_earned(&stats, None).len(), 9);
    }

    #[test]
    fn test_diff_of_identical_snapshots_is_empty() {
        let stats = all_eight();
        assert!(diff_newly_earned(&stats, Some(&stats)).is_empty());
    }

    #[test]
    fn test_diff_reports_only_new_badges() {
        let before = StatsSnapshot {
            retry_correct: 0,
            ..all_eight()
        };
        let after = all_eight();
        let ids: Vec<BadgeId> = diff_newly_earned(&after, Some(&before))
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![7, 9]);
    }

    #[test]
    fn test_find_badge() {
        assert_eq!(find_badge(9).unwrap().get_display_text(), "王者の証 👑");
        assert!(find_badge(10).is_none());
    }
}
