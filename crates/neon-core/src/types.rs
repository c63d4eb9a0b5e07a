//! Core type definitions for Neon Clicker
//!
//! Scores, prices and counters are whole units. Timestamps are unix seconds.

use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Stable player identity (Telegram numeric id rendered as a string, or `guest`)
pub type UserId = String;

/// Catalog identifier of a producer line
pub type ProducerId = u32;

/// Identifier of a donation goal
pub type GoalId = u32;

/// System constants
pub mod constants {
    /// Click power of a fresh player
    pub const INITIAL_CLICK_POWER: u64 = 1;

    /// Price of the first click power upgrade
    pub const INITIAL_POWER_PRICE: u64 = 10;

    /// Highest cost that still builds instantly
    pub const BUILD_TIME_INSTANT_MAX_COST: u64 = 1_000_000;

    /// Cost at which build time saturates
    pub const BUILD_TIME_MAX_COST: u64 = 1_000_000_000_000;

    /// Longest build: 48 hours
    pub const BUILD_TIME_MAX_SECONDS: u64 = 172_800;

    /// Session lifetime: 90 days
    pub const SESSION_TTL_SECS: i64 = 90 * 24 * 3600;

    /// Maximum age of signed launch data: 24 hours
    pub const INIT_DATA_MAX_AGE_SECS: i64 = 24 * 3600;

    /// Allowed donation percentages
    pub const DONATION_PERCENTS: [u32; 4] = [10, 25, 50, 100];

    /// Entries returned per leaderboard
    pub const LEADERBOARD_LIMIT: usize = 20;

    /// Donors listed per goal
    pub const TOP_DONORS_LIMIT: usize = 10;

    /// Identity used when guest mode is enabled and no credentials are sent
    pub const GUEST_USER_ID: &str = "guest";
}

/// What a build job produces when it completes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BuildTarget {
    /// +1 click power tier
    ClickPower,
    /// +1 unit of the given producer
    Producer(ProducerId),
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClickPower => write!(f, "click_power"),
            Self::Producer(id) => write!(f, "producer:{}", id),
        }
    }
}

/// In-progress timed construction
///
/// `completes_at` is fixed at purchase time and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    pub target: BuildTarget,
    pub started_at: i64,
    pub duration_seconds: u64,
    pub completes_at: i64,
}

impl BuildJob {
    /// Create a job starting at `now`
    pub fn new(target: BuildTarget, now: i64, duration_seconds: u64) -> Self {
        let duration = i64::try_from(duration_seconds).unwrap_or(i64::MAX);
        Self {
            target,
            started_at: now,
            duration_seconds,
            completes_at: now.saturating_add(duration),
        }
    }

    /// Seconds until completion, zero once due
    pub fn time_left(&self, now: i64) -> u64 {
        u64::try_from(self.completes_at.saturating_sub(now)).unwrap_or(0)
    }

    /// Whether the job is due at `now`
    pub fn is_complete(&self, now: i64) -> bool {
        self.time_left(now) == 0
    }
}

/// A purchasable production line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerSpec {
    pub id: ProducerId,
    pub name: String,
    pub emoji: String,
    /// Price of the first unit
    pub base_cost: u64,
    /// Score per second per owned unit
    pub rate: u64,
}

/// Authoritative per-player ledger record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: UserId,
    pub score: u64,
    pub click_power: u64,
    pub click_power_price: u64,
    pub total_clicks: u64,
    /// Owned units per producer id (absent means zero)
    #[serde(default)]
    pub producers: BTreeMap<ProducerId, u64>,
    /// Active build jobs, at most one per target
    #[serde(default)]
    pub build_jobs: Vec<BuildJob>,
    /// Passive production has been credited up to this timestamp
    pub last_settled_at: i64,
    pub created_at: i64,
}

impl Player {
    /// Fresh player with default progression
    pub fn new(user_id: impl Into<UserId>, initial_score: u64, now: i64) -> Self {
        Self {
            user_id: user_id.into(),
            score: initial_score,
            click_power: constants::INITIAL_CLICK_POWER,
            click_power_price: constants::INITIAL_POWER_PRICE,
            total_clicks: 0,
            producers: BTreeMap::new(),
            build_jobs: Vec::new(),
            last_settled_at: now,
            created_at: now,
        }
    }

    /// Units owned of a producer
    pub fn owned(&self, producer_id: ProducerId) -> u64 {
        self.producers.get(&producer_id).copied().unwrap_or(0)
    }

    /// Active job for a target, if any
    pub fn job_for(&self, target: BuildTarget) -> Option<&BuildJob> {
        self.build_jobs.iter().find(|job| job.target == target)
    }

    /// Remove `amount` from the score, failing without mutation when short
    pub fn debit(&mut self, amount: u64) -> Result<()> {
        if self.score < amount {
            return Err(GameError::InsufficientFunds {
                required: amount,
                available: self.score,
            });
        }
        self.score -= amount;
        Ok(())
    }

    /// Add `amount` to the score
    pub fn credit(&mut self, amount: u64) {
        self.score = self.score.saturating_add(amount);
    }
}

/// Configured community donation goal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationGoalSpec {
    pub id: GoalId,
    pub name: String,
    pub target: u64,
}

/// One player's running contribution to a goal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub amount: u64,
    /// Time of the first donation, used for tie-breaking
    pub first_at: i64,
    /// Arrival order of the first donation, breaks ties within one second
    pub seq: u64,
}

/// Mutable side of a donation goal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalState {
    pub goal_id: GoalId,
    pub total_donated: u64,
    #[serde(default)]
    pub contributions: HashMap<UserId, Contribution>,
    #[serde(default)]
    pub next_seq: u64,
}

impl GoalState {
    /// Empty state for a goal
    pub fn new(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            ..Self::default()
        }
    }

    /// Credit a donation to the goal and the donor
    pub fn record(&mut self, user_id: &str, amount: u64, now: i64) {
        self.total_donated = self.total_donated.saturating_add(amount);
        match self.contributions.get_mut(user_id) {
            Some(contribution) => {
                contribution.amount = contribution.amount.saturating_add(amount);
            }
            None => {
                self.contributions.insert(
                    user_id.to_string(),
                    Contribution {
                        amount,
                        first_at: now,
                        seq: self.next_seq,
                    },
                );
                self.next_seq += 1;
            }
        }
    }

    /// Progress towards `target` in percent (may exceed 100)
    pub fn percent(&self, target: u64) -> f64 {
        if target == 0 {
            return 0.0;
        }
        self.total_donated as f64 / target as f64 * 100.0
    }

    /// Largest contributors, amount descending then earliest first
    pub fn top_donors(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut donors: Vec<(&UserId, &Contribution)> = self.contributions.iter().collect();
        donors.sort_by(|(_, a), (_, b)| {
            b.amount
                .cmp(&a.amount)
                .then(a.first_at.cmp(&b.first_at))
                .then(a.seq.cmp(&b.seq))
        });
        donors
            .into_iter()
            .take(limit)
            .map(|(user_id, c)| (user_id.as_str(), c.amount))
            .collect()
    }

    /// Sum of all recorded contributions
    pub fn contributed_sum(&self) -> u64 {
        self.contributions.values().map(|c| c.amount).sum()
    }
}

/// Telegram profile carried in signed launch data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

/// Issued bearer session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_user: Option<TelegramUser>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Mask a user id for public listings, keeping the first and last two characters
pub fn mask_user_id(user_id: &str) -> String {
    let chars: Vec<char> = user_id.chars().collect();
    if chars.len() < 4 {
        return "****".to_string();
    }
    let first: String = chars[..2].iter().collect();
    let last: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", first, "*".repeat(chars.len() - 4), last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_defaults() {
        let player = Player::new("42", 0, 100);
        assert_eq!(player.score, 0);
        assert_eq!(player.click_power, 1);
        assert_eq!(player.click_power_price, 10);
        assert_eq!(player.total_clicks, 0);
        assert_eq!(player.owned(1), 0);
        assert_eq!(player.last_settled_at, 100);
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        let mut player = Player::new("42", 5, 0);
        let err = player.debit(6).unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientFunds {
                required: 6,
                available: 5
            }
        );
        assert_eq!(player.score, 5);

        player.debit(5).unwrap();
        assert_eq!(player.score, 0);
    }

    #[test]
    fn test_build_job_time_left() {
        let job = BuildJob::new(BuildTarget::Producer(3), 1_000, 60);
        assert_eq!(job.completes_at, 1_060);
        assert_eq!(job.time_left(1_000), 60);
        assert_eq!(job.time_left(1_059), 1);
        assert!(job.is_complete(1_060));
        assert_eq!(job.time_left(2_000), 0);
    }

    #[test]
    fn test_build_target_serde() {
        let json = serde_json::to_string(&BuildTarget::Producer(7)).unwrap();
        assert_eq!(json, r#"{"kind":"producer","id":7}"#);
        let back: BuildTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BuildTarget::Producer(7));

        let power: BuildTarget = serde_json::from_str(r#"{"kind":"click_power"}"#).unwrap();
        assert_eq!(power, BuildTarget::ClickPower);
    }

    #[test]
    fn test_goal_record_and_top_donors() {
        let mut goal = GoalState::new(1);
        goal.record("alice", 50, 10);
        goal.record("bob", 80, 11);
        goal.record("carol", 50, 12);
        goal.record("alice", 0, 13);

        assert_eq!(goal.total_donated, 180);
        assert_eq!(goal.contributed_sum(), goal.total_donated);

        let top = goal.top_donors(10);
        assert_eq!(top, vec![("bob", 80), ("alice", 50), ("carol", 50)]);
        assert_eq!(goal.top_donors(1), vec![("bob", 80)]);
    }

    #[test]
    fn test_goal_ties_same_second_use_arrival_order() {
        let mut goal = GoalState::new(1);
        goal.record("zed", 10, 5);
        goal.record("amy", 10, 5);
        assert_eq!(goal.top_donors(2), vec![("zed", 10), ("amy", 10)]);
    }

    #[test]
    fn test_goal_percent() {
        let mut goal = GoalState::new(1);
        assert_eq!(goal.percent(0), 0.0);
        goal.record("a", 25, 0);
        assert!((goal.percent(100) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mask_user_id() {
        assert_eq!(mask_user_id("123456789"), "12*****89");
        assert_eq!(mask_user_id("1234"), "1234");
        assert_eq!(mask_user_id("abc"), "****");
        assert_eq!(mask_user_id(""), "****");
    }

    #[test]
    fn test_session_expiry() {
        let session = Session {
            session_id: "s".into(),
            user_id: "1".into(),
            telegram_user: None,
            created_at: 0,
            expires_at: 100,
        };
        assert!(!session.is_expired(100));
        assert!(session.is_expired(101));
    }
}
