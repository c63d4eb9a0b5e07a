//! Leaderboard Aggregator
//!
//! Rankings are derived from settled copies of the ledger and are never
//! authoritative. A snapshot is cached for `cache_ttl_secs` and rebuilt
//! lazily on the first read after it goes stale.

use neon_core::constants::LEADERBOARD_LIMIT;
use neon_core::{mask_user_id, UserId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Leaderboard settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Rows returned per board
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Publish `12****89` style ids instead of raw ones
    #[serde(default = "default_mask_user_ids")]
    pub mask_user_ids: bool,

    /// Snapshot freshness bound in seconds (0 disables the cache)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_limit() -> usize {
    LEADERBOARD_LIMIT
}

fn default_mask_user_ids() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    2
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            mask_user_ids: default_mask_user_ids(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Ranked metric
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    /// Current score
    Richest,
    /// Passive production per second
    PerSecond,
    /// Lifetime clicks
    Clicks,
}

/// Raw metrics of one player at snapshot time
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerMetrics {
    pub user_id: UserId,
    pub score: u64,
    pub production_rate: u64,
    pub total_clicks: u64,
}

/// One ranked row with an unmasked id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedEntry {
    pub user_id: UserId,
    pub value: u64,
}

/// Row returned to a requester
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub value: u64,
    pub is_self: bool,
}

/// All three rankings computed from one pass over the ledger
#[derive(Clone, Debug, Default)]
pub struct LeaderboardSnapshot {
    pub taken_at: i64,
    pub richest: Vec<RankedEntry>,
    pub per_second: Vec<RankedEntry>,
    pub clicks: Vec<RankedEntry>,
}

impl LeaderboardSnapshot {
    /// Rank `metrics`, keeping the full ordering
    pub fn build(metrics: &[PlayerMetrics], taken_at: i64) -> Self {
        Self {
            taken_at,
            richest: rank(metrics, |m| Some(m.score)),
            per_second: rank(metrics, |m| Some(m.production_rate).filter(|v| *v > 0)),
            clicks: rank(metrics, |m| Some(m.total_clicks).filter(|v| *v > 0)),
        }
    }

    pub fn ranking(&self, kind: LeaderboardKind) -> &[RankedEntry] {
        match kind {
            LeaderboardKind::Richest => &self.richest,
            LeaderboardKind::PerSecond => &self.per_second,
            LeaderboardKind::Clicks => &self.clicks,
        }
    }

    /// Top `limit` rows as seen by `requester`
    pub fn view(
        &self,
        kind: LeaderboardKind,
        requester: &str,
        limit: usize,
        mask_ids: bool,
    ) -> Vec<LeaderboardEntry> {
        self.ranking(kind)
            .iter()
            .take(limit)
            .map(|entry| LeaderboardEntry {
                user_id: if mask_ids {
                    mask_user_id(&entry.user_id)
                } else {
                    entry.user_id.clone()
                },
                value: entry.value,
                is_self: entry.user_id == requester,
            })
            .collect()
    }
}

/// Value descending, user id ascending
fn rank(metrics: &[PlayerMetrics], value: impl Fn(&PlayerMetrics) -> Option<u64>) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = metrics
        .iter()
        .filter_map(|m| {
            value(m).map(|value| RankedEntry {
                user_id: m.user_id.clone(),
                value,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.user_id.cmp(&b.user_id)));
    ranked
}

/// Time-bounded snapshot cache
pub struct LeaderboardCache {
    ttl_secs: i64,
    current: Mutex<Option<Arc<LeaderboardSnapshot>>>,
}

impl LeaderboardCache {
    /// A ttl of zero disables caching
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            current: Mutex::new(None),
        }
    }

    /// Cached snapshot if still fresh at `now`, otherwise rebuild with `build`
    pub fn get_or_refresh(
        &self,
        now: i64,
        build: impl FnOnce() -> LeaderboardSnapshot,
    ) -> Arc<LeaderboardSnapshot> {
        if self.ttl_secs == 0 {
            return Arc::new(build());
        }

        let mut current = self.current.lock();
        if let Some(snapshot) = current.as_ref() {
            let age = now.saturating_sub(snapshot.taken_at);
            if (0..self.ttl_secs).contains(&age) {
                return snapshot.clone();
            }
        }
        let fresh = Arc::new(build());
        *current = Some(fresh.clone());
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(user_id: &str, score: u64, rate: u64, clicks: u64) -> PlayerMetrics {
        PlayerMetrics {
            user_id: user_id.to_string(),
            score,
            production_rate: rate,
            total_clicks: clicks,
        }
    }

    fn sample() -> Vec<PlayerMetrics> {
        vec![
            metrics("300000003", 50, 0, 10),
            metrics("100000001", 90, 7, 0),
            metrics("200000002", 50, 7, 3),
        ]
    }

    #[test]
    fn test_richest_ties_by_user_id() {
        let snapshot = LeaderboardSnapshot::build(&sample(), 0);
        let ids: Vec<&str> = snapshot.richest.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, vec!["100000001", "200000002", "300000003"]);
    }

    #[test]
    fn test_zero_metrics_excluded() {
        let snapshot = LeaderboardSnapshot::build(&sample(), 0);
        assert_eq!(snapshot.per_second.len(), 2);
        assert_eq!(snapshot.per_second[0].user_id, "100000001");
        assert_eq!(snapshot.clicks.len(), 2);
        assert_eq!(snapshot.clicks[0].value, 10);
    }

    #[test]
    fn test_view_masks_and_flags_self() {
        let snapshot = LeaderboardSnapshot::build(&sample(), 0);
        let view = snapshot.view(LeaderboardKind::Richest, "200000002", 2, true);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].user_id, "10*****01");
        assert!(!view[0].is_self);
        assert!(view[1].is_self);

        let raw = snapshot.view(LeaderboardKind::Richest, "nobody", 20, false);
        assert_eq!(raw[2].user_id, "300000003");
        assert!(raw.iter().all(|e| !e.is_self));
    }

    #[test]
    fn test_ordering_stable_across_rebuilds() {
        let mut shuffled = sample();
        shuffled.reverse();
        let a = LeaderboardSnapshot::build(&sample(), 0);
        let b = LeaderboardSnapshot::build(&shuffled, 0);
        assert_eq!(a.richest, b.richest);
        assert_eq!(a.per_second, b.per_second);
        assert_eq!(a.clicks, b.clicks);
    }

    #[test]
    fn test_cache_ttl() {
        let cache = LeaderboardCache::new(2);
        let first = cache.get_or_refresh(10, || LeaderboardSnapshot::build(&sample(), 10));
        let cached = cache.get_or_refresh(11, || panic!("should be cached"));
        assert!(Arc::ptr_eq(&first, &cached));

        let rebuilt = cache.get_or_refresh(12, || LeaderboardSnapshot::build(&[], 12));
        assert!(rebuilt.richest.is_empty());

        let kept = cache.get_or_refresh(13, || panic!("should be cached"));
        assert!(Arc::ptr_eq(&rebuilt, &kept));
    }

    #[test]
    fn test_cache_disabled() {
        let cache = LeaderboardCache::new(0);
        cache.get_or_refresh(0, || LeaderboardSnapshot::build(&sample(), 0));
        let again = cache.get_or_refresh(0, || LeaderboardSnapshot::build(&[], 0));
        assert!(again.richest.is_empty());
    }
}
