//! Game engine façade
//!
//! Owns the in-memory ledger and serializes every operation on a player
//! behind that player's mutex. Each operation works on a clone: the clone is
//! settled, mutated, written to the store, and only then swapped in. A store
//! failure therefore leaves the in-memory player exactly as it was.
//!
//! Lock order is player, then goal.

use crate::build_queue::{enqueue, ensure_idle, settle};
use crate::donations::{donation_amount, DonationReceipt, GoalDetail, GoalSlot, GoalSummary};
use crate::leaderboard::{
    LeaderboardCache, LeaderboardConfig, LeaderboardEntry, LeaderboardKind, LeaderboardSnapshot,
    PlayerMetrics,
};
use crate::pricing::{build_duration, EconomyConfig};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use neon_core::constants::DONATION_PERCENTS;
use neon_core::{
    BuildTarget, Clock, GameError, GoalId, GoalState, Player, ProducerId, Result, UserId,
};
use neon_storage::LedgerStore;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot of a player after settlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    pub user_id: UserId,
    pub score: u64,
    pub click_power: u64,
    pub click_power_price: u64,
    pub total_clicks: u64,
    pub production_rate: u64,
}

/// Result of a click
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClickOutcome {
    pub score: u64,
    pub power: u64,
    pub clicks: u64,
}

/// Click power upgrade status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PowerInfo {
    pub power: u64,
    pub price: u64,
    pub score: u64,
    /// Duration of an upgrade build
    pub build_time: u64,
    pub is_building: bool,
    pub build_time_left: u64,
}

/// Producer line as seen by its owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProducerView {
    pub id: ProducerId,
    pub name: String,
    pub emoji: String,
    pub owned: u64,
    pub rate: u64,
    /// Price of the next unit
    pub cost: u64,
    /// Build time of the next unit
    pub build_time: u64,
    pub is_building: bool,
    pub build_time_left: u64,
}

/// Result of an accepted producer purchase
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PurchaseOutcome {
    pub producers: Vec<ProducerView>,
    pub score: u64,
    pub build_time: u64,
    pub build_time_left: u64,
}

/// Authoritative game state and operations
pub struct GameEngine {
    config: EconomyConfig,
    leaderboard: LeaderboardConfig,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    players: DashMap<UserId, Arc<Mutex<Player>>>,
    goals: BTreeMap<GoalId, GoalSlot>,
    snapshots: LeaderboardCache,
}

impl GameEngine {
    /// Build the engine and load the persisted ledger
    pub fn new(
        config: EconomyConfig,
        leaderboard: LeaderboardConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let players = DashMap::new();
        for player in store.load_players()? {
            players.insert(player.user_id.clone(), Arc::new(Mutex::new(player)));
        }

        let mut states: BTreeMap<GoalId, GoalState> = store
            .load_goal_states()?
            .into_iter()
            .map(|state| (state.goal_id, state))
            .collect();
        let goals = config
            .goals
            .iter()
            .map(|spec| {
                let state = states
                    .remove(&spec.id)
                    .unwrap_or_else(|| GoalState::new(spec.id));
                if state.total_donated != state.contributed_sum() {
                    tracing::warn!(
                        "Goal {} total {} does not match its contributions ({})",
                        spec.id,
                        state.total_donated,
                        state.contributed_sum()
                    );
                }
                (spec.id, GoalSlot::new(spec.clone(), state))
            })
            .collect();
        if !states.is_empty() {
            tracing::warn!(
                "Ignoring {} persisted goal(s) missing from configuration",
                states.len()
            );
        }

        tracing::info!(
            "Game engine loaded {} players, {} producers, {} goals",
            players.len(),
            config.producers.len(),
            config.goals.len()
        );

        Ok(Self {
            snapshots: LeaderboardCache::new(leaderboard.cache_ttl_secs),
            config,
            leaderboard,
            store,
            clock,
            players,
            goals,
        })
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Number of players in the ledger
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Create the player on first use
    pub fn ensure_player(&self, user_id: &str) -> Result<()> {
        self.slot(user_id).map(|_| ())
    }

    fn slot(&self, user_id: &str) -> Result<Arc<Mutex<Player>>> {
        if let Some(slot) = self.players.get(user_id) {
            return Ok(slot.value().clone());
        }
        match self.players.entry(user_id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let player = Player::new(user_id, self.config.initial_score, self.clock.now());
                self.store.save_player(&player)?;
                tracing::info!("Created player {}", user_id);
                let slot = Arc::new(Mutex::new(player));
                entry.insert(slot.clone());
                Ok(slot)
            }
        }
    }

    /// Persist `next` and publish it, or leave `current` untouched
    fn commit(&self, current: &mut MutexGuard<'_, Player>, next: Player) -> Result<()> {
        if **current == next {
            return Ok(());
        }
        self.store.save_player(&next)?;
        **current = next;
        Ok(())
    }

    /// Settled copy of `player` and whether a build job completed on the way
    ///
    /// Production alone is a pure function of `last_settled_at`, so a copy
    /// whose only change is accrued score never needs to be written back.
    fn settled(&self, player: &Player, now: i64) -> (Player, bool) {
        let mut settled = player.clone();
        let settlement = settle(&mut settled, now, &self.config);
        if settlement.is_empty() {
            return (settled, false);
        }
        for target in &settlement.completed {
            tracing::debug!("Player {} completed {:?}", settled.user_id, target);
        }
        let completed = !settlement.completed.is_empty();
        (settled, completed)
    }

    /// Run `op` on a settled copy of the player
    ///
    /// Returns the op's output with the committed player. When `op` rejects,
    /// only completed builds are committed.
    fn mutate<T>(
        &self,
        user_id: &str,
        op: impl FnOnce(&mut Player, i64) -> Result<T>,
    ) -> Result<(T, Player, i64)> {
        let slot = self.slot(user_id)?;
        let mut current = slot.lock();
        let now = self.clock.now();

        let (settled, completed) = self.settled(&current, now);

        let mut working = settled.clone();
        match op(&mut working, now) {
            Ok(out) => {
                // instant builds resolve before the response
                settle(&mut working, now, &self.config);
                self.commit(&mut current, working.clone())?;
                Ok((out, working, now))
            }
            Err(err) => {
                if completed {
                    self.commit(&mut current, settled)?;
                }
                Err(err)
            }
        }
    }

    /// Read a settled player
    ///
    /// The store is written only when a build completed.
    fn inspect<T>(&self, user_id: &str, read: impl FnOnce(&Player, i64) -> T) -> Result<T> {
        let slot = self.slot(user_id)?;
        let mut current = slot.lock();
        let now = self.clock.now();

        let (settled, completed) = self.settled(&current, now);
        let out = read(&settled, now);
        if completed {
            self.commit(&mut current, settled)?;
        }
        Ok(out)
    }

    /// `score += click_power`, `total_clicks += 1`
    pub fn click(&self, user_id: &str) -> Result<ClickOutcome> {
        let (_, player, _) = self.mutate(user_id, |player, _| {
            player.credit(player.click_power);
            player.total_clicks = player.total_clicks.saturating_add(1);
            Ok(())
        })?;
        Ok(ClickOutcome {
            score: player.score,
            power: player.click_power,
            clicks: player.total_clicks,
        })
    }

    /// Pay for the next click power tier and start building it
    pub fn upgrade_power(&self, user_id: &str) -> Result<PowerInfo> {
        let (_, player, now) = self.mutate(user_id, |player, now| {
            player.debit(player.click_power_price)?;
            ensure_idle(player, BuildTarget::ClickPower, now)?;
            enqueue(player, BuildTarget::ClickPower, now, self.config.power_build_seconds);
            tracing::debug!("Player {} started a click power upgrade", player.user_id);
            Ok(())
        })?;
        Ok(self.power_view(&player, now))
    }

    /// Pay for one unit of a producer and start building it
    pub fn buy_producer(&self, user_id: &str, producer_id: ProducerId) -> Result<PurchaseOutcome> {
        let spec = self
            .config
            .producer(producer_id)
            .ok_or(GameError::UnknownProducer(producer_id))?;
        let target = BuildTarget::Producer(producer_id);

        let (duration, player, now) = self.mutate(user_id, |player, now| {
            let cost = self.config.producer_cost(spec, player.owned(producer_id));
            player.debit(cost)?;
            ensure_idle(player, target, now)?;
            let duration = build_duration(cost);
            enqueue(player, target, now, duration);
            tracing::debug!(
                "Player {} bought {} for {} ({}s build)",
                player.user_id,
                spec.name,
                cost,
                duration
            );
            Ok(duration)
        })?;

        Ok(PurchaseOutcome {
            producers: self.producer_views(&player, now),
            score: player.score,
            build_time: duration,
            build_time_left: player.job_for(target).map(|job| job.time_left(now)).unwrap_or(0),
        })
    }

    /// Settled player snapshot
    pub fn state(&self, user_id: &str) -> Result<PlayerState> {
        self.inspect(user_id, |player, _| PlayerState {
            user_id: player.user_id.clone(),
            score: player.score,
            click_power: player.click_power,
            click_power_price: player.click_power_price,
            total_clicks: player.total_clicks,
            production_rate: self.config.production_rate(player),
        })
    }

    /// Click power and the status of its upgrade build
    pub fn power_info(&self, user_id: &str) -> Result<PowerInfo> {
        self.inspect(user_id, |player, now| self.power_view(player, now))
    }

    fn power_view(&self, player: &Player, now: i64) -> PowerInfo {
        let time_left = player
            .job_for(BuildTarget::ClickPower)
            .map(|job| job.time_left(now));
        PowerInfo {
            power: player.click_power,
            price: player.click_power_price,
            score: player.score,
            build_time: self.config.power_build_seconds,
            is_building: time_left.is_some(),
            build_time_left: time_left.unwrap_or(0),
        }
    }

    /// Every catalog line with the player's ownership and build status
    pub fn producers(&self, user_id: &str) -> Result<Vec<ProducerView>> {
        self.inspect(user_id, |player, now| self.producer_views(player, now))
    }

    fn producer_views(&self, player: &Player, now: i64) -> Vec<ProducerView> {
        self.config
            .producers
            .iter()
            .map(|spec| {
                let owned = player.owned(spec.id);
                let cost = self.config.producer_cost(spec, owned);
                let time_left = player
                    .job_for(BuildTarget::Producer(spec.id))
                    .map(|job| job.time_left(now));
                ProducerView {
                    id: spec.id,
                    name: spec.name.clone(),
                    emoji: spec.emoji.clone(),
                    owned,
                    rate: spec.rate,
                    cost,
                    build_time: build_duration(cost),
                    is_building: time_left.is_some(),
                    build_time_left: time_left.unwrap_or(0),
                }
            })
            .collect()
    }

    /// Total score per second
    pub fn production(&self, user_id: &str) -> Result<u64> {
        self.inspect(user_id, |player, _| self.config.production_rate(player))
    }

    /// Give `percent` of the current score to a goal
    pub fn donate(&self, user_id: &str, goal_id: GoalId, percent: u32) -> Result<DonationReceipt> {
        if !DONATION_PERCENTS.contains(&percent) {
            return Err(GameError::InvalidPercent(percent));
        }
        let goal = self.goals.get(&goal_id).ok_or(GameError::UnknownGoal(goal_id))?;

        let slot = self.slot(user_id)?;
        let mut current = slot.lock();
        let now = self.clock.now();

        let (settled, completed) = self.settled(&current, now);

        let amount = match donation_amount(settled.score, percent) {
            Ok(amount) => amount,
            Err(err) => {
                if completed {
                    self.commit(&mut current, settled)?;
                }
                return Err(err);
            }
        };
        let mut donor = settled;
        donor.debit(amount)?;

        let mut goal_state = goal.state.lock();
        let mut next_goal = goal_state.clone();
        next_goal.record(user_id, amount, now);

        self.store.commit_donation(&donor, &next_goal)?;
        *current = donor;
        *goal_state = next_goal;

        tracing::info!("Player {} donated {} to goal {}", user_id, amount, goal_id);
        Ok(DonationReceipt {
            amount,
            score: current.score,
            goal: GoalDetail::new(&goal.spec, &goal_state, user_id, self.leaderboard.mask_user_ids),
        })
    }

    /// All goals in configuration order
    pub fn goals(&self) -> Vec<GoalSummary> {
        self.config
            .goals
            .iter()
            .filter_map(|spec| self.goals.get(&spec.id))
            .map(GoalSlot::summary)
            .collect()
    }

    /// One goal with its top donors
    pub fn goal_detail(&self, requester: &str, goal_id: GoalId) -> Result<GoalDetail> {
        let goal = self.goals.get(&goal_id).ok_or(GameError::UnknownGoal(goal_id))?;
        Ok(goal.detail(requester, self.leaderboard.mask_user_ids))
    }

    /// Ranked board as seen by `requester`
    pub fn leaderboard(&self, kind: LeaderboardKind, requester: &str) -> Vec<LeaderboardEntry> {
        let now = self.clock.now();
        let snapshot = self.snapshots.get_or_refresh(now, || self.snapshot(now));
        snapshot.view(
            kind,
            requester,
            self.leaderboard.limit,
            self.leaderboard.mask_user_ids,
        )
    }

    fn snapshot(&self, now: i64) -> LeaderboardSnapshot {
        let slots: Vec<Arc<Mutex<Player>>> =
            self.players.iter().map(|entry| entry.value().clone()).collect();

        let metrics: Vec<PlayerMetrics> = slots
            .iter()
            .map(|slot| {
                let (player, _) = self.settled(&slot.lock(), now);
                PlayerMetrics {
                    production_rate: self.config.production_rate(&player),
                    score: player.score,
                    total_clicks: player.total_clicks,
                    user_id: player.user_id,
                }
            })
            .collect();
        tracing::debug!("Rebuilt leaderboard snapshot over {} players", metrics.len());
        LeaderboardSnapshot::build(&metrics, now)
    }
}
