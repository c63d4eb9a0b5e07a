//! Build-queue resolution and passive production
//!
//! Nothing ticks in the background. `settle` replays everything that happened
//! to a player between `last_settled_at` and `now`: production is credited
//! piecewise, and each due job is applied at its own `completes_at` so a
//! producer that finished mid-interval earns from that second onwards.

use crate::pricing::EconomyConfig;
use neon_core::{BuildJob, BuildTarget, GameError, Player, Result};

/// Outcome of settling a player
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Score credited by passive production
    pub produced: u64,
    /// Jobs applied, in completion order
    pub completed: Vec<BuildTarget>,
}

impl Settlement {
    pub fn is_empty(&self) -> bool {
        self.produced == 0 && self.completed.is_empty()
    }
}

/// Bring a player up to date with `now`
///
/// Idempotent: settling twice at the same `now` changes nothing the second
/// time. A clock reading behind `last_settled_at` is treated as no elapsed
/// time.
pub fn settle(player: &mut Player, now: i64, config: &EconomyConfig) -> Settlement {
    let mut settlement = Settlement::default();

    let mut due: Vec<BuildJob> = Vec::new();
    player.build_jobs.retain(|job| {
        if job.is_complete(now) {
            due.push(job.clone());
            false
        } else {
            true
        }
    });
    due.sort_by(|a, b| a.completes_at.cmp(&b.completes_at).then(a.target.cmp(&b.target)));

    for job in due {
        settlement.produced = settlement
            .produced
            .saturating_add(accrue(player, job.completes_at, config));
        apply_completion(player, job.target, config);
        settlement.completed.push(job.target);
    }
    settlement.produced = settlement
        .produced
        .saturating_add(accrue(player, now, config));

    settlement
}

/// Credit production from `last_settled_at` up to `until`
fn accrue(player: &mut Player, until: i64, config: &EconomyConfig) -> u64 {
    if until <= player.last_settled_at {
        return 0;
    }
    let elapsed = u64::try_from(until - player.last_settled_at).unwrap_or(0);
    player.last_settled_at = until;

    if !config.passive_production {
        return 0;
    }
    let amount = config.production_rate(player).saturating_mul(elapsed);
    player.credit(amount);
    amount
}

fn apply_completion(player: &mut Player, target: BuildTarget, config: &EconomyConfig) {
    match target {
        BuildTarget::ClickPower => {
            player.click_power = config.next_power(player.click_power);
            player.click_power_price = player
                .click_power_price
                .saturating_add(config.power_price_increment);
        }
        BuildTarget::Producer(id) => {
            *player.producers.entry(id).or_insert(0) += 1;
        }
    }
    tracing::debug!("Build {} completed for {}", target, player.user_id);
}

/// Reject a purchase while a job for the same target is still building
pub fn ensure_idle(player: &Player, target: BuildTarget, now: i64) -> Result<()> {
    match player.job_for(target) {
        Some(job) => Err(GameError::BuildInProgress {
            time_left: job.time_left(now),
        }),
        None => Ok(()),
    }
}

/// Queue a job; an instant build resolves on the next settle at the same `now`
pub fn enqueue(player: &mut Player, target: BuildTarget, now: i64, duration_seconds: u64) {
    player
        .build_jobs
        .push(BuildJob::new(target, now, duration_seconds));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EconomyConfig {
        EconomyConfig::default()
    }

    #[test]
    fn test_production_accrues_per_second() {
        let config = config();
        let mut player = Player::new("1", 0, 100);
        player.producers.insert(1, 2); // 2 * 1/s

        let s = settle(&mut player, 110, &config);
        assert_eq!(s.produced, 20);
        assert_eq!(player.score, 20);
        assert_eq!(player.last_settled_at, 110);
    }

    #[test]
    fn test_job_applies_mid_interval() {
        let config = config();
        let mut player = Player::new("1", 0, 0);
        player.producers.insert(1, 1); // 1/s
        enqueue(&mut player, BuildTarget::Producer(4), 0, 10); // +5/s at t=10

        let s = settle(&mut player, 20, &config);
        assert_eq!(s.completed, vec![BuildTarget::Producer(4)]);
        // 10s at 1/s, then 10s at 6/s
        assert_eq!(player.score, 10 + 60);
        assert_eq!(player.owned(4), 1);
        assert!(player.build_jobs.is_empty());
    }

    #[test]
    fn test_jobs_apply_in_completion_order() {
        let config = config();
        let mut player = Player::new("1", 0, 0);
        enqueue(&mut player, BuildTarget::Producer(4), 0, 30);
        enqueue(&mut player, BuildTarget::Producer(1), 0, 10);

        settle(&mut player, 40, &config);
        // 20s of 1/s from producer 1, then 10s of 6/s
        assert_eq!(player.score, 20 + 60);
    }

    #[test]
    fn test_settle_is_idempotent() {
        let config = config();
        let mut player = Player::new("1", 0, 0);
        enqueue(&mut player, BuildTarget::ClickPower, 0, 2);

        settle(&mut player, 5, &config);
        let once = player.clone();
        let again = settle(&mut player, 5, &config);

        assert!(again.is_empty());
        assert_eq!(player, once);
        assert_eq!(player.click_power, 2);
        assert_eq!(player.click_power_price, 20);
    }

    #[test]
    fn test_pending_job_is_kept() {
        let config = config();
        let mut player = Player::new("1", 0, 0);
        enqueue(&mut player, BuildTarget::ClickPower, 0, 100);

        let s = settle(&mut player, 99, &config);
        assert!(s.completed.is_empty());
        assert_eq!(player.click_power, 1);
        assert_eq!(
            ensure_idle(&player, BuildTarget::ClickPower, 99),
            Err(GameError::BuildInProgress { time_left: 1 })
        );
        assert!(ensure_idle(&player, BuildTarget::Producer(1), 99).is_ok());
    }

    #[test]
    fn test_clock_going_backwards() {
        let config = config();
        let mut player = Player::new("1", 0, 100);
        player.producers.insert(1, 1);

        assert!(settle(&mut player, 50, &config).is_empty());
        assert_eq!(player.last_settled_at, 100);
    }

    #[test]
    fn test_passive_production_disabled() {
        let config = EconomyConfig {
            passive_production: false,
            ..EconomyConfig::default()
        };
        let mut player = Player::new("1", 0, 0);
        player.producers.insert(1, 5);

        settle(&mut player, 1_000, &config);
        assert_eq!(player.score, 0);
        assert_eq!(player.last_settled_at, 1_000);
    }
}
