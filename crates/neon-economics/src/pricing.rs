//! # Economy Formulas
//!
//! | Quantity | Formula |
//! |----------|---------|
//! | Producer cost | `floor(base_cost * growth^owned)`, growth 1.12 |
//! | Build time | 0 up to 1M, then linear to 48h at 1T |
//! | Click power | `p + 1` below 1000, then `max(p + 1, floor(p * 1.05))` |
//! | Power price | previous price + 10 |

use neon_core::constants::{
    BUILD_TIME_INSTANT_MAX_COST, BUILD_TIME_MAX_COST, BUILD_TIME_MAX_SECONDS,
};
use neon_core::{
    default_donation_goals, default_producers, DonationGoalSpec, GoalId, Player, ProducerId,
    ProducerSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Tunable economy parameters and catalogs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Producer price growth per owned unit
    #[serde(default = "default_growth")]
    pub growth: f64,

    /// Added to the click power price after each completed upgrade
    #[serde(default = "default_power_price_increment")]
    pub power_price_increment: u64,

    /// Build time of a click power upgrade
    #[serde(default = "default_power_build_seconds")]
    pub power_build_seconds: u64,

    /// Click power below which upgrades are linear
    #[serde(default = "default_power_linear_cap")]
    pub power_linear_cap: u64,

    /// Multiplier applied to click power at and above the linear cap
    #[serde(default = "default_power_growth")]
    pub power_growth: f64,

    /// Score of a freshly created player
    #[serde(default)]
    pub initial_score: u64,

    /// Credit producer output on every touch
    #[serde(default = "default_true")]
    pub passive_production: bool,

    /// Producer catalog
    #[serde(default = "default_producers")]
    pub producers: Vec<ProducerSpec>,

    /// Community donation goals
    #[serde(default = "default_donation_goals")]
    pub goals: Vec<DonationGoalSpec>,
}

fn default_growth() -> f64 {
    1.12
}

fn default_power_price_increment() -> u64 {
    10
}

fn default_power_build_seconds() -> u64 {
    2
}

fn default_power_linear_cap() -> u64 {
    1_000
}

fn default_power_growth() -> f64 {
    1.05
}

fn default_true() -> bool {
    true
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            growth: default_growth(),
            power_price_increment: default_power_price_increment(),
            power_build_seconds: default_power_build_seconds(),
            power_linear_cap: default_power_linear_cap(),
            power_growth: default_power_growth(),
            initial_score: 0,
            passive_production: true,
            producers: default_producers(),
            goals: default_donation_goals(),
        }
    }
}

/// Rejected economy configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconomyConfigError {
    #[error("growth must be a finite value >= 1.0, got {0}")]
    InvalidGrowth(f64),

    #[error("power_growth must be a finite value >= 1.0, got {0}")]
    InvalidPowerGrowth(f64),

    #[error("duplicate producer id {0}")]
    DuplicateProducer(ProducerId),

    #[error("duplicate goal id {0}")]
    DuplicateGoal(GoalId),

    #[error("goal {0} has a zero target")]
    ZeroTarget(GoalId),
}

impl EconomyConfig {
    /// Check invariants the formulas rely on
    pub fn validate(&self) -> Result<(), EconomyConfigError> {
        if !self.growth.is_finite() || self.growth < 1.0 {
            return Err(EconomyConfigError::InvalidGrowth(self.growth));
        }
        if !self.power_growth.is_finite() || self.power_growth < 1.0 {
            return Err(EconomyConfigError::InvalidPowerGrowth(self.power_growth));
        }

        let mut seen = HashSet::new();
        for producer in &self.producers {
            if !seen.insert(producer.id) {
                return Err(EconomyConfigError::DuplicateProducer(producer.id));
            }
        }

        let mut seen = HashSet::new();
        for goal in &self.goals {
            if !seen.insert(goal.id) {
                return Err(EconomyConfigError::DuplicateGoal(goal.id));
            }
            if goal.target == 0 {
                return Err(EconomyConfigError::ZeroTarget(goal.id));
            }
        }
        Ok(())
    }

    /// Catalog entry for a producer
    pub fn producer(&self, id: ProducerId) -> Option<&ProducerSpec> {
        self.producers.iter().find(|p| p.id == id)
    }

    /// Configured goal
    pub fn goal(&self, id: GoalId) -> Option<&DonationGoalSpec> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// Price of the next unit of `spec` for a player owning `owned`
    pub fn producer_cost(&self, spec: &ProducerSpec, owned: u64) -> u64 {
        producer_cost(spec.base_cost, owned, self.growth)
    }

    /// Click power reached by the next upgrade
    pub fn next_power(&self, power: u64) -> u64 {
        next_power(power, self.power_linear_cap, self.power_growth)
    }

    /// Score per second generated by everything the player owns
    pub fn production_rate(&self, player: &Player) -> u64 {
        production_rate(player, &self.producers)
    }
}

/// `floor(base * growth^owned)`, saturating at `u64::MAX`
pub fn producer_cost(base: u64, owned: u64, growth: f64) -> u64 {
    let exponent = i32::try_from(owned).unwrap_or(i32::MAX);
    let cost = (base as f64 * growth.powi(exponent)).floor();
    // float to int casts saturate
    cost as u64
}

/// Seconds a purchase of the given cost takes to build
///
/// Integer arithmetic keeps the boundaries exact: anything up to one million
/// is instant, one trillion and above takes the full 48 hours.
pub fn build_duration(cost: u64) -> u64 {
    if cost <= BUILD_TIME_INSTANT_MAX_COST {
        return 0;
    }
    let clamped = cost.min(BUILD_TIME_MAX_COST);
    let span = u128::from(BUILD_TIME_MAX_COST - BUILD_TIME_INSTANT_MAX_COST);
    let scaled = u128::from(clamped - BUILD_TIME_INSTANT_MAX_COST)
        * u128::from(BUILD_TIME_MAX_SECONDS)
        / span;
    let seconds = u64::try_from(scaled).unwrap_or(BUILD_TIME_MAX_SECONDS);
    seconds.clamp(1, BUILD_TIME_MAX_SECONDS)
}

/// Click power after one upgrade
pub fn next_power(power: u64, linear_cap: u64, growth: f64) -> u64 {
    let linear = power.saturating_add(1);
    if power < linear_cap {
        return linear;
    }
    let scaled = (power as f64 * growth).floor() as u64;
    scaled.max(linear)
}

/// `Σ rate * owned` over the catalog
pub fn production_rate(player: &Player, catalog: &[ProducerSpec]) -> u64 {
    catalog.iter().fold(0u64, |total, spec| {
        total.saturating_add(spec.rate.saturating_mul(player.owned(spec.id)))
    })
}
