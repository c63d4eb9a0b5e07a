//! Donation Pool Engine
//!
//! Players give away a fixed share of their score to shared community goals.
//! The goal total always equals the sum of its contributions.

use neon_core::constants::{DONATION_PERCENTS, TOP_DONORS_LIMIT};
use neon_core::{mask_user_id, DonationGoalSpec, GameError, GoalId, GoalState, Result};
use parking_lot::Mutex;
use serde::Serialize;

/// Score taken by a donation of `percent`
///
/// Rejects percentages outside the allowed set and donations that round
/// down to nothing.
pub fn donation_amount(score: u64, percent: u32) -> Result<u64> {
    if !DONATION_PERCENTS.contains(&percent) {
        return Err(GameError::InvalidPercent(percent));
    }
    let amount = u128::from(score) * u128::from(percent) / 100;
    let amount = u64::try_from(amount).unwrap_or(score);
    if amount == 0 {
        return Err(GameError::NothingToDonate);
    }
    Ok(amount)
}

/// A configured goal together with its mutable state
pub struct GoalSlot {
    pub spec: DonationGoalSpec,
    pub state: Mutex<GoalState>,
}

impl GoalSlot {
    pub fn new(spec: DonationGoalSpec, state: GoalState) -> Self {
        Self {
            spec,
            state: Mutex::new(state),
        }
    }

    pub fn summary(&self) -> GoalSummary {
        GoalSummary::new(&self.spec, &self.state.lock())
    }

    pub fn detail(&self, requester: &str, mask_ids: bool) -> GoalDetail {
        GoalDetail::new(&self.spec, &self.state.lock(), requester, mask_ids)
    }
}

/// Goal listing row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GoalSummary {
    pub id: GoalId,
    pub name: String,
    pub target: u64,
    pub total_donated: u64,
    pub percent: f64,
}

impl GoalSummary {
    pub fn new(spec: &DonationGoalSpec, state: &GoalState) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            target: spec.target,
            total_donated: state.total_donated,
            percent: state.percent(spec.target),
        }
    }
}

/// Donor row as shown to a requester
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DonorEntry {
    pub user_id: String,
    pub amount: u64,
    pub is_self: bool,
}

/// Goal with its top donors
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GoalDetail {
    #[serde(flatten)]
    pub summary: GoalSummary,
    pub top_donors: Vec<DonorEntry>,
}

impl GoalDetail {
    pub fn new(spec: &DonationGoalSpec, state: &GoalState, requester: &str, mask_ids: bool) -> Self {
        let top_donors = state
            .top_donors(TOP_DONORS_LIMIT)
            .into_iter()
            .map(|(user_id, amount)| DonorEntry {
                user_id: if mask_ids {
                    mask_user_id(user_id)
                } else {
                    user_id.to_string()
                },
                amount,
                is_self: user_id == requester,
            })
            .collect();
        Self {
            summary: GoalSummary::new(spec, state),
            top_donors,
        }
    }
}

/// Result of an accepted donation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DonationReceipt {
    pub amount: u64,
    pub score: u64,
    pub goal: GoalDetail,
}
