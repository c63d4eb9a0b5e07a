//! Default producer catalog and donation goals
//!
//! The neon sign supply chain, from raw material extraction to reality
//! bending generators. Deployments may replace either list through config.

use crate::types::{DonationGoalSpec, ProducerSpec};

const PRODUCERS: &[(u32, &str, &str, u64, u64)] = &[
    // Raw material extraction
    (1, "Glass Quarry", "🏔️", 15, 1),
    (2, "Gas Extractor", "⛽", 35, 2),
    (3, "Metal Mine", "⛏️", 70, 3),
    // Tube manufacturing
    (4, "Glass Blower", "🔥", 150, 5),
    (5, "Tube Bender", "🔧", 300, 10),
    (6, "Electrode Installer", "⚡", 800, 15),
    // LED sign production
    (7, "LED Factory", "💡", 1_200, 30),
    (8, "Circuit Printer", "🔌", 2_400, 60),
    (9, "Sign Assembler", "🔨", 4_800, 90),
    // Neon sign crafting
    (10, "Neon Bender", "🌈", 9_000, 150),
    (11, "Gas Filler", "💨", 18_000, 300),
    (12, "Quality Tester", "🔍", 36_000, 500),
    // Global distribution
    (13, "Shipping Container", "📦", 144_000, 1_800),
    (14, "Cargo Ship", "🚢", 288_000, 3_000),
    (15, "Global Neon Empire", "🌍", 512_000, 5_000),
    // Mega production
    (16, "Neon Megafactory", "🏭", 1_000_000, 8_000),
    (17, "Quantum Assembly Line", "⚛️", 5_000_000, 12_000),
    (18, "Plasma Processing Plant", "💥", 10_000_000, 15_000),
    // Ultra production
    (19, "Neon Overdrive Complex", "🚀", 50_000_000, 25_000),
    (20, "Cosmic Manufacturing Hub", "🌌", 100_000_000, 35_000),
    (21, "Galactic Neon Station", "🛸", 500_000_000, 50_000),
    // Ultimate production
    (22, "Universal Neon Matrix", "🌐", 1_000_000_000, 75_000),
    (23, "Dimensional Neon Forge", "🌀", 5_000_000_000, 100_000),
    (24, "Reality Neon Engine", "🔮", 10_000_000_000, 125_000),
    (25, "Infinite Neon Generator", "♾️", 50_000_000_000, 150_000),
];

const GOALS: &[(u32, &str, u64)] = &[
    (1, "Pay US Debt", 32_000_000_000_000),
    (2, "Cleanup Oceans", 92_000_000_000_000),
    (3, "End Global Hunger", 350_000_000_000_000),
    (4, "Terraform Mars", 1_500_000_000_000_000),
    (5, "Build Dyson Sphere", 5_000_000_000_000_000),
    (6, "Interstellar Highway", 12_000_000_000_000_000),
];

/// Built-in producer catalog
pub fn default_producers() -> Vec<ProducerSpec> {
    PRODUCERS
        .iter()
        .map(|&(id, name, emoji, base_cost, rate)| ProducerSpec {
            id,
            name: name.to_string(),
            emoji: emoji.to_string(),
            base_cost,
            rate,
        })
        .collect()
}

/// Built-in community donation goals
pub fn default_donation_goals() -> Vec<DonationGoalSpec> {
    GOALS
        .iter()
        .map(|&(id, name, target)| DonationGoalSpec {
            id,
            name: name.to_string(),
            target,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_producer_ids_unique_and_ordered() {
        let producers = default_producers();
        assert_eq!(producers.len(), 25);

        let ids: HashSet<u32> = producers.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), producers.len());

        for pair in producers.windows(2) {
            assert!(pair[0].id < pair[1].id);
            assert!(pair[0].base_cost <= pair[1].base_cost);
        }
    }

    #[test]
    fn test_goals_have_targets() {
        let goals = default_donation_goals();
        assert_eq!(goals.len(), 6);
        assert!(goals.iter().all(|g| g.target > 0));
    }
}
