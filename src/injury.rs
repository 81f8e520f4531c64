use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Points a missing player's absence is discounted by, per point of his
/// season scoring average.
const IMPACT_DIVISOR: f64 = 5.0;

/// One confirmed-unavailable player as delivered by the acquisition side.
/// Filtering to confirmed absences happens upstream; the adapter only scores
/// what it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailablePlayer {
    pub team_code: String,
    pub player: String,
}

/// Season scoring averages, injected at construction time. Never a process
/// global: tests and callers substitute their own tables freely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerPointsTable {
    averages: HashMap<String, f64>,
}

impl PlayerPointsTable {
    pub fn new(averages: HashMap<String, f64>) -> Self {
        Self { averages }
    }

    pub fn average_points(&self, player: &str) -> Option<f64> {
        self.averages.get(player).copied()
    }

    pub fn len(&self) -> usize {
        self.averages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }
}

/// Pure scorer of unavailability lists against the injected lookup table.
#[derive(Debug, Clone, Default)]
pub struct InjuryAdapter {
    table: PlayerPointsTable,
}

impl InjuryAdapter {
    pub fn new(table: PlayerPointsTable) -> Self {
        Self { table }
    }

    /// Summed impact of a team's unavailable players: each listed player
    /// found in the table contributes `avg_points / 5`. Zero when nothing is
    /// listed or nobody matches; adding players never lowers the score.
    pub fn team_impact(&self, team_code: &str, unavailable: &[UnavailablePlayer]) -> f64 {
        unavailable
            .iter()
            .filter(|entry| entry.team_code == team_code)
            .filter_map(|entry| self.table.average_points(&entry.player))
            .map(|ppg| ppg / IMPACT_DIVISOR)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn adapter() -> InjuryAdapter {
        InjuryAdapter::new(PlayerPointsTable::new(HashMap::from([
            ("Jayson Tatum".to_string(), 27.5),
            ("Jaylen Brown".to_string(), 24.0),
        ])))
    }

    fn out(team: &str, player: &str) -> UnavailablePlayer {
        UnavailablePlayer {
            team_code: team.to_string(),
            player: player.to_string(),
        }
    }

    #[test]
    fn impact_is_zero_without_data() {
        assert_eq!(adapter().team_impact("BOS", &[]), 0.0);
        assert_eq!(
            adapter().team_impact("BOS", &[out("BOS", "Unknown Guy")]),
            0.0
        );
    }

    #[test]
    fn impact_sums_matching_players_only() {
        let list = vec![
            out("BOS", "Jayson Tatum"),
            out("BOS", "Jaylen Brown"),
            out("MIA", "Jayson Tatum"),
        ];
        let a = adapter();
        assert_relative_eq!(a.team_impact("BOS", &list), 27.5 / 5.0 + 24.0 / 5.0);
        assert_relative_eq!(a.team_impact("MIA", &list), 27.5 / 5.0);
    }

    #[test]
    fn impact_is_monotone_in_added_players() {
        let a = adapter();
        let mut list = vec![out("BOS", "Jaylen Brown")];
        let before = a.team_impact("BOS", &list);
        list.push(out("BOS", "Jayson Tatum"));
        assert!(a.team_impact("BOS", &list) > before);
    }
}
