use std::collections::HashMap;

use chrono::NaiveDate;

use crate::injury::{InjuryAdapter, UnavailablePlayer};
use crate::rolling::{AugmentedTeamGameRecord, RollingSnapshot};

/// The feature layout contract. The order below is the only valid order for
/// both training matrices and inference vectors; artifacts record it and the
/// serving path refuses to run against anything else.
pub const FEATURE_NAMES: [&str; 28] = [
    "home_pts_last_3",
    "home_pts_last_5",
    "home_pts_last_10",
    "home_opp_pts_last_5",
    "home_pts_std_5",
    "home_pts_last_5_home",
    "home_fg_pct_last_5",
    "home_reb_last_5",
    "away_pts_last_3",
    "away_pts_last_5",
    "away_pts_last_10",
    "away_opp_pts_last_5",
    "away_pts_std_5",
    "away_pts_last_5_away",
    "away_fg_pct_last_5",
    "away_reb_last_5",
    "combined_pts_last_3",
    "combined_pts_last_5",
    "combined_pts_last_10",
    "home_off_vs_away_def",
    "away_off_vs_home_def",
    "home_field_advantage",
    "home_injury_impact",
    "away_injury_impact",
    "home_def_rating_last_10",
    "away_def_rating_last_10",
    "home_pace_last_10",
    "away_pace_last_10",
];

/// One game's worth of model input. `label` carries the actual combined score
/// during training and stays `None` for live requests; the value layout is
/// identical in both modes.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchupFeatureVector {
    pub game_id: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub values: Vec<f64>,
    pub label: Option<f64>,
}

#[derive(Debug, Default)]
pub struct FeatureBuildReport {
    pub vectors: Vec<MatchupFeatureVector>,
    pub games_seen: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Merges the two augmented sides of each game into labeled vectors. Holds
/// the injected injury context so impact scores come from one place.
pub struct MatchupAssembler<'a> {
    injuries: &'a InjuryAdapter,
    unavailable: &'a [UnavailablePlayer],
}

/// Per-side values with the zero-substitution rule already applied. This is
/// the single boundary where undefined upstream features become 0.
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    pts_last_3: f64,
    pts_last_5: f64,
    pts_last_10: f64,
    opp_pts_last_5: f64,
    pts_std_5: f64,
    split_pts_last_5: f64,
    fg_pct_last_5: f64,
    reb_last_5: f64,
    def_rating_last_10: f64,
    pace_last_10: f64,
}

impl<'a> MatchupAssembler<'a> {
    pub fn new(injuries: &'a InjuryAdapter, unavailable: &'a [UnavailablePlayer]) -> Self {
        Self {
            injuries,
            unavailable,
        }
    }

    /// Builds one labeled vector per game_id that has exactly two sides with
    /// exactly one home team. Anything malformed is skipped with a warning;
    /// output is chronologically ordered.
    pub fn build_training<'b>(
        &self,
        augmented: impl IntoIterator<Item = &'b AugmentedTeamGameRecord>,
    ) -> FeatureBuildReport {
        let mut by_game: HashMap<&str, Vec<&AugmentedTeamGameRecord>> = HashMap::new();
        for aug in augmented {
            by_game
                .entry(aug.record.game_id.as_str())
                .or_default()
                .push(aug);
        }

        let mut report = FeatureBuildReport {
            games_seen: by_game.len(),
            ..Default::default()
        };

        let mut game_ids: Vec<&str> = by_game.keys().copied().collect();
        game_ids.sort_unstable();

        for game_id in game_ids {
            let sides = &by_game[game_id];
            match split_sides(game_id, sides) {
                Ok((home, away)) => {
                    let label =
                        (home.record.points_scored + away.record.points_scored) as f64;
                    report.vectors.push(self.assemble(
                        game_id.to_string(),
                        home.record.date,
                        &home.record.team_code,
                        &away.record.team_code,
                        &home.rolling,
                        &away.rolling,
                        Some(label),
                    ));
                }
                Err(warning) => {
                    tracing::warn!(game_id, %warning, "skipping matchup");
                    report.skipped += 1;
                    report.warnings.push(warning);
                }
            }
        }

        report
            .vectors
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.game_id.cmp(&b.game_id)));
        report
    }

    /// Unlabeled vector for a game that has not happened yet, from two as-of
    /// snapshots. Same layout, same substitution rule as training.
    pub fn build_inference(
        &self,
        home_team: &str,
        away_team: &str,
        date: NaiveDate,
        home: &RollingSnapshot,
        away: &RollingSnapshot,
    ) -> MatchupFeatureVector {
        self.assemble(
            format!("{away_team}@{home_team}"),
            date,
            home_team,
            away_team,
            home,
            away,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        game_id: String,
        date: NaiveDate,
        home_team: &str,
        away_team: &str,
        home: &RollingSnapshot,
        away: &RollingSnapshot,
        label: Option<f64>,
    ) -> MatchupFeatureVector {
        let h = side_stats(home, true);
        let a = side_stats(away, false);
        let home_injury = self.injuries.team_impact(home_team, self.unavailable);
        let away_injury = self.injuries.team_impact(away_team, self.unavailable);

        let values = vec![
            h.pts_last_3,
            h.pts_last_5,
            h.pts_last_10,
            h.opp_pts_last_5,
            h.pts_std_5,
            h.split_pts_last_5,
            h.fg_pct_last_5,
            h.reb_last_5,
            a.pts_last_3,
            a.pts_last_5,
            a.pts_last_10,
            a.opp_pts_last_5,
            a.pts_std_5,
            a.split_pts_last_5,
            a.fg_pct_last_5,
            a.reb_last_5,
            h.pts_last_3 + a.pts_last_3,
            h.pts_last_5 + a.pts_last_5,
            h.pts_last_10 + a.pts_last_10,
            h.pts_last_5 - a.opp_pts_last_5,
            a.pts_last_5 - h.opp_pts_last_5,
            h.split_pts_last_5 - a.split_pts_last_5,
            home_injury,
            away_injury,
            h.def_rating_last_10,
            a.def_rating_last_10,
            h.pace_last_10,
            a.pace_last_10,
        ];
        debug_assert_eq!(values.len(), FEATURE_NAMES.len());

        MatchupFeatureVector {
            game_id,
            date,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            values,
            label,
        }
    }
}

fn split_sides<'a>(
    game_id: &str,
    sides: &[&'a AugmentedTeamGameRecord],
) -> Result<(&'a AugmentedTeamGameRecord, &'a AugmentedTeamGameRecord), String> {
    if sides.len() != 2 {
        return Err(format!(
            "game {game_id}: expected exactly 2 team rows, found {}",
            sides.len()
        ));
    }
    let (x, y) = (sides[0], sides[1]);
    if x.record.team_code == y.record.team_code {
        return Err(format!(
            "game {game_id}: both rows belong to {}",
            x.record.team_code
        ));
    }
    match (x.record.home_flag, y.record.home_flag) {
        (true, false) => Ok((x, y)),
        (false, true) => Ok((y, x)),
        _ => Err(format!(
            "game {game_id}: needs exactly one home side ({}={}, {}={})",
            x.record.team_code, x.record.home_flag, y.record.team_code, y.record.home_flag
        )),
    }
}

fn side_stats(snapshot: &RollingSnapshot, home: bool) -> SideStats {
    let value = |opt: Option<f64>| opt.unwrap_or(0.0);
    let w3 = snapshot.window(3);
    let w5 = snapshot.window(5);
    let w10 = snapshot.window(10);

    SideStats {
        pts_last_3: value(w3.and_then(|w| w.pts_mean)),
        pts_last_5: value(w5.and_then(|w| w.pts_mean)),
        pts_last_10: value(w10.and_then(|w| w.pts_mean)),
        opp_pts_last_5: value(w5.and_then(|w| w.opp_pts_mean)),
        pts_std_5: value(w5.and_then(|w| w.pts_std)),
        split_pts_last_5: value(w5.and_then(|w| {
            if home {
                w.pts_mean_home
            } else {
                w.pts_mean_away
            }
        })),
        fg_pct_last_5: value(w5.and_then(|w| w.fg_pct_mean)),
        reb_last_5: value(w5.and_then(|w| w.reb_mean)),
        def_rating_last_10: value(snapshot.def_rating),
        pace_last_10: value(snapshot.pace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injury::PlayerPointsTable;
    use crate::records::TeamGameRecord;
    use crate::rolling::{WINDOWS, augment_all_teams};
    use approx::assert_relative_eq;

    fn rec(game_id: &str, date: &str, team: &str, pts: u32, opp: u32, home: bool) -> TeamGameRecord {
        TeamGameRecord {
            game_id: game_id.to_string(),
            date: date.parse().unwrap(),
            team_code: team.to_string(),
            points_scored: pts,
            points_allowed: opp,
            shooting_pct: 0.46,
            rebounds: 42,
            home_flag: home,
        }
    }

    fn two_team_history() -> Vec<TeamGameRecord> {
        vec![
            rec("g1", "2025-01-01", "BOS", 108, 100, true),
            rec("g1", "2025-01-01", "MIA", 100, 108, false),
            rec("g2", "2025-01-03", "BOS", 112, 104, false),
            rec("g2", "2025-01-03", "MIA", 104, 112, true),
            rec("g3", "2025-01-05", "BOS", 118, 109, true),
            rec("g3", "2025-01-05", "MIA", 109, 118, false),
        ]
    }

    fn assemble_all(records: &[TeamGameRecord]) -> FeatureBuildReport {
        let adapter = InjuryAdapter::new(PlayerPointsTable::default());
        let assembler = MatchupAssembler::new(&adapter, &[]);
        let augmented = augment_all_teams(records, &WINDOWS);
        let flat: Vec<_> = augmented.values().flatten().collect();
        assembler.build_training(flat.into_iter())
    }

    #[test]
    fn one_vector_per_complete_game() {
        let report = assemble_all(&two_team_history());
        assert_eq!(report.vectors.len(), 3);
        assert_eq!(report.skipped, 0);
        for vector in &report.vectors {
            assert_eq!(vector.values.len(), FEATURE_NAMES.len());
            assert!(vector.label.is_some());
        }
    }

    #[test]
    fn orphan_rows_are_skipped_with_warning() {
        let mut records = two_team_history();
        records.push(rec("g4", "2025-01-07", "BOS", 121, 110, true));
        let report = assemble_all(&records);
        assert_eq!(report.vectors.len(), 3);
        assert_eq!(report.skipped, 1);
        assert!(report.warnings[0].contains("g4"));
    }

    #[test]
    fn early_season_vector_degrades_to_zero_substitution() {
        let report = assemble_all(&two_team_history());
        let first = &report.vectors[0];
        // No prior games at all: every rolling value substitutes 0.
        assert!(first.values.iter().all(|v| *v == 0.0));
        assert_relative_eq!(first.label.unwrap(), 208.0);
    }

    #[test]
    fn scenario_single_prior_game_flows_into_cross_features() {
        let report = assemble_all(&two_team_history());
        let second = &report.vectors[1];
        // Home side (MIA) scored 100 in its single prior game, away (BOS) 108.
        let idx = |name: &str| FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        assert_relative_eq!(second.values[idx("home_pts_last_3")], 100.0);
        assert_relative_eq!(second.values[idx("away_pts_last_3")], 108.0);
        assert_relative_eq!(second.values[idx("combined_pts_last_3")], 208.0);
        assert_relative_eq!(
            second.values[idx("home_off_vs_away_def")],
            100.0 - 100.0
        );
    }

    #[test]
    fn rebuilding_from_identical_input_is_bit_identical() {
        let records = two_team_history();
        let first = assemble_all(&records);
        let second = assemble_all(&records);
        assert_eq!(first.vectors, second.vectors);
    }

    #[test]
    fn inference_vector_shares_training_layout() {
        let records = two_team_history();
        let augmented = augment_all_teams(&records, &WINDOWS);
        let adapter = InjuryAdapter::new(PlayerPointsTable::default());
        let assembler = MatchupAssembler::new(&adapter, &[]);

        let home = &augmented["BOS"].last().unwrap().rolling;
        let away = &augmented["MIA"].last().unwrap().rolling;
        let vector = assembler.build_inference(
            "BOS",
            "MIA",
            "2025-01-07".parse().unwrap(),
            home,
            away,
        );
        assert_eq!(vector.values.len(), FEATURE_NAMES.len());
        assert_eq!(vector.label, None);
    }
}
