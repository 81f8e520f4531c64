use std::collections::HashMap;

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::records::{TeamGameRecord, sort_chronological};

/// Canonical trailing-window sizes. The assembler's feature layout is written
/// against these, but the engine itself accepts any window set.
pub const WINDOWS: [usize; 3] = [3, 5, 10];

/// Window the defensive-rating and pace aggregates are measured over.
pub const TEMPO_WINDOW: usize = 10;

/// Trailing aggregates for a single window size. `None` means the value is
/// undefined at this point in the team's history (not enough strictly earlier
/// games); substitution with 0 happens at the assembly boundary, nowhere else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub window: usize,
    pub pts_mean: Option<f64>,
    pub opp_pts_mean: Option<f64>,
    pub pts_std: Option<f64>,
    pub fg_pct_mean: Option<f64>,
    pub reb_mean: Option<f64>,
    /// Mean points over prior *home* games only; falls back to `pts_mean`
    /// when the team has zero prior home games.
    pub pts_mean_home: Option<f64>,
    /// Away-split counterpart of `pts_mean_home`.
    pub pts_mean_away: Option<f64>,
}

/// Everything the engine knows about a team at one instant, using only games
/// strictly earlier than that instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSnapshot {
    pub prior_games: usize,
    pub windows: Vec<WindowStats>,
    /// Mean points allowed over the tempo window.
    pub def_rating: Option<f64>,
    /// Mean combined (own + opponent) points over the tempo window.
    pub pace: Option<f64>,
}

impl RollingSnapshot {
    pub fn window(&self, w: usize) -> Option<&WindowStats> {
        self.windows.iter().find(|stats| stats.window == w)
    }
}

/// One input record plus the snapshot that was current when the game tipped
/// off. Derived data: recomputed from raw history, never mutated in place.
#[derive(Debug, Clone)]
pub struct AugmentedTeamGameRecord {
    pub record: TeamGameRecord,
    pub rolling: RollingSnapshot,
}

/// Computes one augmented record per input record for a single team. All
/// records must belong to the same team; order does not matter, the engine
/// sorts its own copy. A feature at game G only ever reads games dated
/// strictly before G, so two same-day games never see each other.
pub fn augment_team_history(
    records: &[TeamGameRecord],
    windows: &[usize],
) -> Vec<AugmentedTeamGameRecord> {
    let mut sorted: Vec<TeamGameRecord> = records.to_vec();
    sort_chronological(&mut sorted);

    let mut out = Vec::with_capacity(sorted.len());
    for idx in 0..sorted.len() {
        // Strict-date boundary: same-day games never see each other.
        let cutoff = sorted.partition_point(|rec| rec.date < sorted[idx].date);
        out.push(AugmentedTeamGameRecord {
            record: sorted[idx].clone(),
            rolling: snapshot_from_prior(&sorted[..cutoff], windows),
        });
    }
    out
}

/// Snapshot of a team as of an arbitrary date, for inference against games
/// that have not been played yet.
pub fn snapshot_as_of(
    records: &[TeamGameRecord],
    as_of: NaiveDate,
    windows: &[usize],
) -> RollingSnapshot {
    let mut sorted: Vec<TeamGameRecord> = records.to_vec();
    sort_chronological(&mut sorted);
    let cutoff = sorted.partition_point(|rec| rec.date < as_of);
    snapshot_from_prior(&sorted[..cutoff], windows)
}

/// Augments every team in a mixed-league batch. Teams are mutually
/// independent, so the per-team work fans out across the rayon pool; the
/// result is keyed by team code.
pub fn augment_all_teams(
    records: &[TeamGameRecord],
    windows: &[usize],
) -> HashMap<String, Vec<AugmentedTeamGameRecord>> {
    let mut by_team: HashMap<String, Vec<TeamGameRecord>> = HashMap::new();
    for rec in records {
        by_team
            .entry(rec.team_code.clone())
            .or_default()
            .push(rec.clone());
    }

    by_team
        .into_par_iter()
        .map(|(team, history)| {
            let augmented = augment_team_history(&history, windows);
            (team, augmented)
        })
        .collect()
}

fn snapshot_from_prior(prior: &[TeamGameRecord], windows: &[usize]) -> RollingSnapshot {
    let window_stats = windows
        .iter()
        .map(|&w| window_stats(prior, w))
        .collect::<Vec<_>>();

    let tempo_tail = tail(prior, TEMPO_WINDOW);
    let def_rating = mean(tempo_tail.iter().map(|r| r.points_allowed as f64));
    let pace = mean(tempo_tail.iter().map(|r| r.total_points() as f64));

    RollingSnapshot {
        prior_games: prior.len(),
        windows: window_stats,
        def_rating,
        pace,
    }
}

fn window_stats(prior: &[TeamGameRecord], window: usize) -> WindowStats {
    let recent = tail(prior, window);
    let pts: Vec<f64> = recent.iter().map(|r| r.points_scored as f64).collect();

    let pts_mean = mean(pts.iter().copied());
    let pts_std = sample_std(&pts);
    let opp_pts_mean = mean(recent.iter().map(|r| r.points_allowed as f64));
    let fg_pct_mean = mean(recent.iter().map(|r| r.shooting_pct));
    let reb_mean = mean(recent.iter().map(|r| r.rebounds as f64));

    let pts_mean_home = split_mean(prior, window, true).or(pts_mean);
    let pts_mean_away = split_mean(prior, window, false).or(pts_mean);

    WindowStats {
        window,
        pts_mean,
        opp_pts_mean,
        pts_std,
        fg_pct_mean,
        reb_mean,
        pts_mean_home,
        pts_mean_away,
    }
}

/// Mean points over the team's most recent `window` prior games of one venue
/// type. `None` when the team has zero prior games of that type; callers fall
/// back to the unsplit mean at that boundary.
fn split_mean(prior: &[TeamGameRecord], window: usize, home: bool) -> Option<f64> {
    let values: Vec<f64> = prior
        .iter()
        .filter(|r| r.home_flag == home)
        .map(|r| r.points_scored as f64)
        .collect();
    let recent = tail(&values, window);
    mean(recent.iter().copied())
}

fn tail<T>(slice: &[T], n: usize) -> &[T] {
    &slice[slice.len().saturating_sub(n)..]
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Sample standard deviation (n - 1 denominator); undefined below 2 values.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values
        .iter()
        .map(|v| {
            let d = v - m;
            d * d
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rec(game_id: &str, date: &str, pts: u32, opp: u32, home: bool) -> TeamGameRecord {
        TeamGameRecord {
            game_id: game_id.to_string(),
            date: date.parse().unwrap(),
            team_code: "BOS".to_string(),
            points_scored: pts,
            points_allowed: opp,
            shooting_pct: 0.45,
            rebounds: 40,
            home_flag: home,
        }
    }

    #[test]
    fn first_game_has_no_defined_features() {
        let history = vec![rec("g1", "2025-01-01", 120, 110, true)];
        let augmented = augment_team_history(&history, &WINDOWS);
        let w5 = augmented[0].rolling.window(5).unwrap();
        assert_eq!(augmented[0].rolling.prior_games, 0);
        assert_eq!(w5.pts_mean, None);
        assert_eq!(w5.pts_std, None);
        assert_eq!(augmented[0].rolling.pace, None);
    }

    #[test]
    fn window_degrades_to_available_history() {
        // Scenario A shape: one prior game, window 3.
        let history = vec![
            rec("g1", "2025-01-01", 108, 100, true),
            rec("g2", "2025-01-03", 120, 115, true),
        ];
        let augmented = augment_team_history(&history, &WINDOWS);
        let w3 = augmented[1].rolling.window(3).unwrap();
        assert_relative_eq!(w3.pts_mean.unwrap(), 108.0);
        assert_eq!(w3.pts_std, None, "std needs two prior games");
    }

    #[test]
    fn rolling_mean_uses_only_last_window_games() {
        let history = vec![
            rec("g1", "2025-01-01", 100, 90, true),
            rec("g2", "2025-01-02", 110, 95, false),
            rec("g3", "2025-01-03", 120, 100, true),
            rec("g4", "2025-01-04", 130, 105, false),
        ];
        let augmented = augment_team_history(&history, &WINDOWS);
        let w3 = augmented[3].rolling.window(3).unwrap();
        assert_relative_eq!(w3.pts_mean.unwrap(), (100.0 + 110.0 + 120.0) / 3.0);
        let std = w3.pts_std.unwrap();
        assert_relative_eq!(std, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn same_day_games_do_not_see_each_other() {
        let history = vec![
            rec("g1", "2025-01-01", 100, 90, true),
            rec("g2", "2025-01-02", 200, 90, true),
            rec("g3", "2025-01-02", 90, 95, false),
        ];
        let augmented = augment_team_history(&history, &WINDOWS);
        // Both Jan 2 games only see the Jan 1 game.
        for aug in &augmented[1..] {
            assert_eq!(aug.rolling.prior_games, 1);
            assert_relative_eq!(aug.rolling.window(3).unwrap().pts_mean.unwrap(), 100.0);
        }
    }

    #[test]
    fn split_mean_falls_back_to_unsplit_when_no_same_split_games() {
        let history = vec![
            rec("g1", "2025-01-01", 100, 90, true),
            rec("g2", "2025-01-03", 110, 95, true),
            rec("g3", "2025-01-05", 120, 100, false),
        ];
        let augmented = augment_team_history(&history, &WINDOWS);
        let w5 = augmented[2].rolling.window(5).unwrap();
        // Two prior home games exist, zero prior away games.
        assert_relative_eq!(w5.pts_mean_home.unwrap(), 105.0);
        assert_relative_eq!(w5.pts_mean_away.unwrap(), w5.pts_mean.unwrap());
    }

    #[test]
    fn as_of_snapshot_matches_next_game_view() {
        let history = vec![
            rec("g1", "2025-01-01", 100, 90, true),
            rec("g2", "2025-01-03", 110, 95, false),
            rec("g3", "2025-01-05", 120, 100, true),
        ];
        let augmented = augment_team_history(&history, &WINDOWS);
        let as_of = snapshot_as_of(&history, "2025-01-05".parse().unwrap(), &WINDOWS);
        assert_eq!(as_of, augmented[2].rolling);
    }

    #[test]
    fn engine_is_deterministic_on_shuffled_input() {
        let mut history = vec![
            rec("g1", "2025-01-01", 100, 90, true),
            rec("g2", "2025-01-03", 110, 95, false),
            rec("g3", "2025-01-05", 120, 100, true),
        ];
        let forward = augment_team_history(&history, &WINDOWS);
        history.reverse();
        let reversed = augment_team_history(&history, &WINDOWS);
        for (a, b) in forward.iter().zip(&reversed) {
            assert_eq!(a.record, b.record);
            assert_eq!(a.rolling, b.rolling);
        }
    }
}
