use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// One team's box-score line for one game, as delivered by the acquisition
/// side. Exactly two of these exist per game_id (one per side); the record is
/// immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGameRecord {
    pub game_id: String,
    pub date: NaiveDate,
    pub team_code: String,
    pub points_scored: u32,
    pub points_allowed: u32,
    #[serde(default)]
    pub shooting_pct: f64,
    #[serde(default)]
    pub rebounds: u32,
    pub home_flag: bool,
}

impl TeamGameRecord {
    pub fn total_points(&self) -> u32 {
        self.points_scored + self.points_allowed
    }
}

/// Both sides of one game, home first.
#[derive(Debug, Clone)]
pub struct GamePair<'a> {
    pub game_id: &'a str,
    pub home: &'a TeamGameRecord,
    pub away: &'a TeamGameRecord,
}

#[derive(Debug, Default)]
pub struct PairingReport<'a> {
    pub pairs: Vec<GamePair<'a>>,
    pub games_seen: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Deterministic chronological order used everywhere downstream.
pub fn sort_chronological(records: &mut [TeamGameRecord]) {
    records.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.game_id.cmp(&b.game_id))
            .then_with(|| a.team_code.cmp(&b.team_code))
    });
}

/// Groups records by game_id and keeps only games with exactly two rows,
/// distinct teams and exactly one home side. Anything else is skipped with a
/// warning; the batch always continues.
pub fn pair_games(records: &[TeamGameRecord]) -> PairingReport<'_> {
    let mut by_game: HashMap<&str, Vec<&TeamGameRecord>> = HashMap::new();
    for rec in records {
        by_game.entry(rec.game_id.as_str()).or_default().push(rec);
    }

    let mut report = PairingReport {
        games_seen: by_game.len(),
        ..Default::default()
    };

    let mut game_ids: Vec<&str> = by_game.keys().copied().collect();
    game_ids.sort_unstable();

    for game_id in game_ids {
        let rows = &by_game[game_id];
        match validate_pair(game_id, rows) {
            Ok((home, away)) => report.pairs.push(GamePair {
                game_id,
                home,
                away,
            }),
            Err(warning) => {
                tracing::warn!(game_id, %warning, "skipping game");
                report.skipped += 1;
                report.warnings.push(warning);
            }
        }
    }

    report
        .pairs
        .sort_by(|a, b| a.home.date.cmp(&b.home.date).then(a.game_id.cmp(b.game_id)));
    report
}

fn validate_pair<'a>(
    game_id: &str,
    rows: &[&'a TeamGameRecord],
) -> Result<(&'a TeamGameRecord, &'a TeamGameRecord), String> {
    if rows.len() != 2 {
        return Err(format!(
            "game {game_id}: expected exactly 2 team rows, found {}",
            rows.len()
        ));
    }
    let (a, b) = (rows[0], rows[1]);
    if a.team_code == b.team_code {
        return Err(format!(
            "game {game_id}: both rows belong to {}",
            a.team_code
        ));
    }
    if a.date != b.date {
        return Err(format!(
            "game {game_id}: sides disagree on date ({} vs {})",
            a.date, b.date
        ));
    }
    match (a.home_flag, b.home_flag) {
        (true, false) => Ok((a, b)),
        (false, true) => Ok((b, a)),
        _ => Err(format!(
            "game {game_id}: needs exactly one home side ({}={}, {}={})",
            a.team_code, a.home_flag, b.team_code, b.home_flag
        )),
    }
}

/// Full team name -> code, for mapping odds-feed names onto record codes.
pub static TEAM_CODES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Atlanta Hawks", "ATL"),
        ("Boston Celtics", "BOS"),
        ("Brooklyn Nets", "BKN"),
        ("Charlotte Hornets", "CHA"),
        ("Chicago Bulls", "CHI"),
        ("Cleveland Cavaliers", "CLE"),
        ("Dallas Mavericks", "DAL"),
        ("Denver Nuggets", "DEN"),
        ("Detroit Pistons", "DET"),
        ("Golden State Warriors", "GS"),
        ("Houston Rockets", "HOU"),
        ("Indiana Pacers", "IND"),
        ("Los Angeles Clippers", "LAC"),
        ("Los Angeles Lakers", "LAL"),
        ("Memphis Grizzlies", "MEM"),
        ("Miami Heat", "MIA"),
        ("Milwaukee Bucks", "MIL"),
        ("Minnesota Timberwolves", "MIN"),
        ("New Orleans Pelicans", "NOP"),
        ("New York Knicks", "NY"),
        ("Oklahoma City Thunder", "OKC"),
        ("Orlando Magic", "ORL"),
        ("Philadelphia 76ers", "PHI"),
        ("Phoenix Suns", "PHX"),
        ("Portland Trail Blazers", "POR"),
        ("Sacramento Kings", "SAC"),
        ("San Antonio Spurs", "SA"),
        ("Toronto Raptors", "TOR"),
        ("Utah Jazz", "UTAH"),
        ("Washington Wizards", "WAS"),
    ])
});

/// Resolves a team name from an external feed to its record code. Inputs that
/// already look like codes pass through unchanged.
pub fn resolve_team_code(name: &str) -> String {
    let trimmed = name.trim();
    TEAM_CODES
        .get(trimmed)
        .map(|code| (*code).to_string())
        .unwrap_or_else(|| trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(game_id: &str, date: &str, team: &str, home: bool) -> TeamGameRecord {
        TeamGameRecord {
            game_id: game_id.to_string(),
            date: date.parse().unwrap(),
            team_code: team.to_string(),
            points_scored: 110,
            points_allowed: 105,
            shooting_pct: 0.47,
            rebounds: 44,
            home_flag: home,
        }
    }

    #[test]
    fn pairing_keeps_only_complete_games() {
        let records = vec![
            rec("g1", "2025-01-01", "BOS", true),
            rec("g1", "2025-01-01", "MIA", false),
            rec("g2", "2025-01-02", "LAL", true),
        ];
        let report = pair_games(&records);
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.pairs[0].home.team_code, "BOS");
        assert_eq!(report.pairs[0].away.team_code, "MIA");
    }

    #[test]
    fn pairing_rejects_two_home_sides() {
        let records = vec![
            rec("g1", "2025-01-01", "BOS", true),
            rec("g1", "2025-01-01", "MIA", true),
        ];
        let report = pair_games(&records);
        assert!(report.pairs.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn resolve_team_code_maps_names_and_passes_codes() {
        assert_eq!(resolve_team_code("Golden State Warriors"), "GS");
        assert_eq!(resolve_team_code("bos"), "BOS");
    }
}
