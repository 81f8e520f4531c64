use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};

use crate::records::TeamGameRecord;

/// Default store location, overridable with `COURTLINE_DB_PATH`.
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("COURTLINE_DB_PATH")
        && !path.trim().is_empty()
    {
        return PathBuf::from(path.trim());
    }
    PathBuf::from("data/courtline.sqlite")
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub rows_upserted: usize,
    pub games: usize,
    pub teams: usize,
    pub warnings: Vec<String>,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS team_games (
            game_id TEXT NOT NULL,
            date TEXT NOT NULL,
            team_code TEXT NOT NULL,
            points_scored INTEGER NOT NULL,
            points_allowed INTEGER NOT NULL,
            shooting_pct REAL NOT NULL,
            rebounds INTEGER NOT NULL,
            home_flag INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (game_id, team_code)
        );
        CREATE INDEX IF NOT EXISTS idx_team_games_team ON team_games(team_code);
        CREATE INDEX IF NOT EXISTS idx_team_games_date ON team_games(date);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            rows_upserted INTEGER NOT NULL,
            warnings_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Idempotent batch upsert with run bookkeeping. Rows that fail basic sanity
/// (empty ids, absurd scores) are skipped with a warning; the batch always
/// lands.
pub fn upsert_records(
    conn: &mut Connection,
    db_path: PathBuf,
    records: &[TeamGameRecord],
) -> Result<IngestSummary> {
    if records.is_empty() {
        return Err(anyhow!("no records passed to ingest"));
    }

    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, rows_upserted, warnings_json)
         VALUES (?1, NULL, 0, '[]')",
        params![started_at],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut warnings = Vec::new();
    let mut rows_upserted = 0usize;

    let tx = conn.transaction().context("begin ingest transaction")?;
    for rec in records {
        if let Err(warning) = sanity_check(rec) {
            warnings.push(warning);
            continue;
        }
        upsert_one(&tx, rec)?;
        rows_upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;

    let finished_at = Utc::now().to_rfc3339();
    let warnings_json = serde_json::to_string(&warnings).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs SET finished_at = ?1, rows_upserted = ?2, warnings_json = ?3
         WHERE run_id = ?4",
        params![finished_at, rows_upserted as i64, warnings_json, run_id],
    )
    .context("update ingest run")?;

    let games = conn
        .query_row("SELECT COUNT(DISTINCT game_id) FROM team_games", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("count games")? as usize;
    let teams = conn
        .query_row(
            "SELECT COUNT(DISTINCT team_code) FROM team_games",
            [],
            |row| row.get::<_, i64>(0),
        )
        .context("count teams")? as usize;

    Ok(IngestSummary {
        db_path,
        rows_upserted,
        games,
        teams,
        warnings,
    })
}

/// Full history in the deterministic chronological order the feature
/// pipeline expects.
pub fn load_all_records(conn: &Connection) -> Result<Vec<TeamGameRecord>> {
    load_with_filter(conn, None)
}

pub fn load_team_records(conn: &Connection, team_code: &str) -> Result<Vec<TeamGameRecord>> {
    load_with_filter(conn, Some(team_code))
}

fn load_with_filter(conn: &Connection, team_code: Option<&str>) -> Result<Vec<TeamGameRecord>> {
    let base = r#"
        SELECT game_id, date, team_code, points_scored, points_allowed,
               shooting_pct, rebounds, home_flag
        FROM team_games
    "#;
    let order = " ORDER BY date ASC, game_id ASC, team_code ASC";

    let mut out = Vec::new();
    let mut decode_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<TeamGameRecord> {
        let date_raw: String = row.get(1)?;
        let date = date_raw.parse::<NaiveDate>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?;
        Ok(TeamGameRecord {
            game_id: row.get(0)?,
            date,
            team_code: row.get(2)?,
            points_scored: row.get::<_, i64>(3)? as u32,
            points_allowed: row.get::<_, i64>(4)? as u32,
            shooting_pct: row.get(5)?,
            rebounds: row.get::<_, i64>(6)? as u32,
            home_flag: row.get::<_, i64>(7)? != 0,
        })
    };

    if let Some(team) = team_code {
        let sql = format!("{base} WHERE team_code = ?1 {order}");
        let mut stmt = conn.prepare(&sql).context("prepare team load query")?;
        let rows = stmt
            .query_map(params![team], |row| decode_row(row))
            .context("query team rows")?;
        for row in rows {
            out.push(row.context("decode team game row")?);
        }
    } else {
        let sql = format!("{base} {order}");
        let mut stmt = conn.prepare(&sql).context("prepare load query")?;
        let rows = stmt
            .query_map([], |row| decode_row(row))
            .context("query rows")?;
        for row in rows {
            out.push(row.context("decode team game row")?);
        }
    }
    Ok(out)
}

fn upsert_one(tx: &rusqlite::Transaction<'_>, rec: &TeamGameRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO team_games (
            game_id, date, team_code, points_scored, points_allowed,
            shooting_pct, rebounds, home_flag, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(game_id, team_code) DO UPDATE SET
            date = excluded.date,
            points_scored = excluded.points_scored,
            points_allowed = excluded.points_allowed,
            shooting_pct = excluded.shooting_pct,
            rebounds = excluded.rebounds,
            home_flag = excluded.home_flag,
            updated_at = excluded.updated_at
        "#,
        params![
            rec.game_id,
            rec.date.to_string(),
            rec.team_code,
            rec.points_scored as i64,
            rec.points_allowed as i64,
            rec.shooting_pct,
            rec.rebounds as i64,
            if rec.home_flag { 1i64 } else { 0i64 },
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert team game")?;
    Ok(())
}

fn sanity_check(rec: &TeamGameRecord) -> Result<(), String> {
    if rec.game_id.trim().is_empty() || rec.team_code.trim().is_empty() {
        return Err(format!(
            "row for {:?}/{:?}: empty game or team id",
            rec.game_id, rec.team_code
        ));
    }
    if rec.points_scored > 250 || rec.points_allowed > 250 {
        return Err(format!(
            "game {} team {}: implausible score {}-{}",
            rec.game_id, rec.team_code, rec.points_scored, rec.points_allowed
        ));
    }
    if !(0.0..=1.0).contains(&rec.shooting_pct) {
        return Err(format!(
            "game {} team {}: shooting pct {} outside 0..=1",
            rec.game_id, rec.team_code, rec.shooting_pct
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(game_id: &str, date: &str, team: &str, home: bool) -> TeamGameRecord {
        TeamGameRecord {
            game_id: game_id.to_string(),
            date: date.parse().unwrap(),
            team_code: team.to_string(),
            points_scored: 112,
            points_allowed: 108,
            shooting_pct: 0.48,
            rebounds: 43,
            home_flag: home,
        }
    }

    #[test]
    fn upsert_and_load_round_trip() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let records = vec![
            rec("g2", "2025-01-03", "BOS", false),
            rec("g1", "2025-01-01", "BOS", true),
            rec("g1", "2025-01-01", "MIA", false),
        ];
        let summary = upsert_records(&mut conn, PathBuf::from(":memory:"), &records).unwrap();
        assert_eq!(summary.rows_upserted, 3);
        assert_eq!(summary.games, 2);
        assert_eq!(summary.teams, 2);

        let loaded = load_all_records(&conn).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].game_id, "g1");
        assert_eq!(loaded[0].team_code, "BOS");

        let bos = load_team_records(&conn, "BOS").unwrap();
        assert_eq!(bos.len(), 2);
    }

    #[test]
    fn re_ingest_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let records = vec![rec("g1", "2025-01-01", "BOS", true)];
        upsert_records(&mut conn, PathBuf::from(":memory:"), &records).unwrap();
        upsert_records(&mut conn, PathBuf::from(":memory:"), &records).unwrap();
        assert_eq!(load_all_records(&conn).unwrap().len(), 1);
    }

    #[test]
    fn bad_rows_warn_and_do_not_abort() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let mut bad = rec("g9", "2025-01-01", "BOS", true);
        bad.shooting_pct = 48.0;
        let records = vec![bad, rec("g1", "2025-01-01", "MIA", true)];
        let summary = upsert_records(&mut conn, PathBuf::from(":memory:"), &records).unwrap();
        assert_eq!(summary.rows_upserted, 1);
        assert_eq!(summary.warnings.len(), 1);
    }
}
