use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use courtline::dataset;
use courtline::records::{TeamGameRecord, pair_games};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let input = parse_path_arg("--input").ok_or_else(|| anyhow!("--input <games.json> required"))?;
    let db_path = parse_path_arg("--db").unwrap_or_else(dataset::default_db_path);

    let raw = fs::read_to_string(&input).with_context(|| format!("read {}", input.display()))?;
    let records: Vec<TeamGameRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", input.display()))?;

    let mut conn = dataset::open_db(&db_path)?;
    let summary = dataset::upsert_records(&mut conn, db_path, &records)?;

    println!("Ingest complete");
    println!("DB: {}", summary.db_path.display());
    println!(
        "rows_upserted={} games={} teams={}",
        summary.rows_upserted, summary.games, summary.teams
    );
    if !summary.warnings.is_empty() {
        println!("Skipped rows ({}):", summary.warnings.len());
        for warning in &summary.warnings {
            println!("  {warning}");
        }
    }

    // Integrity view over the whole store, not just this batch: games still
    // missing a side will be skipped by the feature pipeline.
    let all = dataset::load_all_records(&conn)?;
    let pairing = pair_games(&all);
    println!(
        "Store integrity: {} games, {} complete, {} incomplete",
        pairing.games_seen,
        pairing.pairs.len(),
        pairing.skipped
    );
    for warning in &pairing.warnings {
        println!("  {warning}");
    }
    Ok(())
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(PathBuf::from(raw.trim()));
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next));
        }
    }
    None
}
