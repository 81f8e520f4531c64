use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use courtline::artifact;
use courtline::calibration::{self, DEFAULT_THRESHOLDS};
use courtline::dataset;
use courtline::features::MatchupAssembler;
use courtline::injury::{InjuryAdapter, PlayerPointsTable, UnavailablePlayer};
use courtline::model::FitConfig;
use courtline::records::TeamGameRecord;
use courtline::report;
use courtline::rolling::{WINDOWS, augment_all_teams};
use courtline::synthetic::{SyntheticConfig, synthetic_season};
use courtline::walkforward;

const DEFAULT_FOLDS: usize = 5;
const DEFAULT_REFERENCE_LINE: f64 = 215.0;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let folds = parse_usize_arg("--folds").unwrap_or(DEFAULT_FOLDS).clamp(2, 20);
    let reference_line = parse_f64_arg("--line").unwrap_or(DEFAULT_REFERENCE_LINE);
    let out_path = parse_path_arg("--out").unwrap_or_else(|| PathBuf::from("models/totals_model.json"));
    let workbook_path = parse_path_arg("--report");

    let records = load_history()?;
    if records.is_empty() {
        return Err(anyhow!(
            "no game history available; run the ingest binary or pass --synthetic"
        ));
    }

    let (injuries, unavailable) = load_injury_context()?;
    let assembler = MatchupAssembler::new(&injuries, &unavailable);

    let augmented = augment_all_teams(&records, &WINDOWS);
    let flat: Vec<_> = augmented.values().flatten().collect();
    let built = assembler.build_training(flat.into_iter());

    println!(
        "Feature build: {} games seen, {} vectors, {} skipped",
        built.games_seen,
        built.vectors.len(),
        built.skipped
    );
    for warning in &built.warnings {
        println!("  warn: {warning}");
    }

    let (model_artifact, wf_report) =
        walkforward::train_final(&built.vectors, folds, &FitConfig::default())?;

    println!();
    println!("Walk-forward validation ({folds} folds):");
    for fold in &wf_report.folds {
        println!(
            "  fold {} train={} val={} mae={:.2} rmse={:.2} r2={:.3}",
            fold.index,
            fold.train_rows,
            fold.validation_rows,
            fold.metrics.mae,
            fold.metrics.rmse,
            fold.metrics.r2
        );
    }
    println!(
        "  mean  oos_rows={} mae={:.2} rmse={:.2} r2={:.3}",
        wf_report.aggregate.samples,
        wf_report.aggregate.mae,
        wf_report.aggregate.rmse,
        wf_report.aggregate.r2
    );
    for warning in &wf_report.warnings {
        println!("  warn: {warning}");
    }

    let sweep = calibration::sweep_thresholds(
        &wf_report.predictions,
        reference_line,
        &DEFAULT_THRESHOLDS,
    );
    println!();
    println!("Threshold sweep (line {reference_line}):");
    println!(
        "  {:>5} {:>7} {:>6} {:>6} {:>9} {:>8}",
        "thr%", "games", "wins", "losses", "accuracy", "roi"
    );
    for row in &sweep {
        println!(
            "  {:>5.0} {:>7} {:>6} {:>6} {:>8.1}% {:>+7.1}%",
            row.threshold, row.games, row.wins, row.losses, row.accuracy, row.roi
        );
    }
    match calibration::recommend_threshold(&sweep) {
        Some(pick) => println!(
            "Recommended threshold: {:.0}% ({} games, {:.1}% accuracy, {:+.1}% ROI)",
            pick.threshold, pick.games, pick.accuracy, pick.roi
        ),
        None => println!("No threshold cleared the profitability gate; keep paper trading."),
    }

    artifact::save_artifact(&out_path, &model_artifact)?;
    println!();
    println!("artifact written: {}", out_path.display());

    if let Some(path) = workbook_path {
        report::export_training_workbook(&path, &wf_report, &sweep)?;
        println!("workbook written: {}", path.display());
    }

    Ok(())
}

fn load_history() -> Result<Vec<TeamGameRecord>> {
    if has_flag("--synthetic") {
        let seed = parse_usize_arg("--seed").unwrap_or(7) as u64;
        let season = synthetic_season(&SyntheticConfig {
            seed,
            ..SyntheticConfig::default()
        });
        println!("Using synthetic season ({} rows, seed {seed})", season.len());
        return Ok(season);
    }
    let db_path = parse_path_arg("--db").unwrap_or_else(dataset::default_db_path);
    let conn = dataset::open_db(&db_path)?;
    let records = dataset::load_all_records(&conn)?;
    println!("Loaded {} rows from {}", records.len(), db_path.display());
    Ok(records)
}

fn load_injury_context() -> Result<(InjuryAdapter, Vec<UnavailablePlayer>)> {
    let table = match parse_path_arg("--player-points") {
        Some(path) => {
            let raw =
                fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            let averages: HashMap<String, f64> =
                serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
            PlayerPointsTable::new(averages)
        }
        None => PlayerPointsTable::default(),
    };
    let unavailable = match parse_path_arg("--injuries") {
        Some(path) => {
            let raw =
                fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?
        }
        None => Vec::new(),
    };
    Ok((InjuryAdapter::new(table), unavailable))
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

fn parse_usize_arg(name: &str) -> Option<usize> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<usize>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<usize>()
        {
            return Some(v);
        }
    }
    None
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<f64>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<f64>()
        {
            return Some(v);
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
