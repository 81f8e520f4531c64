use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::Deserialize;

use courtline::artifact::load_artifact;
use courtline::dataset;
use courtline::decision::{self, DecisionConfig, SlateGame, Verdict};
use courtline::inference::{Predictor, TotalsRequest};
use courtline::injury::{InjuryAdapter, PlayerPointsTable, UnavailablePlayer};
use courtline::records::resolve_team_code;

/// One slate entry as delivered by the odds collaborator.
#[derive(Debug, Deserialize)]
struct SlateEntry {
    home_team: String,
    away_team: String,
    line: f64,
    #[serde(default)]
    game_id: Option<String>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let slate_path =
        parse_path_arg("--slate").ok_or_else(|| anyhow!("--slate <slate.json> required"))?;
    let raw =
        fs::read_to_string(&slate_path).with_context(|| format!("read {}", slate_path.display()))?;
    let entries: Vec<SlateEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", slate_path.display()))?;
    if entries.is_empty() {
        return Err(anyhow!("slate is empty"));
    }

    let as_of = match parse_string_arg("--date") {
        Some(raw) => raw.parse().with_context(|| format!("invalid --date {raw}"))?,
        None => Utc::now().date_naive(),
    };

    let artifact_path =
        parse_path_arg("--artifact").unwrap_or_else(|| PathBuf::from("models/totals_model.json"));
    let artifact = load_artifact(&artifact_path)?;
    let mut decisions = DecisionConfig::default();
    if artifact.validation.mean.mae > 0.0 {
        decisions.historical_mae = artifact.validation.mean.mae;
    }
    let predictor = Predictor::new(artifact)?;

    let db_path = parse_path_arg("--db").unwrap_or_else(dataset::default_db_path);
    let conn = dataset::open_db(&db_path)?;
    let history = dataset::load_all_records(&conn)?;

    let (injuries, unavailable) = load_injury_context()?;

    println!("Slate scan ({} games, as of {as_of})", entries.len());
    println!(
        "{:<16} {:>6} {:>6} {:>7} {:>7}",
        "game", "line", "pred", "dev", "conf%"
    );

    let mut slate = Vec::with_capacity(entries.len());
    for entry in &entries {
        let home = resolve_team_code(&entry.home_team);
        let away = resolve_team_code(&entry.away_team);
        let request = TotalsRequest {
            home_team: home.clone(),
            away_team: away.clone(),
            as_of,
            lines: vec![entry.line],
        };
        let response = predictor.predict(&history, &unavailable, &injuries, &request, &decisions);
        let key = format!("{away}@{home}");
        println!(
            "{:<16} {:>6.1} {:>6.1} {:>+7.1} {:>6.1}%",
            key,
            entry.line,
            response.predicted_total,
            response.predicted_total - entry.line,
            response.grades[0].confidence
        );
        slate.push(SlateGame {
            game_id: entry.game_id.clone().unwrap_or(key),
            home_team: home,
            away_team: away,
            predicted_total: response.predicted_total,
            line: entry.line,
        });
    }

    let outcome = decision::scan(&slate, &decisions);

    println!();
    if outcome.actionable.is_empty() {
        println!("No recommended action on this slate.");
    } else {
        println!("Recommended ({}):", outcome.actionable.len());
        for graded in &outcome.actionable {
            let tier = match &graded.grade.verdict {
                Verdict::Actionable { tier } => tier.label.as_str(),
                _ => unreachable!("actionable bucket holds actionable verdicts"),
            };
            println!(
                "  {} {} {} | pred {:.1} | dev {:+.1} | conf {:.1}% (vs mae {:.1}%) | {tier}",
                graded.game.game_id,
                graded.grade.direction.as_str(),
                graded.game.line,
                graded.grade.predicted_total,
                graded.grade.deviation,
                graded.grade.confidence,
                graded.grade.confidence_vs_mae
            );
        }
    }

    if !outcome.anomalous.is_empty() {
        println!();
        println!(
            "Anomalous ({}) - model likely unreliable here, inspect before acting:",
            outcome.anomalous.len()
        );
        for graded in &outcome.anomalous {
            println!(
                "  {} | dev {:+.1} | pred {:.1} vs line {:.1}",
                graded.game.game_id,
                graded.grade.deviation,
                graded.grade.predicted_total,
                graded.game.line
            );
        }
    }
    Ok(())
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

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_string_arg(name).map(PathBuf::from)
}
