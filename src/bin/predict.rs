use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;

use courtline::artifact::load_artifact;
use courtline::dataset;
use courtline::decision::{DecisionConfig, Verdict};
use courtline::inference::{Predictor, TotalsRequest};
use courtline::injury::{InjuryAdapter, PlayerPointsTable, UnavailablePlayer};
use courtline::records::resolve_team_code;

const DEFAULT_LINES: [f64; 4] = [215.0, 220.0, 225.0, 230.0];

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let home = parse_string_arg("--home").ok_or_else(|| anyhow!("--home <team> required"))?;
    let away = parse_string_arg("--away").ok_or_else(|| anyhow!("--away <team> required"))?;
    let home = resolve_team_code(&home);
    let away = resolve_team_code(&away);

    let as_of = match parse_string_arg("--date") {
        Some(raw) => raw.parse().with_context(|| format!("invalid --date {raw}"))?,
        None => Utc::now().date_naive(),
    };
    let lines = parse_lines_arg().unwrap_or_else(|| DEFAULT_LINES.to_vec());
    let offset = parse_f64_arg("--offset").unwrap_or(0.0);

    let artifact_path =
        parse_path_arg("--artifact").unwrap_or_else(|| PathBuf::from("models/totals_model.json"));
    let artifact = load_artifact(&artifact_path)?;
    println!(
        "Model loaded: v{} trained {} (oos mae {:.2} over {} rows)",
        artifact.version,
        &artifact.trained_at[..artifact.trained_at.len().min(19)],
        artifact.validation.mean.mae,
        artifact.validation.out_of_sample_rows
    );

    let historical_mae = artifact.validation.mean.mae;
    let predictor = Predictor::new(artifact)?.with_offset(offset);

    let db_path = parse_path_arg("--db").unwrap_or_else(dataset::default_db_path);
    let conn = dataset::open_db(&db_path)?;
    let history = dataset::load_all_records(&conn)?;

    let (injuries, unavailable) = load_injury_context()?;
    if !unavailable.is_empty() {
        println!("Unavailable players considered: {}", unavailable.len());
    }

    let mut decisions = DecisionConfig::default();
    if historical_mae > 0.0 {
        decisions.historical_mae = historical_mae;
    }

    let request = TotalsRequest {
        home_team: home.clone(),
        away_team: away.clone(),
        as_of,
        lines,
    };
    let response = predictor.predict(&history, &unavailable, &injuries, &request, &decisions);

    println!();
    println!("{away} @ {home} (as of {as_of})");
    println!(
        "history: home {} prior games, away {} prior games",
        response.home_prior_games, response.away_prior_games
    );
    println!("predicted total: {:.1}", response.predicted_total);
    println!();
    println!(
        "{:>7} {:>6} {:>8} {:>8} {:>8}  {}",
        "line", "call", "dev", "conf%", "conf(M)%", "verdict"
    );
    for grade in &response.grades {
        let verdict = match &grade.verdict {
            Verdict::Actionable { tier } => format!(
                "{} ({:.1}% acc, {:+.1}% roi)",
                tier.label, tier.expected_accuracy, tier.expected_roi
            ),
            Verdict::Anomalous => "ANOMALOUS - inspect inputs".to_string(),
            Verdict::Rejected => "no action".to_string(),
        };
        println!(
            "{:>7.1} {:>6} {:>+8.1} {:>7.1}% {:>7.1}%  {verdict}",
            grade.line,
            grade.direction.as_str(),
            grade.deviation,
            grade.confidence,
            grade.confidence_vs_mae
        );
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

fn parse_lines_arg() -> Option<Vec<f64>> {
    let raw = parse_string_arg("--lines")?;
    let lines: Vec<f64> = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|line| *line > 0.0)
        .collect();
    if lines.is_empty() { None } else { Some(lines) }
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

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_string_arg(name).and_then(|raw| raw.parse::<f64>().ok())
}
