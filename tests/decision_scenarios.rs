use approx::assert_relative_eq;

use courtline::calibration::{sweep_thresholds, tier_table_from_sweep};
use courtline::decision::{
    DecisionConfig, Direction, SlateGame, Verdict, at_least_as_strong, grade, scan,
};
use courtline::walkforward::OutOfSamplePrediction;

#[test]
fn moderate_over_at_seven_percent() {
    // predicted 230.0 on a 215 line: deviation +15, confidence 6.98%, OVER,
    // and with the 10/6/3 table that grades moderate.
    let g = grade(230.0, 215.0, &DecisionConfig::default());
    assert_relative_eq!(g.deviation, 15.0);
    assert_relative_eq!(g.confidence, 6.976744186046512, epsilon = 1e-9);
    assert_eq!(g.direction, Direction::Over);
    match &g.verdict {
        Verdict::Actionable { tier } => assert_eq!(tier.label, "moderate"),
        other => panic!("expected moderate action, got {other:?}"),
    }
}

#[test]
fn bulk_scan_quarantines_the_outlier() {
    // Five games, one with a 35-point deviation. Its raw confidence clears
    // the strongest threshold, but it must land in the anomalous set.
    let slate: Vec<SlateGame> = [
        ("g1", 222.0), // +7  -> weak action
        ("g2", 229.0), // +14 -> moderate
        ("g3", 250.0), // +35 -> anomalous
        ("g4", 216.0), // +1  -> rejected
        ("g5", 208.0), // -7  -> weak under
    ]
    .into_iter()
    .map(|(id, predicted)| SlateGame {
        game_id: id.to_string(),
        home_team: "H".to_string(),
        away_team: "A".to_string(),
        predicted_total: predicted,
        line: 215.0,
    })
    .collect();

    let outcome = scan(&slate, &DecisionConfig::default());
    assert_eq!(outcome.anomalous.len(), 1);
    assert_eq!(outcome.anomalous[0].game.game_id, "g3");
    assert_eq!(outcome.actionable.len(), 3);
    assert!(outcome.actionable.iter().all(|g| g.game.game_id != "g3"));
    assert_eq!(outcome.rejected.len(), 1);

    // Strongest first within the actionable set.
    let confidences: Vec<f64> = outcome
        .actionable
        .iter()
        .map(|g| g.grade.confidence)
        .collect();
    assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn larger_deviation_never_grades_weaker() {
    let cfg = DecisionConfig::default();
    let line = 210.0;
    // Walk the deviation up to just under the anomaly bound on both sides.
    let mut grades = Vec::new();
    for tenths in 1..=195 {
        let deviation = tenths as f64 / 10.0;
        grades.push(grade(line + deviation, line, &cfg));
        grades.push(grade(line - deviation, line, &cfg));
    }
    grades.sort_by(|a, b| {
        a.deviation
            .abs()
            .partial_cmp(&b.deviation.abs())
            .unwrap()
    });
    for pair in grades.windows(2) {
        assert!(pair[1].confidence >= pair[0].confidence);
        assert!(
            at_least_as_strong(&cfg.tiers, &pair[1].verdict, &pair[0].verdict),
            "confidence {:.2} graded weaker than {:.2}",
            pair[1].confidence,
            pair[0].confidence
        );
    }
}

#[test]
fn calibrated_tiers_flow_into_decisions() {
    // A pool where anything above 10% confidence is always right, and the
    // 6-10% band splits evenly. Line 180 keeps the strong band inside the
    // anomaly bound.
    let mut pool = Vec::new();
    for i in 0..30 {
        pool.push(OutOfSamplePrediction {
            game_id: format!("hi{i}"),
            date: "2025-01-01".parse().unwrap(),
            actual: 220.0,
            predicted: 198.5, // 10.3% over the 180 line, correct
        });
    }
    for i in 0..10 {
        pool.push(OutOfSamplePrediction {
            game_id: format!("mid{i}"),
            date: "2025-01-02".parse().unwrap(),
            actual: if i % 2 == 0 { 220.0 } else { 160.0 },
            predicted: 193.0, // 7.2% over, right half the time
        });
    }

    let sweep = sweep_thresholds(&pool, 180.0, &[10.0, 6.0, 3.0]);
    let table = tier_table_from_sweep(&sweep);

    let strong = table.select(12.0).unwrap();
    assert_eq!(strong.label, "strong");
    assert_relative_eq!(strong.expected_accuracy, 100.0);

    let cfg = DecisionConfig {
        tiers: table,
        ..DecisionConfig::default()
    };
    let g = grade(198.5, 180.0, &cfg);
    match &g.verdict {
        Verdict::Actionable { tier } => {
            assert_eq!(tier.label, "strong");
            assert_relative_eq!(tier.expected_accuracy, 100.0);
        }
        other => panic!("expected strong action, got {other:?}"),
    }
}
