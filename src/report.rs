use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::calibration::ThresholdReport;
use crate::walkforward::WalkForwardReport;

/// Writes one workbook summarizing a training run: per-fold validation
/// metrics, the pooled out-of-sample predictions, and the threshold sweep.
pub fn export_training_workbook(
    path: &Path,
    report: &WalkForwardReport,
    sweep: &[ThresholdReport],
) -> Result<()> {
    let mut folds_rows = vec![vec![
        "Fold".to_string(),
        "Train Rows".to_string(),
        "Validation Rows".to_string(),
        "MAE".to_string(),
        "RMSE".to_string(),
        "R2".to_string(),
    ]];
    for fold in &report.folds {
        folds_rows.push(vec![
            fold.index.to_string(),
            fold.train_rows.to_string(),
            fold.validation_rows.to_string(),
            format!("{:.2}", fold.metrics.mae),
            format!("{:.2}", fold.metrics.rmse),
            format!("{:.3}", fold.metrics.r2),
        ]);
    }
    folds_rows.push(vec![
        "mean".to_string(),
        String::new(),
        report.aggregate.samples.to_string(),
        format!("{:.2}", report.aggregate.mae),
        format!("{:.2}", report.aggregate.rmse),
        format!("{:.3}", report.aggregate.r2),
    ]);

    let mut oos_rows = vec![vec![
        "Game".to_string(),
        "Date".to_string(),
        "Actual".to_string(),
        "Predicted".to_string(),
        "Error".to_string(),
    ]];
    for p in &report.predictions {
        oos_rows.push(vec![
            p.game_id.clone(),
            p.date.to_string(),
            format!("{:.0}", p.actual),
            format!("{:.1}", p.predicted),
            format!("{:+.1}", p.actual - p.predicted),
        ]);
    }

    let mut sweep_rows = vec![vec![
        "Threshold %".to_string(),
        "Games".to_string(),
        "Wins".to_string(),
        "Losses".to_string(),
        "Accuracy %".to_string(),
        "ROI %".to_string(),
    ]];
    for r in sweep {
        sweep_rows.push(vec![
            format!("{:.0}", r.threshold),
            r.games.to_string(),
            r.wins.to_string(),
            r.losses.to_string(),
            format!("{:.1}", r.accuracy),
            format!("{:+.1}", r.roi),
        ]);
    }

    let mut warning_rows = vec![vec!["Warning".to_string()]];
    for warning in &report.warnings {
        warning_rows.push(vec![warning.clone()]);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Folds")?;
        write_rows(sheet, &folds_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("OutOfSample")?;
        write_rows(sheet, &oos_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Thresholds")?;
        write_rows(sheet, &sweep_rows)?;
    }
    if warning_rows.len() > 1 {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Warnings")?;
        write_rows(sheet, &warning_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
