//! Reporting and export — JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: the full `ProtocolReport`, round-trippable, schema-versioned
//! - **CSV**: trial metric distributions, per-window results, and the stitched
//!   out-of-sample trade log
//! - **Markdown**: a short human-readable verdict
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use permlab_core::TradeRecord;

use crate::protocol::{ProtocolReport, SCHEMA_VERSION};
use crate::walk_forward::WindowResult;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &ProtocolReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ProtocolReport to JSON")
}

/// Deserialize a `ProtocolReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ProtocolReport> {
    let report: ProtocolReport =
        serde_json::from_str(json).context("failed to deserialize ProtocolReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trial metrics of both permutation stages, one row per completed trial.
///
/// Columns: stage, trial, metric, real_metric
pub fn export_trial_metrics_csv(report: &ProtocolReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["stage", "trial", "metric", "real_metric"])?;

    let in_sample = &report.in_sample;
    for (i, m) in in_sample.trial_metrics.iter().enumerate() {
        wtr.write_record([
            "in_sample",
            &i.to_string(),
            &format!("{:.8}", m),
            &format!("{:.8}", in_sample.real.metric),
        ])?;
    }
    if let Some(wf) = &report.walk_forward {
        for (i, m) in wf.trial_metrics.iter().enumerate() {
            wtr.write_record([
                "walk_forward",
                &i.to_string(),
                &format!("{:.8}", m),
                &format!("{:.8}", wf.walk_forward.aggregate_metric),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Per-window walk-forward results.
///
/// Columns: window, train_start, train_end, test_start, test_end, params,
/// train_metric, test_metric, trades
pub fn export_windows_csv(windows: &[WindowResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "window",
        "train_start",
        "train_end",
        "test_start",
        "test_end",
        "params",
        "train_metric",
        "test_metric",
        "trades",
    ])?;
    for w in windows {
        wtr.write_record([
            &w.window.index.to_string(),
            &w.window.train.start.to_string(),
            &w.window.train.end.to_string(),
            &w.window.test.start.to_string(),
            &w.window.test.end.to_string(),
            &w.params.to_string(),
            &format!("{:.8}", w.train_metric),
            &format!("{:.8}", w.test_metric),
            &w.trades.len().to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade log with per-trade return.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "return_pct",
        "bars_held",
    ])?;
    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side),
            &t.entry_index.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_index.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.return_pct()),
            &t.bars_held().to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown ───────────────────────────────────────────────────────

fn verdict(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Human-readable summary of a protocol run.
pub fn generate_summary(report: &ProtocolReport) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str("# Validation Report\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", report.strategy));
    md.push_str(&format!("| Metric | {} |\n", report.metric));
    md.push_str(&format!("| Bars | {} |\n", report.series_len));
    md.push_str(&format!("| Seed | {} |\n", report.config.rng_seed));
    md.push_str(&format!("| Verdict | **{}** |\n\n", verdict(report.passed)));

    let is = &report.in_sample;
    md.push_str("## In-sample\n\n");
    md.push_str(&format!(
        "Best params {} with {} = {:.4}. p = {:.4} over {} trials ({} excluded), threshold {} → {}\n\n",
        is.real.params,
        report.metric,
        is.real.metric,
        is.p_value,
        is.trial_metrics.len(),
        is.excluded_trials,
        is.threshold,
        verdict(is.passed)
    ));

    md.push_str("## Walk-forward\n\n");
    match &report.walk_forward {
        Some(wf) => {
            md.push_str("| Window | Test | Params | OOS metric | Trades |\n");
            md.push_str("| --- | --- | --- | --- | --- |\n");
            for w in &wf.walk_forward.windows {
                md.push_str(&format!(
                    "| {} | {}..{} | {} | {:.4} | {} |\n",
                    w.window.index,
                    w.window.test.start,
                    w.window.test.end,
                    w.params,
                    w.test_metric,
                    w.trades.len()
                ));
            }
            md.push_str(&format!(
                "\nAggregate {} = {:.4}. p = {:.4} over {} trials ({} excluded), threshold {} → {}\n",
                report.metric,
                wf.walk_forward.aggregate_metric,
                wf.p_value,
                wf.trial_metrics.len(),
                wf.excluded_trials,
                wf.threshold,
                verdict(wf.passed)
            ));
        }
        None => md.push_str("Skipped: in-sample stage failed.\n"),
    }
    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one protocol run.
///
/// Creates `{strategy}_{run_id prefix}/` under `output_dir` containing:
/// - `report.json` — the full `ProtocolReport`
/// - `trials.csv` — trial metric distributions
/// - `windows.csv` and `oos_trades.csv` — when walk-forward ran
/// - `summary.md`
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &ProtocolReport, run_id: &str, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", report.strategy, short_id));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("trials.csv"), export_trial_metrics_csv(report)?)?;
    if let Some(wf) = &report.walk_forward {
        std::fs::write(
            run_dir.join("windows.csv"),
            export_windows_csv(&wf.walk_forward.windows)?,
        )?;
        let trades: Vec<TradeRecord> = wf
            .walk_forward
            .windows
            .iter()
            .flat_map(|w| w.trades.iter().cloned())
            .collect();
        std::fs::write(run_dir.join("oos_trades.csv"), export_trades_csv(&trades)?)?;
    }
    std::fs::write(run_dir.join("summary.md"), generate_summary(report))?;

    Ok(run_dir)
}

/// Load a `ProtocolReport` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<ProtocolReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TestConfig;
    use crate::monte_carlo::McTestResult;
    use crate::optimizer::Optimum;
    use crate::walk_forward::{WalkForwardMcResult, WalkForwardResult, Window};
    use chrono::{Duration, TimeZone, Utc};
    use permlab_core::{ParamSet, TradeSide};

    fn sample_trade(entry: usize) -> TradeRecord {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TradeRecord {
            side: TradeSide::Long,
            entry_index: entry,
            entry_time: t0 + Duration::days(entry as i64),
            entry_price: 100.0,
            exit_index: entry + 5,
            exit_time: t0 + Duration::days(entry as i64 + 5),
            exit_price: 103.0,
        }
    }

    fn sample_report(with_walk_forward: bool) -> ProtocolReport {
        let params = ParamSet::new().with("fast", 10.0).with("slow", 50.0);
        let in_sample = McTestResult {
            real: Optimum {
                params: params.clone(),
                metric: 0.42,
                evaluated: 6,
                skipped: 0,
            },
            p_value: 0.0099,
            trial_metrics: vec![0.1, -0.2, 0.3],
            trial_count: 3,
            excluded_trials: 0,
            threshold: 0.01,
            passed: true,
        };
        let walk_forward = with_walk_forward.then(|| WalkForwardMcResult {
            walk_forward: WalkForwardResult {
                windows: vec![WindowResult {
                    window: Window {
                        index: 0,
                        train: 0..600,
                        test: 600..700,
                    },
                    params,
                    train_metric: 0.42,
                    test_metric: 0.03,
                    trades: vec![sample_trade(610)],
                }],
                aggregate_metric: 0.03,
                trade_count: 1,
            },
            p_value: 0.5,
            trial_metrics: vec![0.01, 0.05],
            trial_count: 2,
            excluded_trials: 0,
            threshold: 0.05,
            passed: false,
        });
        ProtocolReport {
            schema_version: SCHEMA_VERSION,
            strategy: "ma_crossover".into(),
            metric: "total_return".into(),
            series_len: 1000,
            config: TestConfig::default(),
            in_sample,
            walk_forward,
            passed: false,
        }
    }

    #[test]
    fn json_roundtrip() {
        let original = sample_report(true);
        let json = export_json(&original).unwrap();
        let restored = import_json(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut report = sample_report(false);
        report.schema_version = 99;
        let json = export_json(&report).unwrap();
        let msg = import_json(&json).unwrap_err().to_string();
        assert!(msg.contains("unsupported schema version 99"));
    }

    #[test]
    fn trial_csv_has_both_stages() {
        let csv = export_trial_metrics_csv(&sample_report(true)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "stage,trial,metric,real_metric");
        assert_eq!(lines.len(), 1 + 3 + 2);
        assert!(lines[1].starts_with("in_sample,0,"));
        assert!(lines[4].starts_with("walk_forward,0,"));
    }

    #[test]
    fn trial_csv_without_walk_forward() {
        let csv = export_trial_metrics_csv(&sample_report(false)).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn windows_csv_row() {
        let report = sample_report(true);
        let wf = report.walk_forward.unwrap();
        let csv = export_windows_csv(&wf.walk_forward.windows).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("0,0,600,600,700,"));
        assert!(row.contains("fast=10"));
    }

    #[test]
    fn trades_csv_content() {
        let csv = export_trades_csv(&[sample_trade(3)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Long,3,"));
        assert!(lines[1].contains("0.030000"));
    }

    #[test]
    fn summary_mentions_skipped_walk_forward() {
        let md = generate_summary(&sample_report(false));
        assert!(md.contains("Skipped"));
        assert!(md.contains("**FAIL**"));
    }

    #[test]
    fn artifacts_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report(true);
        let run_dir = save_artifacts(&report, "abcdef0123456789", dir.path()).unwrap();

        assert!(run_dir.ends_with("ma_crossover_abcdef012345"));
        for file in ["report.json", "trials.csv", "windows.csv", "oos_trades.csv", "summary.md"] {
            assert!(run_dir.join(file).exists(), "missing {file}");
        }
        assert_eq!(load_artifacts(&run_dir).unwrap(), report);
    }
}
