use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use matchform::config::{self, PipelineConfig};
use matchform::error::PipelineError;
use matchform::pipeline::{self, BacktestReport};
use matchform::record_store::{self, RecordSource};

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let config_error = err
                .downcast_ref::<PipelineError>()
                .is_some_and(PipelineError::is_configuration);
            if config_error {
                eprintln!("configuration error: {err:#}");
                ExitCode::from(2)
            } else {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let mut cfg = PipelineConfig::from_env()?;
    cfg.apply_args(&args)?;

    let source = resolve_source(&args)?;
    let loaded = source.load()?;
    if !loaded.skipped.is_empty() {
        println!("Skipped rows: {}", loaded.skipped.len());
    }

    let report = pipeline::run_backtest(loaded.records, &cfg)?;
    print_report(&report);
    if config::has_flag(&args, "--predictions") {
        print_predictions(&report);
    }

    if let Some(path) = config::arg_value(&args, "--json") {
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        fs::write(&path, json).with_context(|| format!("write report {path}"))?;
        println!("Report written to {path}");
    }
    Ok(())
}

fn resolve_source(args: &[String]) -> Result<RecordSource> {
    if let Some(path) = config::arg_value(args, "--csv") {
        return Ok(RecordSource::Csv(PathBuf::from(path)));
    }
    if let Some(path) = config::arg_value(args, "--db") {
        return Ok(RecordSource::Sqlite(PathBuf::from(path)));
    }
    if let Ok(path) = std::env::var("MATCHFORM_CSV")
        && !path.trim().is_empty()
    {
        return Ok(RecordSource::Csv(PathBuf::from(path.trim())));
    }
    let db = record_store::default_db_path()
        .ok_or_else(|| anyhow!("no --csv or --db given and no cache dir to fall back to"))?;
    if !db.exists() {
        return Err(anyhow!(
            "no --csv given and {} does not exist (run `ingest` first)",
            db.display()
        ));
    }
    Ok(RecordSource::Sqlite(db))
}

fn print_report(report: &BacktestReport) {
    println!("Match outcome backtest");
    println!(
        "Rows: input={} with_form={} window={}",
        report.records_in, report.augmented, report.window
    );
    println!(
        "Split at {}: train={} eval={}",
        report.cutoff, report.train_size, report.eval_size
    );
    if let Some((first, last)) = report.train_range {
        println!("  train {first} -> {last}");
    }
    if let Some((first, last)) = report.eval_range {
        println!("  eval  {first} -> {last}");
    }
    println!();

    let eval = &report.evaluation;
    println!("Accuracy: {:.3}", eval.accuracy);
    println!("Precision: {:.3}", eval.weighted_precision);
    println!();
    print!("{}", eval.confusion);
    println!();
    for class in &eval.per_class {
        println!(
            "  label {}: precision={:.3} support={} predicted={}",
            class.label, class.precision, class.support, class.predicted
        );
    }
}

fn print_predictions(report: &BacktestReport) {
    println!();
    println!(
        "{:<12} {:<20} {:<20} {:>6} {:>9}",
        "date", "team", "opponent", "actual", "predicted"
    );
    for row in &report.predictions {
        println!(
            "{:<12} {:<20} {:<20} {:>6} {:>9}",
            row.date.to_string(),
            row.team,
            row.opponent,
            row.actual,
            row.predicted
        );
    }
}
