use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use matchform::config;
use matchform::record_store;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let csv_path = config::arg_value(&args, "--csv")
        .or_else(|| first_positional(&args))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: ingest --csv <matches.csv> [--db <path>]"))?;

    let db_path = config::arg_value(&args, "--db")
        .map(PathBuf::from)
        .or_else(record_store::default_db_path)
        .context("unable to resolve sqlite path")?;

    let loaded = record_store::load_csv(&csv_path)?;
    let mut conn = record_store::open_db(&db_path)?;
    let written = record_store::upsert_records(&mut conn, &loaded.records)?;

    println!("Match ingest complete");
    println!("CSV: {}", csv_path.display());
    println!("DB: {}", db_path.display());
    println!("Rows upserted: {written}");
    if let (Some(first), Some(last)) = (
        loaded.records.iter().map(|r| r.date).min(),
        loaded.records.iter().map(|r| r.date).max(),
    ) {
        println!("Range: {first} -> {last}");
    }
    if !loaded.skipped.is_empty() {
        println!("Skipped: {}", loaded.skipped.len());
        for row in loaded.skipped.iter().take(6) {
            println!("   - line {}: {:?}", row.line, row.reason);
        }
    }
    Ok(())
}

fn first_positional(args: &[String]) -> Option<String> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            skip_next = !arg.contains('=');
            continue;
        }
        return Some(arg.clone());
    }
    None
}
