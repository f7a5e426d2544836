//! Ingestion command.
//!
//! Wires the configured store and candidate source into
//! [`run_cycle`] and prints a summary. The structured entry point
//! [`ingest`] is shared with the HTTP server.

use anyhow::Result;
use car_scout_core::pipeline::{run_cycle, CycleReport};
use car_scout_core::CandidateSource;
use std::path::PathBuf;

use crate::config::{validate_tolerance, Config};
use crate::format::{format_opt_price, format_price};
use crate::source::{create_source, FileSource};
use crate::sqlite_store::SqliteStore;

/// Run one cycle against the configured database and return its report.
pub async fn ingest(
    config: &Config,
    source: &dyn CandidateSource,
    query: &str,
    tolerance: Option<f64>,
) -> Result<CycleReport> {
    if let Some(t) = tolerance {
        validate_tolerance(t)?;
    }
    let store = SqliteStore::open(config).await?;
    let settings = config.cycle_settings(tolerance);
    let result = run_cycle(&store, source, query, &settings).await;
    store.pool().close().await;
    Ok(result?)
}

/// CLI entry point for `scout ingest`.
pub async fn run_ingest(
    config: &Config,
    query: Option<String>,
    tolerance: Option<f64>,
    from_file: Option<PathBuf>,
) -> Result<()> {
    let query = query.unwrap_or_else(|| config.search.default_query.clone());
    let source: Box<dyn CandidateSource> = match from_file {
        Some(path) => Box::new(FileSource::new(path)),
        None => create_source(config)?,
    };

    println!("ingest \"{}\" via {}", query, source.name());
    let report = ingest(config, source.as_ref(), &query, tolerance).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("  candidates found: {}", report.candidates_found);
    println!("  new cars added: {}", report.admitted);
    println!("  duplicates skipped: {}", report.duplicates);
    println!("  invalid skipped: {}", report.invalid);
    if report.failed > 0 {
        println!("  failed inserts: {}", report.failed);
    }
    println!("  similar price groups: {}", report.groups.len());

    for car in &report.admitted_records {
        println!("  + {} - {}", car.label(), format_price(car.price));
    }

    for (i, group) in report.groups.iter().enumerate() {
        println!();
        println!(
            "  Group {}: ~{} (range {} - {})",
            i + 1,
            format_price(group.price_range.avg),
            format_price(group.price_range.min),
            format_price(group.price_range.max)
        );
        println!(
            "    new: {} - {}",
            group.new_car.label(),
            format_price(group.new_car.price)
        );
        for car in &group.similar_cars {
            println!("         {} - {}", car.label(), format_price(car.price));
        }
    }

    let stats = &report.statistics;
    println!();
    println!("  total cars: {}", stats.total_cars);
    println!("  average price: {}", format_opt_price(stats.avg_price));
    println!(
        "  price range: {} - {}",
        format_opt_price(stats.min_price),
        format_opt_price(stats.max_price)
    );
    println!("  total searches: {}", stats.total_searches);
    println!("ok");
}
