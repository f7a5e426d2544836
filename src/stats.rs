//! Database statistics overview.
//!
//! Prints the aggregate price statistics along with the database size,
//! per-source car counts and the most recent search. Used by
//! `scout stats` to check that ingestion is doing what it should.

use anyhow::Result;
use car_scout_core::VehicleStore;
use sqlx::Row;

use crate::cars::print_statistics;
use crate::config::Config;
use crate::format::{format_bytes, format_ts_relative};
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;

    let stats = store.statistics().await?;
    let last_search = store.recent_events(1).await?.into_iter().next();

    let source_rows = sqlx::query(
        r#"
        SELECT source, COUNT(*) AS car_count
        FROM cars
        GROUP BY source
        ORDER BY car_count DESC, source ASC
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Car Scout - Database Stats");
    println!("==========================");
    println!();
    println!("  database: {}", config.db.path.display());
    println!("  size: {}", format_bytes(db_size));
    println!();
    print_statistics(&stats);

    match last_search {
        Some(event) => println!(
            "  last search: \"{}\" ({} found, {} added, {})",
            event.query,
            event.results_found,
            event.new_cars_added,
            format_ts_relative(&event.executed_at)
        ),
        None => println!("  last search: never"),
    }

    if !source_rows.is_empty() {
        println!();
        println!("  By source:");
        for row in &source_rows {
            let source: String = row.get("source");
            let count: i64 = row.get("car_count");
            println!("  {:<24} {:>6}", source, count);
        }
    }

    println!();
    store.pool().close().await;
    Ok(())
}
