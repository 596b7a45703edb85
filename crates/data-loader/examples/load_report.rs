//! Load MovieLens 100k and print what validation kept and dropped.
//!
//! Run with: cargo run --package data-loader --example load_report [DIR]

use data_loader::{DataIndex, DataLoadError, RelationReport};
use std::path::PathBuf;
use std::time::Instant;

fn main() -> Result<(), DataLoadError> {
    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/ml-100k"));

    println!("Loading MovieLens 100k dataset from {}...\n", data_dir.display());

    let start = Instant::now();
    let (index, report) = DataIndex::load_from_files(&data_dir)?;
    let elapsed = start.elapsed();

    let (users, movies, ratings) = index.counts();

    println!("=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Movies: {}", movies);
    println!("Ratings: {}", ratings);
    println!(
        "\nPerformance: {:.0} ratings/second",
        ratings as f64 / elapsed.as_secs_f64()
    );

    println!("\n=== Validation ===");
    print_relation("users", &report.users);
    print_relation("movies", &report.movies);
    print_relation("ratings", &report.ratings);
    for sample in &report.samples {
        println!("  rejected: {}", sample);
    }
    Ok(())
}

fn print_relation(name: &str, relation: &RelationReport) {
    println!(
        "{:<8} read {:>6}  accepted {:>6}  rejected {}  duplicates {}  unresolved {}",
        name,
        relation.read,
        relation.accepted,
        relation.rejected,
        relation.duplicates,
        relation.unresolved
    );
}
