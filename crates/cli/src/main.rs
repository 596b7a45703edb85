use analytics::{SimilarMovieRow, ViewKind, ViewRows};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use data_loader::{DataIndex, LoadReport, Movie, MovieId};
use engine::{AnalyticsEngine, EngineConfig, EngineError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use writer::{MemorySink, ResultSink, RunStatus, RunSummary, StoredSummary, WriteMode};

/// MovieLens Analytics - batch analytics over the MovieLens 100k dataset
#[derive(Parser, Debug)]
#[command(name = "movielens-analytics")]
#[command(about = "Cohort, rating and similarity analytics for MovieLens", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the MovieLens 100k directory (u.user, u.item, u.data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Result sink: `memory` or a SQLite DSN such as sqlite://results.db
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(flatten)]
    thresholds: ThresholdArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the analytic thresholds
#[derive(Args, Debug, Default)]
struct ThresholdArgs {
    /// Minimum ratings for a movie to enter the top list
    #[arg(long, global = true)]
    min_ratings: Option<u32>,

    /// Length of the top movies list
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Minimum co-raters for a movie pair
    #[arg(long, global = true)]
    min_cooccurrence: Option<u32>,

    /// Minimum similarity score
    #[arg(long, global = true)]
    min_score: Option<f64>,

    /// Neighbours kept per target movie
    #[arg(long, global = true)]
    neighbours: Option<usize>,

    /// Restrict similar movies to these targets (repeatable)
    #[arg(long = "target", global = true)]
    targets: Vec<MovieId>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute every view and write it to the sink
    Run {
        /// Cancel the run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Replace each view instead of upserting into it
        #[arg(long)]
        replace: bool,
    },

    /// Compute one view and print it without writing
    Inspect {
        /// mean_age_by_occupation, top_rated_movies, top_genres_by_occupation_age or similar_movies
        #[arg(value_parser = parse_view)]
        view: ViewKind,

        /// Number of rows to print
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the movies most similar to one movie
    Similar {
        #[arg(long, required_unless_present = "title", conflicts_with = "title")]
        movie_id: Option<MovieId>,

        /// Case-insensitive part of the title; the lowest matching id is used
        #[arg(long)]
        title: Option<String>,

        /// Number of neighbours to print
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show the run history stored in the sink
    History,

    /// Show row counts and value ranges of the stored views
    Summary,
}

fn parse_view(name: &str) -> std::result::Result<ViewKind, String> {
    ViewKind::from_name(name).ok_or_else(|| {
        let names: Vec<_> = ViewKind::ALL.iter().map(|v| v.name()).collect();
        format!("unknown view '{}' (expected one of: {})", name, names.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Run {
            deadline_secs,
            replace,
        } => handle_run(config, deadline_secs, replace).await?,
        Commands::Inspect { view, limit, json } => handle_inspect(config, view, limit, json).await?,
        Commands::Similar {
            movie_id,
            title,
            limit,
        } => handle_similar(config, movie_id, title.as_deref(), limit).await?,
        Commands::History => handle_history(config).await?,
        Commands::Summary => handle_summary(config).await?,
    }

    Ok(())
}

/// Config file first, then command-line overrides
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(url) = &cli.database {
        config.database_url = url.clone();
    }

    let mut analytics = std::mem::take(&mut config.analytics);
    let thresholds = &cli.thresholds;
    if let Some(min_ratings) = thresholds.min_ratings {
        analytics.top_movies.min_ratings = min_ratings;
    }
    if let Some(top_k) = thresholds.top_k {
        analytics.top_movies.top_k = top_k;
    }
    if thresholds.min_cooccurrence.is_some() || thresholds.min_score.is_some() {
        let min_cooccurrence = thresholds
            .min_cooccurrence
            .unwrap_or(analytics.similarity.min_cooccurrence);
        let min_score = thresholds.min_score.unwrap_or(analytics.similarity.min_score);
        analytics = analytics.with_similarity_thresholds(min_cooccurrence, min_score);
    }
    if let Some(neighbours) = thresholds.neighbours {
        analytics = analytics.with_similarity_top_k(neighbours);
    }
    if !thresholds.targets.is_empty() {
        analytics = analytics.with_similarity_targets(thresholds.targets.clone());
    }
    config.analytics = analytics;
    Ok(config)
}

/// Load the dataset for the read-only commands
fn load_index(data_dir: &Path) -> Result<Arc<DataIndex>> {
    println!("Loading MovieLens dataset from {}...", data_dir.display());
    let start = Instant::now();
    let (index, report) =
        DataIndex::load_from_files(data_dir).context("Failed to load MovieLens dataset")?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());
    print_load_report(&report);
    Ok(Arc::new(index))
}

/// Handle the 'run' command
async fn handle_run(mut config: EngineConfig, deadline_secs: Option<u64>, replace: bool) -> Result<()> {
    if let Some(secs) = deadline_secs {
        config.deadline_secs = Some(secs);
    }
    if replace {
        config.write_mode = WriteMode::Replace;
    }

    let sink = writer::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open result sink {}", config.database_url))?;
    let data_dir = config.data_dir.clone();
    info!("Starting run: data {:?}, sink {}, mode {:?}", data_dir, sink.name(), config.write_mode);
    let engine = AnalyticsEngine::new(config, sink);

    let start = Instant::now();
    let report = match engine.run_from_dir(&data_dir).await {
        Ok(report) => report,
        Err(err) => {
            if let Some(summary) = err.summary() {
                print_summary(summary);
            }
            return Err(match err {
                EngineError::DataIntegrity { .. } => anyhow!(err).context("Run aborted while loading data"),
                other => anyhow!(other),
            });
        }
    };

    if let Some(load) = &report.load {
        print_load_report(load);
    }
    print_summary(&report.summary);
    println!("Finished in {:?}", start.elapsed());

    if report.summary.status == RunStatus::Failed {
        bail!("run failed: {}", report.summary.error_message.as_deref().unwrap_or("unknown error"));
    }
    Ok(())
}

/// Handle the 'inspect' command
async fn handle_inspect(config: EngineConfig, view: ViewKind, limit: usize, json: bool) -> Result<()> {
    let index = load_index(&config.data_dir)?;
    let engine = AnalyticsEngine::new(config, Arc::new(MemorySink::new()));

    let rows = engine
        .compute_view(view, index)
        .await
        .with_context(|| format!("Failed to compute {}", view))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", format!("{} ({} rows):", view, rows.len()).bold().blue());
    match &rows {
        ViewRows::OccupationAge(rows) => {
            for row in rows.iter().take(limit) {
                println!(
                    "{:<15} mean {:>5.1}  std {:>5}  range {}-{}  ({} users)",
                    row.occupation,
                    row.mean_age,
                    row.std_dev.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".to_string()),
                    row.min_age,
                    row.max_age,
                    row.user_count
                );
            }
        }
        ViewRows::TopMovies(rows) => {
            for (rank, row) in rows.iter().take(limit).enumerate() {
                println!(
                    "{}. {} - {:.2} ({} ratings)",
                    (rank + 1).to_string().green(),
                    row.title,
                    row.avg_rating,
                    row.rating_count
                );
            }
        }
        ViewRows::GenreCohorts(rows) => {
            for row in rows.iter().take(limit) {
                println!(
                    "{:<15} {:<9} #{} {:<12} {:.2} ({} ratings, {} users)",
                    row.occupation,
                    row.age_group.label(),
                    row.genre_rank,
                    row.genre.name(),
                    row.avg_rating,
                    row.rating_count,
                    row.total_users
                );
            }
        }
        ViewRows::SimilarMovies(rows) => print_neighbours(rows, limit),
    }
    Ok(())
}

/// Pick the target movie by id, or by title when no id is given
fn resolve_movie<'a>(index: &'a DataIndex, movie_id: Option<MovieId>, title: Option<&str>) -> Result<&'a Movie> {
    match (movie_id, title) {
        (Some(id), _) => index.get_movie(id).ok_or_else(|| anyhow!("Movie {} not found", id)),
        (None, Some(title)) => index
            .find_movie_by_title(title)
            .ok_or_else(|| anyhow!("No movie title contains '{}'", title)),
        (None, None) => bail!("Pass --movie-id or --title"),
    }
}

/// Handle the 'similar' command
async fn handle_similar(
    config: EngineConfig,
    movie_id: Option<MovieId>,
    title: Option<&str>,
    limit: usize,
) -> Result<()> {
    let index = load_index(&config.data_dir)?;
    let movie = resolve_movie(&index, movie_id, title)?;
    let movie_id = movie.id;
    println!("{}", format!("Movies similar to {} ({}):", movie.title, movie_id).bold().blue());

    let engine = AnalyticsEngine::new(config, Arc::new(MemorySink::new()));
    let rows = engine
        .similar_to(movie_id, index)
        .await
        .context("Failed to compute similar movies")?;

    if rows.is_empty() {
        println!("{}", "No movie passes the co-rating and score thresholds".yellow());
    }
    print_neighbours(&rows, limit);
    Ok(())
}

/// Handle the 'history' command
async fn handle_history(config: EngineConfig) -> Result<()> {
    let sink = writer::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open result sink {}", config.database_url))?;
    let engine = AnalyticsEngine::new(config, sink);

    let history = engine.history().await?;
    if history.is_empty() {
        println!("No runs recorded yet");
    }
    for summary in &history {
        print_summary(summary);
    }
    Ok(())
}

/// Handle the 'summary' command
async fn handle_summary(config: EngineConfig) -> Result<()> {
    let sink = writer::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open result sink {}", config.database_url))?;
    let engine = AnalyticsEngine::new(config, sink);

    print_stored_summary(&engine.stored_summary().await?);
    Ok(())
}

fn print_stored_summary(stored: &StoredSummary) {
    let value = |v: Option<f64>| v.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
    for stats in &stored.views {
        println!(
            "{:<30} {:>6} rows  {} avg {}  max {}  min {}",
            stats.view.to_string().bold(),
            stats.row_count,
            stats.metric,
            value(stats.average),
            value(stats.max),
            value(stats.min)
        );
    }
    match &stored.latest_run {
        Some(summary) => {
            println!("{}", "Latest run:".bold().blue());
            print_summary(summary);
        }
        None => println!("No runs recorded yet"),
    }
}

fn print_neighbours(rows: &[SimilarMovieRow], limit: usize) {
    for row in rows.iter().take(limit) {
        println!(
            "{} {:>5} -> {} - score {:.3} (r = {:.3}, {} co-raters)",
            format!("#{}", row.similarity_rank).green(),
            row.target_movie,
            row.similar_movie_title,
            row.similarity_score,
            row.correlation,
            row.cooccurrence_count
        );
    }
}

fn print_load_report(report: &LoadReport) {
    if report.dropped() == 0 {
        return;
    }
    println!(
        "{} Dropped {} rows (users {}, movies {}, ratings {}; {} unresolved references)",
        "!".yellow(),
        report.dropped(),
        report.users.dropped(),
        report.movies.dropped(),
        report.ratings.dropped(),
        report.ratings.unresolved
    );
}

fn print_summary(summary: &RunSummary) {
    let status = match summary.status {
        RunStatus::Success => summary.status.as_str().green(),
        RunStatus::Partial => summary.status.as_str().yellow(),
        RunStatus::Failed => summary.status.as_str().red(),
    };
    println!(
        "{} {} - {} rows [{}]",
        summary.run_date,
        status.bold(),
        summary.total_rows,
        summary
            .view_counts
            .iter()
            .map(|(view, count)| format!("{}={}", view, count))
            .collect::<Vec<_>>()
            .join(", ")
    );
    if summary.rows_dropped > 0 {
        println!("  {} input rows dropped while loading", summary.rows_dropped);
    }
    if let Some(message) = &summary.error_message {
        println!("  {}", message.red());
    }
    for warning in &summary.warnings {
        println!("  {}", warning.yellow());
    }
}
