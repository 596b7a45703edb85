//! Full runs against the in-memory sink.

use analytics::{AnalyticsConfig, ViewKind};
use data_loader::{DataIndex, Genre, Movie, Rating, User};
use engine::{AnalyticsEngine, EngineConfig, EngineError};
use std::fs;
use std::sync::Arc;
use writer::{MemorySink, ResultSink, RunStatus, WriteMode};

fn dataset() -> Arc<DataIndex> {
    let users = (1..=12)
        .map(|id| User {
            id,
            age: 16 + id * 3,
            occupation: ["educator", "engineer", "student"][(id % 3) as usize].to_string(),
        })
        .collect();
    let movies = (1..=6)
        .map(|id| Movie {
            id,
            title: format!("Movie {} (199{})", id, id),
            release_date: Some(format!("01-Jan-199{}", id)),
            genres: vec![Genre::ALL[id as usize], Genre::Drama],
        })
        .collect();
    let mut ratings = Vec::new();
    for user_id in 1..=12u32 {
        for movie_id in 1..=6u32 {
            if (user_id + movie_id) % 4 != 0 {
                let score = ((user_id * movie_id) % 5 + 1) as u8;
                ratings.push(Rating { user_id, movie_id, score });
            }
        }
    }
    Arc::new(DataIndex::from_relations(users, movies, ratings).unwrap().0)
}

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_database_url("memory")
        .with_analytics(
            AnalyticsConfig::default()
                .with_top_movies(3, 5)
                .with_similarity_thresholds(3, 0.0),
        )
}

#[tokio::test]
async fn test_successful_run_writes_every_view() {
    let sink = Arc::new(MemorySink::new());
    let engine = AnalyticsEngine::new(config(), sink.clone());

    let report = engine.run(dataset()).await.unwrap();

    assert_eq!(report.summary.status, RunStatus::Success);
    assert_eq!(report.summary.error_message, None);
    assert_eq!(report.summary.rows_dropped, 0);
    assert_eq!(sink.row_count(ViewKind::OccupationAge), 3);
    for view in ViewKind::ALL {
        assert_eq!(sink.row_count(view), report.summary.count(view));
    }
    assert_eq!(engine.history().await.unwrap().len(), 1);

    let stored = engine.stored_summary().await.unwrap();
    for stats in &stored.views {
        assert_eq!(stats.row_count, report.summary.count(stats.view));
    }
    assert_eq!(stored.latest_run, Some(report.summary));
}

#[tokio::test]
async fn test_failed_view_gives_partial_run() {
    let sink = Arc::new(MemorySink::new());
    sink.fail_view(ViewKind::TopMovies);
    let engine = AnalyticsEngine::new(config(), sink.clone());

    let report = engine.run(dataset()).await.unwrap();

    assert_eq!(report.summary.status, RunStatus::Partial);
    let message = report.summary.error_message.unwrap();
    assert!(message.starts_with("top_rated_movies:"), "{}", message);
    assert_eq!(sink.row_count(ViewKind::TopMovies), 0);
    assert!(sink.row_count(ViewKind::OccupationAge) > 0);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let sink = Arc::new(MemorySink::new());
    let engine = AnalyticsEngine::new(config(), sink.clone());
    let index = dataset();

    engine.run(index.clone()).await.unwrap();
    let first = (sink.occupation_age(), sink.top_movies(), sink.genre_cohorts(), sink.similar_movies());
    engine.run(index).await.unwrap();
    let second = (sink.occupation_age(), sink.top_movies(), sink.genre_cohorts(), sink.similar_movies());

    assert_eq!(first, second);
    assert_eq!(sink.run_history().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_writes_only_the_summary() {
    let sink = Arc::new(MemorySink::new());
    let engine = AnalyticsEngine::new(config(), sink.clone());
    engine.cancellation().cancel();

    let report = engine.run(dataset()).await.unwrap();

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.error_message.as_deref(), Some("cancelled"));
    for view in ViewKind::ALL {
        assert_eq!(sink.row_count(view), 0);
    }
    assert_eq!(sink.run_history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_expired_deadline_cancels_run() {
    let sink = Arc::new(MemorySink::new());
    let engine = AnalyticsEngine::new(config().with_deadline_secs(0), sink.clone());

    let report = engine.run(dataset()).await.unwrap();

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(sink.row_count(ViewKind::OccupationAge), 0);
}

#[tokio::test]
async fn test_fatal_load_appends_failed_summary() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let engine = AnalyticsEngine::new(config(), sink.clone());

    let err = engine.run_from_dir(dir.path()).await.unwrap_err();

    assert!(matches!(err, EngineError::DataIntegrity { .. }));
    let summary = err.summary().unwrap();
    assert_eq!(summary.status, RunStatus::Failed);
    assert!(summary.error_message.as_deref().unwrap().starts_with("load:"));

    let history = sink.run_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total_rows, 0);
}

#[tokio::test]
async fn test_invalid_thresholds_are_rejected_before_computing() {
    let sink = Arc::new(MemorySink::new());
    let config = config().with_analytics(AnalyticsConfig::default().with_similarity_thresholds(50, 2.0));
    let engine = AnalyticsEngine::new(config, sink.clone());

    let err = engine.run(dataset()).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidConfig { .. }));
    assert_eq!(sink.run_history().await.unwrap()[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn test_run_from_dir_reports_dropped_rows() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("u.user"),
        "1|25|M|engineer|10001\n2|35|F|engineer|10002\n3|19|M|student|10003\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("u.item"),
        "1|Toy Story (1995)|01-Jan-1995||url|0|0|0|1|1|1|0|0|0|0|0|0|0|0|0|0|0|0|0\n\
         2|GoldenEye (1995)|01-Jan-1995||url|0|1|1|0|0|0|0|0|0|0|0|0|0|0|0|0|1|0|0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("u.data"),
        "1\t1\t5\t1\n1\t2\t5\t1\n2\t1\t4\t1\n2\t2\t4\t1\n3\t1\t3\t1\n3\t2\t3\t1\n42\t1\t5\t1\n",
    )
    .unwrap();

    let sink = Arc::new(MemorySink::new());
    let config = config()
        .with_write_mode(WriteMode::Replace)
        .with_analytics(
            AnalyticsConfig::default()
                .with_top_movies(1, 10)
                .with_similarity_thresholds(3, 0.9),
        );
    let engine = AnalyticsEngine::new(config, sink.clone());

    let report = engine.run_from_dir(dir.path()).await.unwrap();

    let load = report.load.unwrap();
    assert_eq!(load.ratings.unresolved, 1);
    assert_eq!(report.summary.status, RunStatus::Success);
    assert_eq!(report.summary.rows_dropped, 1);
    assert_eq!(sink.run_history().await.unwrap()[0].rows_dropped, 1);

    let similar = sink.similar_movies();
    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0].correlation, 1.0);
    assert_eq!(similar[0].cooccurrence_count, 3);

    let engineer = &sink.occupation_age()[0];
    assert_eq!((engineer.mean_age, engineer.user_count), (30.0, 2));
}

#[tokio::test]
async fn test_single_view_and_neighbour_queries_do_not_write() {
    let sink = Arc::new(MemorySink::new());
    let engine = AnalyticsEngine::new(config(), sink.clone());
    let index = dataset();

    let rows = engine.compute_view(ViewKind::GenreCohorts, index.clone()).await.unwrap();
    assert_eq!(rows.kind(), ViewKind::GenreCohorts);
    assert!(!rows.is_empty());

    let neighbours = engine.similar_to(1, index).await.unwrap();
    assert!(neighbours.iter().all(|r| r.target_movie == 1));

    assert!(sink.run_history().await.unwrap().is_empty());
    assert_eq!(sink.row_count(ViewKind::GenreCohorts), 0);
}
