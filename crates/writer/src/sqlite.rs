//! SQLite-backed implementation of `ResultSink`.
//!
//! One table per view, each with a unique constraint on the view's natural
//! key, plus the append-only `run_summary` table. Every view is written in
//! its own transaction with `INSERT ... ON CONFLICT DO UPDATE`.

use analytics::{ViewKind, ViewRows};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Result, SinkError};
use crate::sink::{ResultSink, ViewBatch, WriteMode};
use crate::stats::{ViewStats, metric_column};
use crate::summary::{RunStatus, RunSummary};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS mean_age_by_occupation (
        occupation TEXT NOT NULL PRIMARY KEY,
        mean_age REAL NOT NULL,
        user_count INTEGER NOT NULL,
        std_dev REAL,
        min_age INTEGER NOT NULL,
        max_age INTEGER NOT NULL,
        run_date TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS top_rated_movies (
        movie_id INTEGER NOT NULL PRIMARY KEY,
        title TEXT NOT NULL,
        avg_rating REAL NOT NULL,
        rating_count INTEGER NOT NULL,
        rating_std REAL,
        release_date TEXT,
        run_date TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS top_genres_by_occupation_age (
        occupation TEXT NOT NULL,
        age_group TEXT NOT NULL,
        genre TEXT NOT NULL,
        avg_rating REAL NOT NULL,
        rating_count INTEGER NOT NULL,
        genre_rank INTEGER NOT NULL,
        total_users INTEGER NOT NULL,
        run_date TEXT NOT NULL,
        UNIQUE (occupation, age_group, genre)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS similar_movies (
        target_movie INTEGER NOT NULL,
        similar_movie_id INTEGER NOT NULL,
        similar_movie_title TEXT NOT NULL,
        similarity_score REAL NOT NULL,
        cooccurrence_count INTEGER NOT NULL,
        correlation REAL,
        similarity_rank INTEGER NOT NULL,
        release_date TEXT,
        run_date TEXT NOT NULL,
        UNIQUE (target_movie, similar_movie_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS run_summary (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_date TEXT NOT NULL,
        recorded_at TEXT NOT NULL,
        total_rows INTEGER NOT NULL,
        mean_age_by_occupation_count INTEGER NOT NULL,
        top_rated_movies_count INTEGER NOT NULL,
        top_genres_by_occupation_age_count INTEGER NOT NULL,
        similar_movies_count INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        rows_dropped INTEGER NOT NULL DEFAULT 0
    )
    "#,
];

const UPSERT_OCCUPATION_AGE: &str = r#"
    INSERT INTO mean_age_by_occupation (occupation, mean_age, user_count, std_dev, min_age, max_age, run_date)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (occupation) DO UPDATE SET
        mean_age = excluded.mean_age,
        user_count = excluded.user_count,
        std_dev = excluded.std_dev,
        min_age = excluded.min_age,
        max_age = excluded.max_age,
        run_date = excluded.run_date
"#;

const UPSERT_TOP_MOVIE: &str = r#"
    INSERT INTO top_rated_movies (movie_id, title, avg_rating, rating_count, rating_std, release_date, run_date)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (movie_id) DO UPDATE SET
        title = excluded.title,
        avg_rating = excluded.avg_rating,
        rating_count = excluded.rating_count,
        rating_std = excluded.rating_std,
        release_date = excluded.release_date,
        run_date = excluded.run_date
"#;

const UPSERT_GENRE_COHORT: &str = r#"
    INSERT INTO top_genres_by_occupation_age
        (occupation, age_group, genre, avg_rating, rating_count, genre_rank, total_users, run_date)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (occupation, age_group, genre) DO UPDATE SET
        avg_rating = excluded.avg_rating,
        rating_count = excluded.rating_count,
        genre_rank = excluded.genre_rank,
        total_users = excluded.total_users,
        run_date = excluded.run_date
"#;

const UPSERT_SIMILAR_MOVIE: &str = r#"
    INSERT INTO similar_movies
        (target_movie, similar_movie_id, similar_movie_title, similarity_score,
         cooccurrence_count, correlation, similarity_rank, release_date, run_date)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (target_movie, similar_movie_id) DO UPDATE SET
        similar_movie_title = excluded.similar_movie_title,
        similarity_score = excluded.similarity_score,
        cooccurrence_count = excluded.cooccurrence_count,
        correlation = excluded.correlation,
        similarity_rank = excluded.similarity_rank,
        release_date = excluded.release_date,
        run_date = excluded.run_date
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite result store.
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Connects using a DSN such as `sqlite://results.db` or `sqlite::memory:`
    /// and creates any missing tables.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // A single connection keeps `sqlite::memory:` on one database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let sink = Self { pool };
        sink.create_tables().await?;
        info!("Connected to SQLite sink at {}", url);
        Ok(sink)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn create_tables(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Number of rows currently stored for a view
    pub async fn row_count(&self, view: ViewKind) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", view.name()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ResultSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn write_view(&self, batch: ViewBatch<'_>, mode: WriteMode) -> Result<usize> {
        let view = batch.view();
        let run_date = batch.run_date.format(DATE_FORMAT).to_string();

        // Dropping the transaction on any error rolls it back
        let mut tx = self.pool.begin().await?;
        if mode == WriteMode::Replace {
            sqlx::query(&format!("DELETE FROM {}", view.name()))
                .execute(&mut *tx)
                .await?;
        }

        match batch.rows {
            ViewRows::OccupationAge(rows) => {
                for row in rows {
                    sqlx::query(UPSERT_OCCUPATION_AGE)
                        .bind(&row.occupation)
                        .bind(row.mean_age)
                        .bind(row.user_count)
                        .bind(row.std_dev)
                        .bind(row.min_age)
                        .bind(row.max_age)
                        .bind(&run_date)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            ViewRows::TopMovies(rows) => {
                for row in rows {
                    sqlx::query(UPSERT_TOP_MOVIE)
                        .bind(row.movie_id)
                        .bind(&row.title)
                        .bind(row.avg_rating)
                        .bind(row.rating_count)
                        .bind(row.rating_std)
                        .bind(row.release_date.as_deref())
                        .bind(&run_date)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            ViewRows::GenreCohorts(rows) => {
                for row in rows {
                    sqlx::query(UPSERT_GENRE_COHORT)
                        .bind(&row.occupation)
                        .bind(row.age_group.label())
                        .bind(row.genre.name())
                        .bind(row.avg_rating)
                        .bind(row.rating_count)
                        .bind(row.genre_rank)
                        .bind(row.total_users)
                        .bind(&run_date)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            ViewRows::SimilarMovies(rows) => {
                for row in rows {
                    sqlx::query(UPSERT_SIMILAR_MOVIE)
                        .bind(row.target_movie)
                        .bind(row.similar_movie_id)
                        .bind(&row.similar_movie_title)
                        .bind(row.similarity_score)
                        .bind(row.cooccurrence_count)
                        .bind(row.correlation)
                        .bind(row.similarity_rank)
                        .bind(row.release_date.as_deref())
                        .bind(&run_date)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        debug!("sqlite sink: wrote {} rows to {}", batch.rows.len(), view);
        Ok(batch.rows.len())
    }

    async fn append_run_summary(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO run_summary
                (run_date, recorded_at, total_rows, mean_age_by_occupation_count, top_rated_movies_count,
                 top_genres_by_occupation_age_count, similar_movies_count, status, error_message,
                 rows_dropped)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(summary.run_date.format(DATE_FORMAT).to_string())
        .bind(summary.recorded_at.to_rfc3339())
        .bind(summary.total_rows as i64)
        .bind(summary.count(ViewKind::OccupationAge) as i64)
        .bind(summary.count(ViewKind::TopMovies) as i64)
        .bind(summary.count(ViewKind::GenreCohorts) as i64)
        .bind(summary.count(ViewKind::SimilarMovies) as i64)
        .bind(summary.status.as_str())
        .bind(summary.error_message.as_deref())
        .bind(summary.rows_dropped as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn run_history(&self) -> Result<Vec<RunSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT run_date, recorded_at, total_rows, mean_age_by_occupation_count, top_rated_movies_count,
                   top_genres_by_occupation_age_count, similar_movies_count, status, error_message, rows_dropped
            FROM run_summary
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<RunSummary> {
                let run_date: String = row.try_get("run_date")?;
                let recorded_at: String = row.try_get("recorded_at")?;
                let status: String = row.try_get("status")?;

                let mut view_counts = BTreeMap::new();
                for view in ViewKind::ALL {
                    let count: i64 = row.try_get(format!("{}_count", view.name()).as_str())?;
                    view_counts.insert(view, count as usize);
                }

                Ok(RunSummary {
                    run_date: NaiveDate::parse_from_str(&run_date, DATE_FORMAT)
                        .map_err(|err| SinkError::InvalidRecord(err.to_string()))?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map_err(|err| SinkError::InvalidRecord(err.to_string()))?
                        .with_timezone(&Utc),
                    total_rows: row.try_get::<i64, _>("total_rows")? as usize,
                    view_counts,
                    status: RunStatus::from_str(&status)?,
                    error_message: row.try_get("error_message")?,
                    rows_dropped: row.try_get::<i64, _>("rows_dropped")? as usize,
                    warnings: Vec::new(),
                })
            })
            .collect()
    }

    async fn view_stats(&self, view: ViewKind) -> Result<ViewStats> {
        let metric = metric_column(view);
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS row_count, AVG({metric}) AS average, MAX({metric}) AS max_value, \
             MIN({metric}) AS min_value FROM {table}",
            metric = metric,
            table = view.name()
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(ViewStats {
            view,
            metric,
            row_count: row.try_get::<i64, _>("row_count")? as usize,
            average: row.try_get("average")?,
            max: row.try_get("max_value")?,
            min: row.try_get("min_value")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::{GenreCohortRow, OccupationAgeRow, SimilarMovieRow};
    use data_loader::{AgeGroup, Genre};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn occupation(name: &str, mean_age: f64) -> OccupationAgeRow {
        OccupationAgeRow {
            occupation: name.to_string(),
            mean_age,
            user_count: 2,
            std_dev: None,
            min_age: 20,
            max_age: 40,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let rows = ViewRows::OccupationAge(vec![occupation("engineer", 30.0), occupation("writer", 40.0)]);

        for _ in 0..2 {
            let written = sink
                .write_view(ViewBatch { run_date: date(), rows: &rows }, WriteMode::Upsert)
                .await
                .unwrap();
            assert_eq!(written, 2);
        }
        assert_eq!(sink.row_count(ViewKind::OccupationAge).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_and_replace_clears() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let first = ViewRows::OccupationAge(vec![occupation("engineer", 30.0), occupation("writer", 40.0)]);
        let second = ViewRows::OccupationAge(vec![occupation("engineer", 31.5)]);

        sink.write_view(ViewBatch { run_date: date(), rows: &first }, WriteMode::Upsert).await.unwrap();
        sink.write_view(ViewBatch { run_date: date(), rows: &second }, WriteMode::Upsert).await.unwrap();

        let mean: f64 = sqlx::query_scalar("SELECT mean_age FROM mean_age_by_occupation WHERE occupation = 'engineer'")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(mean, 31.5);
        assert_eq!(sink.row_count(ViewKind::OccupationAge).await.unwrap(), 2);

        sink.write_view(ViewBatch { run_date: date(), rows: &second }, WriteMode::Replace).await.unwrap();
        assert_eq!(sink.row_count(ViewKind::OccupationAge).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_composite_keys() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let genres = ViewRows::GenreCohorts(vec![
            GenreCohortRow {
                occupation: "student".to_string(),
                age_group: AgeGroup::Under20,
                genre: Genre::SciFi,
                avg_rating: 4.2,
                rating_count: 12,
                genre_rank: 1,
                total_users: 5,
            },
            GenreCohortRow {
                occupation: "student".to_string(),
                age_group: AgeGroup::Age20To24,
                genre: Genre::SciFi,
                avg_rating: 3.9,
                rating_count: 20,
                genre_rank: 1,
                total_users: 8,
            },
        ]);
        let similar = ViewRows::SimilarMovies(vec![SimilarMovieRow {
            target_movie: 12,
            similar_movie_id: 50,
            similar_movie_title: "Star Wars (1977)".to_string(),
            similarity_score: 0.97,
            cooccurrence_count: 180,
            correlation: 0.94,
            similarity_rank: 1,
            release_date: Some("01-Jan-1977".to_string()),
        }]);

        for rows in [&genres, &similar, &genres] {
            sink.write_view(ViewBatch { run_date: date(), rows }, WriteMode::Upsert).await.unwrap();
        }
        assert_eq!(sink.row_count(ViewKind::GenreCohorts).await.unwrap(), 2);
        assert_eq!(sink.row_count(ViewKind::SimilarMovies).await.unwrap(), 1);

        let label: String = sqlx::query_scalar("SELECT age_group FROM top_genres_by_occupation_age ORDER BY total_users LIMIT 1")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(label, "Under 20");
    }

    #[tokio::test]
    async fn test_tables_follow_view_names() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let mut single = occupation("writer", 40.0);
        single.user_count = 1;
        let rows = ViewRows::OccupationAge(vec![single]);
        sink.write_view(ViewBatch { run_date: date(), rows: &rows }, WriteMode::Upsert).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&sink.pool)
        .await
        .unwrap();
        assert_eq!(
            tables,
            vec![
                "mean_age_by_occupation",
                "run_summary",
                "similar_movies",
                "top_genres_by_occupation_age",
                "top_rated_movies",
            ]
        );

        let std_dev: Option<f64> = sqlx::query_scalar("SELECT std_dev FROM mean_age_by_occupation")
            .fetch_one(&sink.pool)
            .await
            .unwrap();
        assert_eq!(std_dev, None);
    }

    #[tokio::test]
    async fn test_view_stats() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let rows = ViewRows::OccupationAge(vec![
            occupation("engineer", 30.0),
            occupation("writer", 40.0),
            occupation("artist", 20.0),
        ]);
        sink.write_view(ViewBatch { run_date: date(), rows: &rows }, WriteMode::Upsert).await.unwrap();

        let stats = sink.view_stats(ViewKind::OccupationAge).await.unwrap();
        assert_eq!(stats.metric, "mean_age");
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.average, Some(30.0));
        assert_eq!(stats.max, Some(40.0));
        assert_eq!(stats.min, Some(20.0));

        let empty = sink.view_stats(ViewKind::SimilarMovies).await.unwrap();
        assert_eq!(empty.row_count, 0);
        assert_eq!((empty.average, empty.max, empty.min), (None, None, None));

        sink.append_run_summary(&RunSummary::failed(date(), "latest")).await.unwrap();
        let summary = sink.stored_summary().await.unwrap();
        assert_eq!(summary.views[0], stats);
        assert_eq!(summary.latest_run.unwrap().error_message.as_deref(), Some("latest"));
    }

    #[tokio::test]
    async fn test_run_history_round_trip() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let mut summary = RunSummary::failed(date(), "top_rated_movies: rejected");
        summary.status = RunStatus::Partial;
        summary.total_rows = 21;
        summary.view_counts.insert(ViewKind::OccupationAge, 21);
        summary.rows_dropped = 3;

        sink.append_run_summary(&summary).await.unwrap();
        sink.append_run_summary(&RunSummary::failed(date(), "cancelled")).await.unwrap();

        let history = sink.run_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, RunStatus::Partial);
        assert_eq!(history[0].count(ViewKind::OccupationAge), 21);
        assert_eq!(history[0].total_rows, 21);
        assert_eq!(history[0].run_date, date());
        assert_eq!(history[0].rows_dropped, 3);
        assert_eq!(history[1].error_message.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_file_database_persists_between_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("results.db").display());

        let sink = SqliteSink::connect(&url).await.unwrap();
        sink.append_run_summary(&RunSummary::failed(date(), "first")).await.unwrap();
        sink.close().await;

        let reopened = SqliteSink::connect(&url).await.unwrap();
        assert_eq!(reopened.run_history().await.unwrap().len(), 1);
    }
}
