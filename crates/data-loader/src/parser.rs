//! Parser for MovieLens 100k data files.
//!
//! - u.user: user_id|age|gender|occupation|zip_code
//! - u.item: movie_id|title|release_date|video_release_date|imdb_url|<19 genre flags>
//! - u.data: user_id<TAB>movie_id<TAB>rating<TAB>timestamp
//!
//! A line that fails type coercion is excluded and returned in
//! `ParsedFile::rejected`; it never aborts the file.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

pub const USERS_FILE: &str = "u.user";
pub const MOVIES_FILE: &str = "u.item";
pub const RATINGS_FILE: &str = "u.data";

/// Number of fields before the genre flags in u.item
const MOVIE_FIXED_FIELDS: usize = 5;

/// Rows parsed from one file plus the lines that were excluded
#[derive(Debug)]
pub struct ParsedFile<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<DataLoadError>,
    /// Non-blank lines seen
    pub lines: usize,
}

/// Read a file with ISO-8859-1 encoding (Latin-1).
///
/// MovieLens ships Latin-1 titles. Every byte maps directly to the Unicode
/// code point of the same value, so the conversion cannot fail.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();
    Ok(content.lines().map(|s| s.to_string()).collect())
}

fn parse_file<T>(
    path: &Path,
    parse_line: impl Fn(&str, usize) -> Result<T>,
) -> Result<ParsedFile<T>> {
    let lines = read_lines_latin1(path)?;
    let mut parsed = ParsedFile {
        rows: Vec::with_capacity(lines.len()),
        rejected: Vec::new(),
        lines: 0,
    };

    for (idx, line) in lines.iter().enumerate() {
        let line_trimmed = line.trim();
        if line_trimmed.is_empty() {
            continue;
        }
        parsed.lines += 1;
        match parse_line(line_trimmed, idx + 1) {
            Ok(row) => parsed.rows.push(row),
            Err(err) => parsed.rejected.push(err),
        }
    }
    Ok(parsed)
}

fn parse_error(file: &str, line: usize, reason: impl Into<String>) -> DataLoadError {
    DataLoadError::ParseError {
        file: file.to_string(),
        line,
        reason: reason.into(),
    }
}

fn next_field<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    file: &str,
    line: usize,
    name: &str,
) -> Result<&'a str> {
    parts
        .next()
        .map(str::trim)
        .ok_or_else(|| parse_error(file, line, format!("Missing {}", name)))
}

/// Parse a strictly positive integer id or count
fn parse_positive(value: &str, file: &str, line: usize, name: &str) -> Result<u32> {
    let parsed: u32 = value
        .parse()
        .map_err(|e| parse_error(file, line, format!("Invalid {} '{}': {}", name, value, e)))?;
    if parsed == 0 {
        return Err(parse_error(file, line, format!("Invalid {}: must be positive", name)));
    }
    Ok(parsed)
}

/// Parse one u.user line
pub fn parse_user_line(line: &str, line_no: usize) -> Result<User> {
    let mut parts = line.split('|');

    let user_id = next_field(&mut parts, USERS_FILE, line_no, "userId")?;
    let age = next_field(&mut parts, USERS_FILE, line_no, "age")?;
    let _gender = next_field(&mut parts, USERS_FILE, line_no, "gender")?;
    let occupation = next_field(&mut parts, USERS_FILE, line_no, "occupation")?;

    if occupation.is_empty() {
        return Err(parse_error(USERS_FILE, line_no, "Empty occupation"));
    }

    Ok(User {
        id: parse_positive(user_id, USERS_FILE, line_no, "userId")?,
        age: parse_positive(age, USERS_FILE, line_no, "age")?,
        occupation: occupation.to_string(),
    })
}

/// Parse one u.item line
pub fn parse_movie_line(line: &str, line_no: usize) -> Result<Movie> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    let expected = MOVIE_FIXED_FIELDS + Genre::ALL.len();
    if parts.len() != expected {
        return Err(parse_error(
            MOVIES_FILE,
            line_no,
            format!("Expected {} fields but found {}", expected, parts.len()),
        ));
    }

    let id = parse_positive(parts[0], MOVIES_FILE, line_no, "movieId")?;
    let title = parts[1];
    if title.is_empty() {
        return Err(parse_error(MOVIES_FILE, line_no, "Empty title"));
    }
    let release_date = match parts[2] {
        "" => None,
        date => Some(date.to_string()),
    };

    Ok(Movie {
        id,
        title: title.to_string(),
        release_date,
        genres: parse_genre_flags(&parts[MOVIE_FIXED_FIELDS..], line_no)?,
    })
}

/// Parse one u.data line
pub fn parse_rating_line(line: &str, line_no: usize) -> Result<Rating> {
    let mut parts = line.split('\t');

    let user_id = next_field(&mut parts, RATINGS_FILE, line_no, "userId")?;
    let movie_id = next_field(&mut parts, RATINGS_FILE, line_no, "movieId")?;
    let score = next_field(&mut parts, RATINGS_FILE, line_no, "rating")?;

    let score: Score = score
        .parse()
        .map_err(|e| parse_error(RATINGS_FILE, line_no, format!("Invalid rating '{}': {}", score, e)))?;
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(parse_error(
            RATINGS_FILE,
            line_no,
            format!("Rating {} outside {}-{}", score, MIN_SCORE, MAX_SCORE),
        ));
    }

    Ok(Rating {
        user_id: parse_positive(user_id, RATINGS_FILE, line_no, "userId")?,
        movie_id: parse_positive(movie_id, RATINGS_FILE, line_no, "movieId")?,
        score,
    })
}

/// Turn the 19 binary genre columns into a genre list
fn parse_genre_flags(flags: &[&str], line_no: usize) -> Result<Vec<Genre>> {
    let mut genres = Vec::new();
    for (flag, genre) in flags.iter().zip(Genre::ALL) {
        match *flag {
            "1" => genres.push(genre),
            "0" => {}
            other => {
                return Err(parse_error(
                    MOVIES_FILE,
                    line_no,
                    format!("Invalid flag '{}' for genre {}", other, genre),
                ));
            }
        }
    }
    Ok(genres)
}

pub fn parse_users(path: &Path) -> Result<ParsedFile<User>> {
    parse_file(path, parse_user_line)
}

pub fn parse_movies(path: &Path) -> Result<ParsedFile<Movie>> {
    parse_file(path, parse_movie_line)
}

pub fn parse_ratings(path: &Path) -> Result<ParsedFile<Rating>> {
    parse_file(path, parse_rating_line)
}
