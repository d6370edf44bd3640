//! Movie records decoded from the per-year catalog dumps.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::resolve::keys::MovieKey;

/// How a person is credited on a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleCode {
    Director,
    Actor,
}

impl RoleCode {
    /// Value of the `credits.credited_as` column.
    pub fn as_str(self) -> &'static str {
        match self {
            RoleCode::Director => "D",
            RoleCode::Actor => "A",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

impl Gender {
    /// Upstream encodes 1 = female, 2 = male, everything else unknown.
    pub fn from_upstream(code: Option<i64>) -> Self {
        match code {
            Some(1) => Gender::Female,
            Some(2) => Gender::Male,
            _ => Gender::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Female => "F",
            Gender::Male => "M",
            Gender::Unknown => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonRef {
    pub source_id: Option<i64>,
    pub full_name: String,
    pub gender: Gender,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credit {
    pub person: PersonRef,
    pub role: RoleCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub source_id: Option<i64>,
    pub title: String,
    pub release_year: i32,
    pub runtime_minutes: i64,
    /// Primary (first listed) origin country, as upstream spells it.
    pub country_code: Option<String>,
    /// Directors first, then the full cast, each in upstream order.
    pub people: Vec<Credit>,
}

impl MovieRecord {
    pub fn key(&self) -> MovieKey {
        MovieKey::new(self.title.clone(), self.release_year)
    }

    /// Every director plus the first `max_cast` actors, in that order.
    pub fn participating_credits(&self, max_cast: usize) -> impl Iterator<Item = &Credit> {
        let directors = self
            .people
            .iter()
            .filter(|c| c.role == RoleCode::Director);
        let cast = self
            .people
            .iter()
            .filter(|c| c.role == RoleCode::Actor)
            .take(max_cast);
        directors.chain(cast)
    }

    pub fn people_mut(&mut self) -> impl Iterator<Item = &mut PersonRef> {
        self.people.iter_mut().map(|c| &mut c.person)
    }

    /// Build a record from one raw catalog object; `None` when it has no title.
    pub fn from_raw(raw: RawMovie, batch_year: i32) -> Option<Self> {
        let title = raw.title.filter(|t| !t.is_empty())?;
        let release_year = release_year(raw.release_date.as_deref(), batch_year);
        let country_code = raw
            .origin_country
            .and_then(|codes| codes.into_iter().next());

        let credits = raw.credits.unwrap_or_default();
        let mut directors = credits.directors.unwrap_or_default();
        if directors.is_empty() {
            directors = credits
                .crew
                .unwrap_or_default()
                .into_iter()
                .filter(|p| p.job.as_deref() == Some("Director"))
                .collect();
        }
        let cast = credits.cast.unwrap_or_default();

        let people = directors
            .into_iter()
            .map(|p| p.into_credit(RoleCode::Director))
            .chain(cast.into_iter().map(|p| p.into_credit(RoleCode::Actor)))
            .collect();

        Some(Self {
            source_id: raw.id,
            title,
            release_year,
            runtime_minutes: raw.runtime.unwrap_or(0),
            country_code,
            people,
        })
    }
}

/// Year from an ISO `YYYY-MM-DD` release date, else from its first four
/// characters, else the batch year.
pub fn release_year(date: Option<&str>, fallback: i32) -> i32 {
    date.and_then(date_year).unwrap_or(fallback)
}

/// Year of an upstream date string (`YYYY-MM-DD`, or anything starting with
/// four year digits).
pub fn date_year(date: &str) -> Option<i32> {
    let date = date.trim();
    if let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return Some(d.year());
    }
    date.get(..4)?.parse::<i32>().ok()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawMovie {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i64>,
    pub origin_country: Option<Vec<String>>,
    pub credits: Option<RawCredits>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCredits {
    pub directors: Option<Vec<RawPerson>>,
    pub crew: Option<Vec<RawPerson>>,
    pub cast: Option<Vec<RawPerson>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawPerson {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub gender: Option<i64>,
    pub job: Option<String>,
}

impl RawPerson {
    fn into_credit(self, role: RoleCode) -> Credit {
        Credit {
            person: PersonRef {
                source_id: self.id,
                full_name: self.name.unwrap_or_default(),
                gender: Gender::from_upstream(self.gender),
                birth_year: None,
                death_year: None,
            },
            role,
        }
    }
}

/// All movie records read from one year's dump.
#[derive(Debug, Clone)]
pub struct YearBatch {
    pub year: i32,
    pub movies: Vec<MovieRecord>,
}

/// Decode a JSON array of raw movies. Elements that fail to decode or have no
/// title are skipped; a document that is not an array is an error.
pub fn parse_year_batch(json: &str, year: i32) -> Result<YearBatch> {
    let doc: Value = serde_json::from_str(json).context("movie dump is not valid JSON")?;
    let Value::Array(items) = doc else {
        bail!("movie dump for {year} is not a JSON array");
    };

    let mut movies = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let raw: RawMovie = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(year, index = idx, error = %err, "skipping undecodable movie record");
                continue;
            }
        };
        match MovieRecord::from_raw(raw, year) {
            Some(m) => movies.push(m),
            None => warn!(year, index = idx, "skipping movie record without a title"),
        }
    }
    debug!(year, movies = movies.len(), "decoded movie batch");
    Ok(YearBatch { year, movies })
}

/// Read one year's dump from disk. `Ok(None)` when the file does not exist.
pub fn read_year_file(path: &Path, year: i32) -> Result<Option<YearBatch>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading movie records {}", path.display()))?;
    let batch = parse_year_batch(&raw, year)
        .with_context(|| format!("parsing movie records {}", path.display()))?;
    Ok(Some(batch))
}
