//! Run configuration: built-in defaults, optionally overlaid by a JSON file,
//! then by `FILMDB_*` / `TMDB_*` environment variables. CLI flags are applied
//! last by the binary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::util::env::{env_flag, env_opt, env_parse};

pub const YEAR_PLACEHOLDER: &str = "{year}";

/// Upper bound for the id seeds, leaving room to allocate without overflow.
pub const MAX_ID_SEED: i64 = i64::MAX / 2;

/// Known mismatches between upstream ISO codes and the target `countries` table.
const DEFAULT_COUNTRY_OVERRIDES: &[(&str, &str)] = &[
    ("US", "us"),
    ("FR", "fr"),
    ("DE", "de"),
    ("GB", "gb"),
    ("IT", "it"),
    ("CA", "ca"),
    ("ES", "sp"),
    ("JP", "jp"),
    ("ID", "id"),
    ("BR", "br"),
    ("IN", "in"),
    ("PH", "ph"),
    ("KR", "kr"),
    ("BE", "be"),
    ("MX", "mx"),
    ("CN", "cn"),
    ("AU", "au"),
    ("PL", "pl"),
    ("AT", "at"),
    ("SE", "se"),
    ("AR", "ar"),
    ("NO", "no"),
    ("NL", "nl"),
    ("PT", "pt"),
    ("FI", "fi"),
    ("DK", "dk"),
    ("TH", "th"),
    ("PE", "pe"),
    ("CL", "cl"),
    ("VN", "vn"),
    ("CZ", "cz"),
    ("IR", "ir"),
    ("RU", "ru"),
    ("CH", "ch"),
    ("TR", "tr"),
    ("CO", "co"),
    ("DM", "dm"),
    ("EC", "ec"),
    ("IE", "ie"),
    ("IL", "il"),
    ("KZ", "kz"),
    ("NZ", "nz"),
    ("HN", "hn"),
    ("BG", "bg"),
    ("EE", "ee"),
    ("HU", "hu"),
    ("RO", "ro"),
    ("HK", "hk"),
    ("LV", "lv"),
    ("DO", "do"),
    ("GR", "gr"),
    ("SA", "sa"),
];

/// Settings for the remote catalog API used by the fetch subcommands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbSettings {
    pub base_url: String,
    /// Never serialized back out; read from `TMDB_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_pages: u32,
    pub max_workers: usize,
    pub request_delay_ms: u64,
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for TmdbSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: None,
            max_pages: 1,
            max_workers: 12,
            request_delay_ms: 250,
            max_retries: 4,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding the per-year movie dumps.
    pub raw_dir: PathBuf,
    /// File name pattern inside `raw_dir`; `{year}` is substituted.
    pub movie_file_pattern: String,
    pub people_details: PathBuf,
    pub existing_people: PathBuf,
    pub existing_movies: PathBuf,
    pub country_codes: PathBuf,
    pub output: PathBuf,
    pub start_year: i32,
    pub end_year: i32,
    pub next_movie_id: i64,
    pub next_person_id: i64,
    pub max_cast: usize,
    pub default_country: String,
    pub country_overrides: IndexMap<String, String>,
    /// End the script with COMMIT instead of the dry-run ROLLBACK.
    pub commit: bool,
    pub tmdb: TmdbSettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("raw_data"),
            movie_file_pattern: "raw_movies_data_{year}.json".to_string(),
            people_details: PathBuf::from("raw_data/people_details_map.json"),
            existing_people: PathBuf::from("original_data/existing_people.csv"),
            existing_movies: PathBuf::from("original_data/existing_movies.csv"),
            country_codes: PathBuf::from("original_data/country_code.csv"),
            output: PathBuf::from("clean_sql/update_filmdb_final.sql"),
            start_year: 2019,
            end_year: 2025,
            next_movie_id: 9210,
            next_person_id: 16510,
            max_cast: 4,
            default_country: "us".to_string(),
            country_overrides: DEFAULT_COUNTRY_OVERRIDES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            commit: false,
            tmdb: TmdbSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults, then the optional JSON file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_opt("FILMDB_RAW_DIR") {
            self.raw_dir = PathBuf::from(v);
        }
        if let Some(v) = env_opt("FILMDB_OUTPUT") {
            self.output = PathBuf::from(v);
        }
        if let Some(v) = env_opt("FILMDB_EXISTING_PEOPLE") {
            self.existing_people = PathBuf::from(v);
        }
        if let Some(v) = env_opt("FILMDB_EXISTING_MOVIES") {
            self.existing_movies = PathBuf::from(v);
        }
        if let Some(v) = env_opt("FILMDB_PEOPLE_DETAILS") {
            self.people_details = PathBuf::from(v);
        }
        if let Some(v) = env_opt("FILMDB_COUNTRY_CODES") {
            self.country_codes = PathBuf::from(v);
        }
        if let Some(v) = env_opt("FILMDB_DEFAULT_COUNTRY") {
            self.default_country = v.trim().to_string();
        }
        self.start_year = env_parse("FILMDB_START_YEAR", self.start_year);
        self.end_year = env_parse("FILMDB_END_YEAR", self.end_year);
        self.next_movie_id = env_parse("FILMDB_NEXT_MOVIE_ID", self.next_movie_id);
        self.next_person_id = env_parse("FILMDB_NEXT_PERSON_ID", self.next_person_id);
        self.max_cast = env_parse("FILMDB_MAX_CAST", self.max_cast);
        self.commit = env_flag("FILMDB_COMMIT", self.commit);
        if let Some(v) = env_opt("TMDB_BASE_URL") {
            self.tmdb.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = env_opt("TMDB_API_KEY") {
            self.tmdb.api_key = Some(v.trim().to_string());
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            bail!(
                "start_year {} is after end_year {}",
                self.start_year,
                self.end_year
            );
        }
        for (name, seed) in [
            ("next_movie_id", self.next_movie_id),
            ("next_person_id", self.next_person_id),
        ] {
            if !(0..=MAX_ID_SEED).contains(&seed) {
                bail!("{name} {seed} is outside 0..={MAX_ID_SEED}");
            }
        }
        if self.default_country.trim().is_empty() {
            bail!("default_country must be non-empty");
        }
        if !self.movie_file_pattern.contains(YEAR_PLACEHOLDER) {
            bail!(
                "movie_file_pattern {:?} has no {YEAR_PLACEHOLDER} placeholder",
                self.movie_file_pattern
            );
        }
        Ok(())
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn movie_path(&self, year: i32) -> PathBuf {
        self.raw_dir.join(
            self.movie_file_pattern
                .replace(YEAR_PLACEHOLDER, &year.to_string()),
        )
    }
}
