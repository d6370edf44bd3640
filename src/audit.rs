//! Country-code audit: which upstream origin codes have no exact match in the
//! target `countries` table, and what the override table should map them to.

use std::{
    collections::HashSet,
    fmt::Write as _,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::Result;
use csv::ReaderBuilder;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{info, warn};

use crate::catalog::records::{read_year_file, YearBatch};
use crate::config::SyncConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeStatus {
    /// Present in the target table as-is.
    Exact,
    /// Present in lower case.
    CaseFold(String),
    /// Present under a well-known alternative spelling.
    Alias(String),
    /// Absent; the lower-cased code is suggested.
    Missing(String),
}

impl CodeStatus {
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CodeStatus::Exact => None,
            CodeStatus::CaseFold(s) | CodeStatus::Alias(s) | CodeStatus::Missing(s) => Some(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTally {
    pub count: usize,
    pub example_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub code: String,
    pub count: usize,
    pub example_title: String,
    pub status: CodeStatus,
}

#[derive(Debug, Clone, Default)]
pub struct CountryAudit {
    /// Most frequent code first.
    pub rows: Vec<AuditRow>,
}

impl CountryAudit {
    pub fn mismatches(&self) -> impl Iterator<Item = &AuditRow> {
        self.rows.iter().filter(|r| r.status != CodeStatus::Exact)
    }

    /// Override table in the shape of `SyncConfig::country_overrides`.
    pub fn suggested_overrides(&self) -> IndexMap<String, String> {
        self.mismatches()
            .filter_map(|r| Some((r.code.clone(), r.status.suggestion()?.to_string())))
            .collect()
    }

    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<6} | {:<8} | note", "code", "target");
        let _ = writeln!(out, "{}", "-".repeat(60));
        for row in self.mismatches() {
            let (target, note) = match &row.status {
                CodeStatus::Exact => continue,
                CodeStatus::CaseFold(t) => (t.as_str(), format!("map {} -> {t}", row.code)),
                CodeStatus::Alias(t) => (t.as_str(), format!("alias {} -> {t}", row.code)),
                CodeStatus::Missing(t) => ("NONE", format!("missing (suggest {t})")),
            };
            let _ = writeln!(
                out,
                "{:<6} | {:<8} | {note} [{} movies, e.g. {}]",
                row.code, target, row.count, row.example_title
            );
        }
        out
    }
}

/// First column of each row, stripped of quotes and spaces, kept when it is a
/// two-letter code.
pub fn target_codes_from_reader<R: Read>(reader: R) -> HashSet<String> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    rdr.records()
        .filter_map(|r| r.ok())
        .filter_map(|row| {
            let code = row
                .get(0)?
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim();
            (code.chars().count() == 2).then(|| code.to_string())
        })
        .collect()
}

pub fn load_target_codes(path: &Path) -> HashSet<String> {
    match File::open(path) {
        Ok(f) => {
            let codes = target_codes_from_reader(BufReader::new(f));
            info!(file = %path.display(), codes = codes.len(), "loaded target country codes");
            codes
        }
        Err(err) => {
            warn!(file = %path.display(), error = %err, "country code table unavailable; every code will be reported missing");
            HashSet::new()
        }
    }
}

/// Count each movie's primary origin code, remembering the first title seen.
pub fn tally_codes(batches: &[YearBatch]) -> IndexMap<String, CodeTally> {
    let mut tally: IndexMap<String, CodeTally> = IndexMap::new();
    for movie in batches.iter().flat_map(|b| b.movies.iter()) {
        let Some(code) = movie.country_code.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        tally
            .entry(code.to_string())
            .or_insert_with(|| CodeTally {
                count: 0,
                example_title: movie.title.clone(),
            })
            .count += 1;
    }
    tally
}

pub fn classify(code: &str, targets: &HashSet<String>) -> CodeStatus {
    let lower = code.to_lowercase();
    if targets.contains(code) {
        CodeStatus::Exact
    } else if targets.contains(&lower) {
        CodeStatus::CaseFold(lower)
    } else if code == "GB" && targets.contains("uk") {
        CodeStatus::Alias("uk".to_string())
    } else if code == "US" && targets.contains("usa") {
        CodeStatus::Alias("usa".to_string())
    } else {
        CodeStatus::Missing(lower)
    }
}

pub fn audit(batches: &[YearBatch], targets: &HashSet<String>) -> CountryAudit {
    let rows = tally_codes(batches)
        .into_iter()
        .sorted_by(|a, b| b.1.count.cmp(&a.1.count))
        .map(|(code, tally)| AuditRow {
            status: classify(&code, targets),
            code,
            count: tally.count,
            example_title: tally.example_title,
        })
        .collect();
    CountryAudit { rows }
}

pub fn run_audit(cfg: &SyncConfig) -> Result<CountryAudit> {
    let targets = load_target_codes(&cfg.country_codes);
    let mut batches = Vec::new();
    for year in cfg.years() {
        if let Some(batch) = read_year_file(&cfg.movie_path(year), year)? {
            batches.push(batch);
        }
    }
    if batches.is_empty() {
        warn!(dir = %cfg.raw_dir.display(), "no movie dumps found to audit");
    }
    let report = audit(&batches, &targets);
    info!(
        codes = report.rows.len(),
        mismatches = report.mismatches().count(),
        "country audit complete"
    );
    Ok(report)
}
