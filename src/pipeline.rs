//! The `generate` run: load every input, then make one forward pass over the
//! movie batches writing the statement script.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::catalog::enrichment::PersonDetailsMap;
use crate::catalog::existing::{ExistingMovieIndex, ExistingPeopleIndex};
use crate::catalog::records::{read_year_file, YearBatch};
use crate::config::SyncConfig;
use crate::emit::{StatementEmitter, TransactionEnd};
use crate::normalization::country::CountryResolver;
use crate::resolve::{IdentifierCounters, MovieResolution, ResolutionEngine, RunStats};

/// Everything `generate` reads, loaded up front so a fatal input error is
/// raised before the output file is touched.
#[derive(Debug)]
pub struct GenerateInputs {
    pub batches: Vec<YearBatch>,
    pub people: ExistingPeopleIndex,
    pub movies: ExistingMovieIndex,
    pub details: PersonDetailsMap,
}

#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub stats: RunStats,
    pub output: PathBuf,
    pub statements: u64,
    pub next_ids: IdentifierCounters,
}

/// Read every configured year. Missing years are skipped; an unreadable year
/// is fatal, as is finding no year at all.
pub fn load_year_batches(cfg: &SyncConfig) -> Result<Vec<YearBatch>> {
    let mut batches = Vec::new();
    for year in cfg.years() {
        let path = cfg.movie_path(year);
        match read_year_file(&path, year)? {
            Some(batch) => {
                info!(year, movies = batch.movies.len(), file = %path.display(), "loaded movie batch");
                batches.push(batch);
            }
            None => debug!(year, file = %path.display(), "no movie records for year; skipping"),
        }
    }
    if batches.is_empty() {
        bail!(
            "no movie records found in {} for years {}..={}",
            cfg.raw_dir.display(),
            cfg.start_year,
            cfg.end_year
        );
    }
    Ok(batches)
}

pub fn load_inputs(cfg: &SyncConfig) -> Result<GenerateInputs> {
    let batches = load_year_batches(cfg)?;
    let details = PersonDetailsMap::load(&cfg.people_details);
    let people = ExistingPeopleIndex::load(&cfg.existing_people);
    let movies = ExistingMovieIndex::load(&cfg.existing_movies);
    info!(
        existing_people = people.len(),
        existing_movies = movies.len(),
        "existing indexes ready"
    );
    Ok(GenerateInputs {
        batches,
        people,
        movies,
        details,
    })
}

/// Seeds that do not lie above the largest id already exported, as
/// `(setting, seed, max existing id)`. Ids allocated from such a seed can
/// collide with existing rows.
pub fn stale_seeds(
    cfg: &SyncConfig,
    movies: &ExistingMovieIndex,
    people: &ExistingPeopleIndex,
) -> Vec<(&'static str, i64, i64)> {
    [
        ("next_movie_id", cfg.next_movie_id, movies.max_id()),
        ("next_person_id", cfg.next_person_id, people.max_id()),
    ]
    .into_iter()
    .filter_map(|(name, seed, max)| max.filter(|m| seed <= *m).map(|m| (name, seed, m)))
    .collect()
}

pub fn engine_for(
    cfg: &SyncConfig,
    movies: ExistingMovieIndex,
    people: ExistingPeopleIndex,
) -> ResolutionEngine {
    for (setting, seed, max_existing) in stale_seeds(cfg, &movies, &people) {
        warn!(
            setting,
            seed,
            max_existing,
            "id seed is not above the largest exported id; new rows may collide"
        );
    }
    ResolutionEngine::new(
        movies,
        people,
        IdentifierCounters::new(cfg.next_movie_id, cfg.next_person_id),
        CountryResolver::new(cfg.default_country.clone(), cfg.country_overrides.clone()),
        cfg.max_cast,
    )
}

/// Resolve every movie in input order and write the framed script to
/// `emitter`. Returns the writer once the trailer is flushed.
pub fn generate_script<W: Write>(
    engine: &mut ResolutionEngine,
    batches: Vec<YearBatch>,
    details: &PersonDetailsMap,
    mut emitter: StatementEmitter<W>,
) -> Result<(W, u64)> {
    emitter.begin()?;
    for batch in batches {
        info!(year = batch.year, movies = batch.movies.len(), "processing year");
        for mut movie in batch.movies {
            details.enrich(&mut movie);
            if let MovieResolution::Inserted(resolved) = engine.resolve_movie(&movie) {
                emitter.write_movie(&resolved)?;
            }
        }
    }
    let statements = emitter.statements_written();
    let out = emitter.finish()?;
    Ok((out, statements))
}

#[instrument(skip(cfg), fields(output = %cfg.output.display()))]
pub fn run_generate(cfg: &SyncConfig) -> Result<GenerateReport> {
    cfg.validate()?;
    let started = Instant::now();
    let inputs = load_inputs(cfg)?;
    let mut engine = engine_for(cfg, inputs.movies, inputs.people);

    if let Some(parent) = cfg.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let file = File::create(&cfg.output)
        .with_context(|| format!("creating {}", cfg.output.display()))?;
    let emitter = StatementEmitter::new(
        BufWriter::new(file),
        TransactionEnd::from_commit_flag(cfg.commit),
    );

    let (_, statements) = generate_script(&mut engine, inputs.batches, &inputs.details, emitter)?;
    let stats = engine.stats();
    info!(
        statements,
        movies_skipped = stats.movies_skipped(),
        movies_inserted = stats.movies_inserted(),
        people_reused = stats.people_reused(),
        people_inserted = stats.people_inserted(),
        elapsed_ms = %started.elapsed().as_millis(),
        "statement script written"
    );
    Ok(GenerateReport {
        stats,
        output: cfg.output.clone(),
        statements,
        next_ids: engine.counters(),
    })
}
