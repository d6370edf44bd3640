//! Producers of the generate inputs: per-year movie dumps and the person
//! enrichment map.

use std::{collections::BTreeSet, fs, time::Duration};

use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::client::{PersonLookup, TmdbClient};
use crate::catalog::enrichment::{PersonDetails, PersonDetailsMap};
use crate::catalog::records::{read_year_file, YearBatch};
use crate::config::SyncConfig;

/// Save the enrichment map every this many lookups.
const CHECKPOINT_EVERY: usize = 200;
const PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub targets: usize,
    pub already_known: usize,
    pub fetched: usize,
    pub failed: usize,
    pub rate_limited: usize,
}

/// Discover up to `max_pages` pages of movies released in `year`, fetch each
/// one's full payload and write them as the year's dump. Returns how many
/// movies were written.
#[instrument(skip(client, cfg))]
pub async fn fetch_movies_for_year(client: &TmdbClient, cfg: &SyncConfig, year: i32) -> Result<usize> {
    let mut ids: Vec<i64> = Vec::new();
    for page in 1..=cfg.tmdb.max_pages {
        match client.discover_movie_ids(year, page).await {
            Ok(page_ids) if page_ids.is_empty() => break,
            Ok(page_ids) => ids.extend(page_ids),
            Err(err) => warn!(page, error = %err, "discover page failed; skipping"),
        }
        tokio::time::sleep(PAGE_DELAY).await;
    }
    info!(candidates = ids.len(), "discovered movie ids");

    let delay = Duration::from_millis(cfg.tmdb.request_delay_ms);
    let mut movies: Vec<Value> = Vec::with_capacity(ids.len());
    for (i, movie_id) in ids.iter().copied().enumerate() {
        match client.movie_details(movie_id).await {
            Ok(Some(body)) => movies.push(body),
            Ok(None) => {}
            Err(err) => warn!(movie_id, error = %err, "movie fetch failed; skipping"),
        }
        if (i + 1) % 20 == 0 {
            info!(done = i + 1, total = ids.len(), "movie details progress");
        }
        tokio::time::sleep(delay).await;
    }

    let path = cfg.movie_path(year);
    fs::create_dir_all(&cfg.raw_dir)
        .with_context(|| format!("creating {}", cfg.raw_dir.display()))?;
    let body = serde_json::to_string_pretty(&movies)?;
    fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    info!(movies = movies.len(), file = %path.display(), "movie dump written");
    Ok(movies.len())
}

/// Upstream ids of every director and the first `max_cast` actors.
pub fn collect_target_person_ids(batches: &[YearBatch], max_cast: usize) -> BTreeSet<i64> {
    batches
        .iter()
        .flat_map(|b| b.movies.iter())
        .flat_map(|m| m.participating_credits(max_cast))
        .filter_map(|c| c.person.source_id)
        .filter(|id| *id > 0)
        .collect()
}

/// Look up birth/death years for every targeted person not yet in the map.
/// Resumes from whatever the map file already holds.
#[instrument(skip(client, cfg))]
pub async fn enrich_people(client: &TmdbClient, cfg: &SyncConfig) -> Result<EnrichReport> {
    let mut batches = Vec::new();
    for year in cfg.years() {
        if let Some(batch) = read_year_file(&cfg.movie_path(year), year)? {
            batches.push(batch);
        }
    }
    let targets = collect_target_person_ids(&batches, cfg.max_cast);

    let mut map = PersonDetailsMap::load(&cfg.people_details);
    let todo: Vec<i64> = targets
        .iter()
        .copied()
        .filter(|id| !map.contains(*id))
        .collect();
    let mut report = EnrichReport {
        targets: targets.len(),
        already_known: targets.len() - todo.len(),
        ..EnrichReport::default()
    };
    info!(
        targets = report.targets,
        already_known = report.already_known,
        to_fetch = todo.len(),
        workers = cfg.tmdb.max_workers,
        "person enrichment starting"
    );
    if todo.is_empty() {
        return Ok(report);
    }

    let total = todo.len();
    let mut results = stream::iter(todo)
        .map(|id| async move { (id, client.person_details(id).await) })
        .buffer_unordered(cfg.tmdb.max_workers.max(1));

    let mut done = 0usize;
    while let Some((id, result)) = results.next().await {
        done += 1;
        match result {
            Ok(PersonLookup::Found(details)) => {
                map.insert(id, details);
                report.fetched += 1;
            }
            // Left out so the next run retries it.
            Ok(PersonLookup::RateLimited) => report.rate_limited += 1,
            Err(err) => {
                warn!(person_id = id, error = %err, "person lookup failed; recording unknown years");
                map.insert(id, PersonDetails::default());
                report.failed += 1;
            }
        }
        if done % CHECKPOINT_EVERY == 0 {
            map.save(&cfg.people_details)?;
            info!(done, total, stored = map.len(), "enrichment checkpoint saved");
        }
    }

    map.save(&cfg.people_details)?;
    info!(?report, stored = map.len(), file = %cfg.people_details.display(), "person enrichment finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::records::parse_year_batch;

    #[test]
    fn targets_cover_directors_and_leading_cast() {
        let b2019 = parse_year_batch(
            r#"[{"title": "A", "credits": {
                    "crew": [{"id": 1, "name": "D One", "job": "Director"},
                             {"id": 9, "name": "Not Director", "job": "Editor"}],
                    "cast": [{"id": 2, "name": "C Two"}, {"id": 3, "name": "C Three"},
                             {"id": 4, "name": "C Four"}]}}]"#,
            2019,
        )
        .unwrap();
        let b2020 = parse_year_batch(
            r#"[{"title": "B", "credits": {
                    "directors": [{"id": 1, "name": "D One"}],
                    "cast": [{"name": "No Id"}, {"id": 5, "name": "C Five"}]}}]"#,
            2020,
        )
        .unwrap();
        let ids = collect_target_person_ids(&[b2019, b2020], 2);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
    }
}
