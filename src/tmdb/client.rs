use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rand::{thread_rng, Rng};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::enrichment::PersonDetails;
use crate::catalog::records::date_year;
use crate::config::TmdbSettings;

/// Base wait per 429 retry; attempt `n` waits `n + 1` steps.
const RATE_LIMIT_STEP_SECS: u64 = 5;
const MAX_JITTER_MS: u64 = 250;

#[derive(Debug)]
pub enum ApiResponse {
    Json(Value),
    /// Still throttled after every retry.
    RateLimited,
    /// Any other non-success status.
    Status(StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonLookup {
    Found(PersonDetails),
    RateLimited,
}

/// Wait before retry `attempt` (0-based). A larger `Retry-After` wins.
pub fn backoff_delay(attempt: usize, retry_after_secs: Option<u64>, jitter_ms: u64) -> Duration {
    let scheduled = RATE_LIMIT_STEP_SECS * (attempt as u64 + 1);
    let secs = retry_after_secs.map_or(scheduled, |ra| ra.max(scheduled));
    Duration::from_secs(secs) + Duration::from_millis(jitter_ms)
}

/// Thin client for the TMDB v3 API with bounded 429 back-off.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: usize,
}

impl TmdbClient {
    pub fn new(settings: &TmdbSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("TMDB_API_KEY is not configured"))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: settings.max_retries,
        })
    }

    /// GET `{base_url}{path}` with the api key appended. Transport errors are
    /// returned; 429s are retried at most `max_retries` times.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0usize;
        loop {
            let resp = self
                .http
                .get(&url)
                .header("Accept", "application/json")
                .query(&[("api_key", self.api_key.as_str())])
                .query(query)
                .send()
                .await
                .with_context(|| format!("GET {path}"))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.max_retries {
                    warn!(path, attempts = attempt + 1, "rate limited; giving up");
                    return Ok(ApiResponse::RateLimited);
                }
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok());
                let delay = backoff_delay(attempt, retry_after, thread_rng().gen_range(0..=MAX_JITTER_MS));
                debug!(path, attempt, delay_ms = %delay.as_millis(), "rate limited; backing off");
                attempt += 1;
                tokio::time::sleep(delay).await;
                continue;
            }
            if !status.is_success() {
                return Ok(ApiResponse::Status(status));
            }
            let body = resp
                .json::<Value>()
                .await
                .with_context(|| format!("decoding GET {path}"))?;
            return Ok(ApiResponse::Json(body));
        }
    }

    /// Movie ids released in `year`, most popular first.
    pub async fn discover_movie_ids(&self, year: i32, page: u32) -> Result<Vec<i64>> {
        let query = [
            ("primary_release_year", year.to_string()),
            ("sort_by", "popularity.desc".to_string()),
            ("page", page.to_string()),
        ];
        match self.get_json("/discover/movie", &query).await? {
            ApiResponse::Json(body) => Ok(discover_ids(&body)),
            other => {
                warn!(year, page, response = ?other, "discover page unavailable");
                Ok(Vec::new())
            }
        }
    }

    /// Full movie payload with credits, release dates and keywords attached.
    pub async fn movie_details(&self, movie_id: i64) -> Result<Option<Value>> {
        let query = [(
            "append_to_response",
            "credits,release_dates,keywords".to_string(),
        )];
        match self.get_json(&format!("/movie/{movie_id}"), &query).await? {
            ApiResponse::Json(body) => Ok(Some(body)),
            other => {
                warn!(movie_id, response = ?other, "movie details unavailable");
                Ok(None)
            }
        }
    }

    /// Birth/death years. Non-success statuses are reported as unknown years,
    /// throttling as [`PersonLookup::RateLimited`].
    pub async fn person_details(&self, person_id: i64) -> Result<PersonLookup> {
        match self.get_json(&format!("/person/{person_id}"), &[]).await? {
            ApiResponse::Json(body) => Ok(PersonLookup::Found(person_years(&body))),
            ApiResponse::RateLimited => Ok(PersonLookup::RateLimited),
            ApiResponse::Status(status) => {
                debug!(person_id, %status, "person lookup failed; recording unknown years");
                Ok(PersonLookup::Found(PersonDetails::default()))
            }
        }
    }
}

fn discover_ids(body: &Value) -> Vec<i64> {
    body.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|m| m.get("id").and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default()
}

fn person_years(body: &Value) -> PersonDetails {
    let year = |field: &str| body.get(field).and_then(Value::as_str).and_then(date_year);
    PersonDetails {
        born: year("birthday"),
        died: year("deathday"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_grows_and_honours_retry_after() {
        assert_eq!(backoff_delay(0, None, 0), Duration::from_secs(5));
        assert_eq!(backoff_delay(3, None, 0), Duration::from_secs(20));
        assert_eq!(backoff_delay(0, Some(30), 0), Duration::from_secs(30));
        assert_eq!(backoff_delay(1, Some(2), 0), Duration::from_secs(10));
        assert_eq!(
            backoff_delay(0, None, 120),
            Duration::from_secs(5) + Duration::from_millis(120)
        );
    }

    #[test]
    fn extracts_discover_ids() {
        let body = json!({"page": 1, "results": [{"id": 1}, {"title": "no id"}, {"id": 3}]});
        assert_eq!(discover_ids(&body), vec![1, 3]);
        assert!(discover_ids(&json!({})).is_empty());
    }

    #[test]
    fn person_years_from_dates() {
        let body = json!({"birthday": "1962-10-22", "deathday": null});
        assert_eq!(
            person_years(&body),
            PersonDetails {
                born: Some(1962),
                died: None
            }
        );
        assert_eq!(person_years(&json!({})), PersonDetails::default());
    }

    #[test]
    fn client_requires_api_key() {
        let err = TmdbClient::new(&TmdbSettings::default()).unwrap_err();
        assert!(err.to_string().contains("TMDB_API_KEY"));
    }
}
