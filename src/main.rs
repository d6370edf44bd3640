use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filmdb_sync::audit::run_audit;
use filmdb_sync::config::SyncConfig;
use filmdb_sync::tmdb::{harvest, TmdbClient};
use filmdb_sync::util::env;
use filmdb_sync::run_generate;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "filmdb", version, about = "Film database catalog sync")]
struct Cli {
    /// JSON config file layered over the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Resolve the movie dumps and write the insert script
    Generate {
        /// End the script with COMMIT instead of ROLLBACK
        #[arg(long, default_value_t = false)]
        commit: bool,
        /// Output script path
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
    },
    /// Download per-year movie dumps from TMDB
    FetchMovies {
        /// Year to fetch; repeatable (default: the configured range)
        #[arg(long = "year")]
        years: Vec<i32>,
        /// Discover pages per year (20 movies each)
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Fill the person details map with birth/death years
    EnrichPeople {
        /// Concurrent person lookups
        #[arg(long)]
        max_workers: Option<usize>,
    },
    /// Report origin codes that do not match the countries table
    AuditCountries {
        /// Write the suggested override table as JSON
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    filmdb_sync::tracing::init_tracing("info")?;

    let cli = Cli::parse();
    let mut cfg = SyncConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            commit,
            output,
            start_year,
            end_year,
        } => {
            cfg.commit |= commit;
            if let Some(output) = output {
                cfg.output = output;
            }
            if let Some(y) = start_year {
                cfg.start_year = y;
            }
            if let Some(y) = end_year {
                cfg.end_year = y;
            }
            let report = run_generate(&cfg)?;
            println!("{}", report.stats);
            println!("wrote {} statements to {}", report.statements, report.output.display());
            println!(
                "next ids: movie {}, person {}",
                report.next_ids.next_movie_id(),
                report.next_ids.next_person_id()
            );
            if !cfg.commit {
                println!("script ends in ROLLBACK; rerun with --commit to apply");
            }
        }
        Commands::FetchMovies { years, max_pages } => {
            if let Some(p) = max_pages {
                cfg.tmdb.max_pages = p;
            }
            let client = tmdb_client(&cfg)?;
            let years = if years.is_empty() {
                cfg.years().collect()
            } else {
                years
            };
            for year in years {
                match harvest::fetch_movies_for_year(&client, &cfg, year).await {
                    Ok(n) => info!(year, movies = n, "year fetched"),
                    Err(err) => warn!(year, error = %format!("{err:#}"), "year fetch failed"),
                }
            }
        }
        Commands::EnrichPeople { max_workers } => {
            if let Some(w) = max_workers {
                cfg.tmdb.max_workers = w;
            }
            let client = tmdb_client(&cfg)?;
            let report = harvest::enrich_people(&client, &cfg).await?;
            println!(
                "targets {}, already known {}, fetched {}, failed {}, rate limited {}",
                report.targets,
                report.already_known,
                report.fetched,
                report.failed,
                report.rate_limited
            );
        }
        Commands::AuditCountries { write } => {
            let report = run_audit(&cfg)?;
            print!("{}", report.render_report());
            let overrides = report.suggested_overrides();
            let body = serde_json::to_string_pretty(&overrides)?;
            match write {
                Some(path) => {
                    fs::write(&path, body)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("suggested overrides written to {}", path.display());
                }
                None => println!("{body}"),
            }
        }
    }
    Ok(())
}

fn tmdb_client(cfg: &SyncConfig) -> Result<TmdbClient> {
    // A key from the config file satisfies the check as well.
    let required: &[&str] = if cfg.tmdb.api_key.is_some() {
        &[]
    } else {
        &["TMDB_API_KEY"]
    };
    env::preflight_check(
        "tmdb",
        required,
        &["TMDB_API_KEY", "TMDB_BASE_URL", "FILMDB_RAW_DIR"],
    )?;
    TmdbClient::new(&cfg.tmdb)
}
