//! Movie catalog sync: resolve upstream movie dumps against an existing
//! film database and write the insert script that brings it up to date.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod emit;
pub mod normalization;
pub mod pipeline;
pub mod resolve;
pub mod tmdb;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use config::SyncConfig;
pub use pipeline::{run_generate, GenerateReport};
