//! Catalog API collaborators. Only the fetch subcommands touch the network;
//! `generate` works purely from the files these produce.
pub mod client;
pub mod harvest;

pub use client::TmdbClient;
