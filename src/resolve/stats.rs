use std::fmt;

use serde::Serialize;

/// Outcome counters for one generate run. Reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    movies_skipped: u64,
    movies_inserted: u64,
    people_reused: u64,
    people_inserted: u64,
}

impl RunStats {
    pub(crate) fn record_movie_skipped(&mut self) {
        self.movies_skipped += 1;
    }

    pub(crate) fn record_movie_inserted(&mut self) {
        self.movies_inserted += 1;
    }

    pub(crate) fn record_person_reused(&mut self) {
        self.people_reused += 1;
    }

    pub(crate) fn record_person_inserted(&mut self) {
        self.people_inserted += 1;
    }

    /// Movies already present in the target dataset.
    pub fn movies_skipped(&self) -> u64 {
        self.movies_skipped
    }

    pub fn movies_inserted(&self) -> u64 {
        self.movies_inserted
    }

    /// Times a credit resolved to a person from the prior export (or one
    /// allocated earlier in this run under another upstream id).
    pub fn people_reused(&self) -> u64 {
        self.people_reused
    }

    pub fn people_inserted(&self) -> u64 {
        self.people_inserted
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "skipped existing movies: {}", self.movies_skipped)?;
        writeln!(f, "inserted movies:         {}", self.movies_inserted)?;
        writeln!(f, "reused people:           {}", self.people_reused)?;
        write!(f, "inserted people:         {}", self.people_inserted)
    }
}
