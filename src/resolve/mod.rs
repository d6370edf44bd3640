pub mod engine;
pub mod keys;
pub mod stats;

pub use engine::{
    CreditRow, IdentifierCounters, MovieResolution, MovieRow, PersonResolution, PersonRow,
    ResolutionEngine, ResolvedMovie,
};
pub use stats::RunStats;
