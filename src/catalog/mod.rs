pub mod enrichment;
pub mod existing;
pub mod records;
