pub mod sql;

pub use sql::{StatementEmitter, TransactionEnd};
