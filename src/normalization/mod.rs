pub mod country;
pub mod name;
