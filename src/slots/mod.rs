pub mod dates;
pub mod models;

pub use models::*;
