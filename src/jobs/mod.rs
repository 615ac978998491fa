pub mod check_availability;
pub use check_availability::*;
