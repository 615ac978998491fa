pub mod cli;
pub mod core;
pub mod fetch;
pub mod filter;
pub mod jobs;
pub mod notify;
pub mod planner;
pub mod slots;
pub mod sources;
pub mod store;
