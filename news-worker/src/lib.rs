pub mod config;
pub mod database;
pub mod dedup;
pub mod delivery;
pub mod discord;
pub mod global;
pub mod ingest;
pub mod matcher;
pub mod periodic;
pub mod queue;
pub mod retention;
pub mod scanner;
pub mod schedule;
pub mod store;

#[cfg(test)]
mod tests;
