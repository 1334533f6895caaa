mod dedup;
mod retention;
mod schedule;
mod utils;
