#![forbid(unsafe_code)]

#[cfg(feature = "bootstrap")]
pub mod bootstrap;
#[cfg(feature = "config")]
pub mod config;
#[cfg(feature = "context")]
pub mod context;
#[cfg(feature = "database")]
pub mod database;
#[cfg(feature = "global")]
pub mod global;
#[cfg(feature = "logging")]
pub mod logging;
#[cfg(feature = "rmq")]
pub mod rmq;
#[cfg(feature = "bootstrap")]
pub mod signal;

#[cfg(test)]
mod tests;
