#[cfg(feature = "config")]
mod config;
