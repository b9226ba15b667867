//! Configuration for partlock.
//!
//! This module defines the Config struct that represents `<data-dir>/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, and validation of config values.

mod model;
mod operations;

#[cfg(test)]
mod tests;

pub use model::Config;
