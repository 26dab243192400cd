//! CLI command implementations.

mod display;

pub mod search;
