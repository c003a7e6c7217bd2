//! Configuration for the `xaa` command line
//!
//! Provides types and parsing for `xaa.toml`.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides, CliOverrides,
    LoadError,
};
pub use schema::*;
