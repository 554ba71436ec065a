pub mod cli;
pub mod load_config;
pub mod spreadsheet;

pub use cli::{run, Cli, Commands};
