//! Command-line interface.

mod args;
pub mod dev;
pub mod validate;

pub use args::{Cli, Commands, DevArgs, ValidateArgs};
