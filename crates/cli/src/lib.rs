pub mod cli;
pub mod commands;
pub mod execute;
pub mod stack;

pub use cli::Cli;
pub use commands::{Commands, ResolveArgs};
