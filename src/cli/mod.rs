mod args;
mod paths;
mod prompt;

pub use args::{CheckpointAction, Cli, Commands};
pub use paths::resolve_local_root;
pub use prompt::{ask, confirm, parse_selection};
