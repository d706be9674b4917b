mod args;
mod paths;

pub use args::{Cli, Commands, ConfigAction};
pub use paths::collect_files;
