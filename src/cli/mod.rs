mod args;

pub use args::{CliArgs, Command, PackArgs, PackingHeuristic, SizeMode};
