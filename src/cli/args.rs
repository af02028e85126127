use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dynatlas")]
#[command(version, about = "Dynamic texture atlas merger", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merge images into one named atlas and write PNG + JSON region table
    Pack(PackArgs),
    /// Write a config file with default settings
    InitConfig {
        /// Destination path for the config file
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Input image files or directories
    #[arg(required_unless_present = "config")]
    pub input: Vec<PathBuf>,

    /// Load settings from a JSON config file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for atlas files [default: .]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Atlas name, also the base name of the output files [default: atlas]
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Maximum atlas edge in pixels [default: 2048]
    #[arg(long)]
    pub max_size: Option<u32>,

    /// Minimum atlas edge in pixels [default: 64]
    #[arg(long)]
    pub min_size: Option<u32>,

    /// Padding around each image in pixels [default: 0]
    #[arg(short, long)]
    pub padding: Option<u32>,

    /// Atlas size mode [default: rectangle]
    #[arg(long, value_enum)]
    pub size_mode: Option<SizeMode>,

    /// Packing heuristic to use [default: best-short-side-fit]
    #[arg(long, value_enum)]
    pub heuristic: Option<PackingHeuristic>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the solved atlas size is rounded up
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeMode {
    /// Square atlas, edge is a power of two
    #[value(name = "square")]
    Square,
    /// Each edge is a power of two independently
    #[default]
    #[value(name = "rectangle")]
    Rectangle,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackingHeuristic {
    /// Best Short Side Fit - minimizes the shorter leftover side
    #[default]
    #[value(name = "best-short-side-fit")]
    BestShortSideFit,
    /// Best Long Side Fit - minimizes the longer leftover side
    #[value(name = "best-long-side-fit")]
    BestLongSideFit,
    /// Best Area Fit - picks the smallest free rectangle
    #[value(name = "best-area-fit")]
    BestAreaFit,
    /// Bottom Left - Tetris-style packing
    #[value(name = "bottom-left")]
    BottomLeft,
    /// Contact Point - maximizes contact with placed rectangles and bin edges
    #[value(name = "contact-point")]
    ContactPoint,
}
