use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use dynatlas::cli::{CliArgs, Command, PackArgs};
use dynatlas::config::{AtlasConfig, LoadedConfig, PackConfig, save_config};
use dynatlas::manager::AtlasManager;
use dynatlas::output::{atlas_png_filename, save_atlas_image, write_json};
use dynatlas::sprite::load_images;

#[allow(clippy::print_stderr)]
fn main() {
    if let Err(e) = run() {
        // The logger may not be initialized yet when config loading fails
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = CliArgs::parse();

    match cli.command {
        Command::Pack(args) => pack(&args),
        Command::InitConfig { path } => {
            save_config(&PackConfig::default(), &path)?;
            init_logger(false);
            info!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}

fn init_logger(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn pack(args: &PackArgs) -> Result<()> {
    let merged = merge_config_with_args(args)?;
    init_logger(merged.verbose);

    info!("dynatlas v{}", env!("CARGO_PKG_VERSION"));

    if !merged.output.exists() {
        fs::create_dir_all(&merged.output)?;
    }

    let items = load_images(&merged.input)?;
    info!("Loaded {} images", items.len());
    if items.is_empty() {
        bail!("no images to pack");
    }

    let manager = AtlasManager::new(merged.atlas)?;
    let mut tickets = Vec::with_capacity(items.len());
    for item in items {
        let ticket = manager
            .insert_ticket(&merged.name, item.image, &item.name)
            .with_context(|| format!("failed to queue '{}'", item.name))?;
        tickets.push(ticket);
    }

    if !manager.flush() {
        bail!("atlas '{}' did not finish building in time", merged.name);
    }

    for ticket in &tickets {
        match ticket.try_take() {
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e).context(format!("failed to pack '{}'", ticket.name())),
            None => bail!("'{}' was never resolved", ticket.name()),
        }
    }

    let generation = manager
        .generation(&merged.name)
        .with_context(|| format!("atlas '{}' has no published generation", merged.name))?;
    let version = manager.current_version(&merged.name);

    let png_path = merged.output.join(atlas_png_filename(&merged.name));
    save_atlas_image(&generation, &png_path)?;
    info!("Saved {}", png_path.display());

    write_json(&generation, version, &merged.output, &merged.name)?;
    info!("Generated {}.json", merged.name);

    info!("Done!");

    Ok(())
}

/// Merged configuration from CLI args and optional config file.
struct MergedConfig {
    input: Vec<PathBuf>,
    output: PathBuf,
    name: String,
    atlas: AtlasConfig,
    verbose: bool,
}

/// Merge CLI arguments with config file (CLI takes precedence).
fn merge_config_with_args(args: &PackArgs) -> Result<MergedConfig> {
    let loaded_config = if let Some(ref config_path) = args.config {
        Some(
            LoadedConfig::load(config_path)
                .with_context(|| format!("failed to load config: {}", config_path.display()))?,
        )
    } else {
        None
    };

    // Determine input files: CLI args override config
    let input = if !args.input.is_empty() {
        args.input.clone()
    } else if let Some(ref lc) = loaded_config {
        lc.resolve_inputs()
            .context("failed to resolve input files from config")?
    } else {
        Vec::new()
    };

    // Determine output directory: CLI > config > default
    let output = args.output.clone().unwrap_or_else(|| {
        loaded_config
            .as_ref()
            .map(|lc| lc.resolve_output_dir())
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let name = args.name.clone().unwrap_or_else(|| {
        loaded_config
            .as_ref()
            .map(|lc| lc.config.name.clone())
            .unwrap_or_else(|| "atlas".to_string())
    });

    // Atlas settings: CLI > config > default, field by field
    let mut atlas = loaded_config
        .as_ref()
        .map(|lc| lc.config.atlas.clone())
        .unwrap_or_default();
    if let Some(max_size) = args.max_size {
        atlas.max_atlas_size = max_size;
    }
    if let Some(min_size) = args.min_size {
        atlas.min_atlas_size = min_size;
    }
    if let Some(padding) = args.padding {
        atlas.padding = padding;
    }
    if let Some(size_mode) = args.size_mode {
        atlas.size_mode = size_mode;
    }
    if let Some(heuristic) = args.heuristic {
        atlas.heuristic = heuristic;
    }
    atlas
        .validate()
        .context("invalid atlas settings after applying command line options")?;

    Ok(MergedConfig {
        input,
        output,
        name,
        atlas,
        verbose: args.verbose,
    })
}
