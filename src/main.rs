//! Gaze estimation node replaying recorded depth/RGB frames.

use anyhow::{Context, Result};
use clap::Parser;
use gaze_estimation::{
    app::{GazeNode, LogPublisher, ReplaySource},
    config::Config,
    segmentation::FixedRegions,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory with depth_NNNN.png and optional rgb_NNNN.png frames
    #[arg(short, long)]
    input: PathBuf,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Write feature vectors to this file (overrides the configuration)
    #[arg(short, long)]
    features: Option<PathBuf>,

    /// Stop after this many published frames
    #[arg(short = 'n', long)]
    max_frames: Option<usize>,

    /// Enable optical-flow tracking of region boxes
    #[arg(long)]
    track: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", gaze_estimation::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    info!("Gaze Estimation");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(path) = args.features {
        config.features.path = Some(path);
    }
    if args.track {
        config.tracking.enabled = true;
    }

    let regions = config.segmentation.fixed_regions();
    info!("Using {} fixed regions", regions.len());

    let source = ReplaySource::open(&args.input)
        .with_context(|| format!("Failed to open replay directory {}", args.input.display()))?;

    let mut node = GazeNode::new(config, Box::new(FixedRegions::new(regions)), LogPublisher)?;
    let stats = node.run(&source, args.max_frames)?;

    info!(
        "Processed {} depth frames and {} RGB frames",
        stats.depth_frames, stats.rgb_frames
    );

    Ok(())
}
