//! Photo matte CLI tool
//!
//! `composite` blends one matte over one photo; `replay` drives a scripted capture through
//! the full tracker, compositor and directory store pipeline.

use super::config::CliConfigBuilder;
use super::replay::{CaptureScript, ReplayReport};
use crate::{
    capture::{CaptureCoordinator, DirectoryAssetStore, LoggingCaptureHooks},
    compositor::MatteCompositor,
    config::{OutputFormat, ResampleFilter, TrackerConfig},
    services::AssetIOService,
    tracing_config::TracingConfig,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Still-photo capture tracking and matte compositing
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "photo-matte")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Composite a matte over a photo against a flat reference background
    Composite(CompositeArgs),
    /// Replay a scripted capture into a directory asset store
    Replay(ReplayArgs),
}

#[derive(Args)]
pub struct CompositeArgs {
    /// Primary photo
    #[arg(long, value_name = "IMAGE")]
    pub image: PathBuf,

    /// Matte image (converted to single-channel luma)
    #[arg(long, value_name = "MATTE")]
    pub matte: PathBuf,

    /// Matte category: "portrait" or a segmentation class (hair, skin, teeth, glasses, sky)
    #[arg(long, default_value = "portrait")]
    pub matte_type: String,

    /// EXIF orientation of the photo (1-8)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub orientation: Option<u8>,

    /// Reference background color (#RRGGBB, #RRGGBBAA or #RGB)
    #[arg(long, default_value = "#ffffff")]
    pub reference_color: String,

    /// Scale each matte axis by its own ratio instead of the width ratio on both
    #[arg(long)]
    pub per_axis_scale: bool,

    /// Matte resampling filter
    #[arg(long, value_enum, default_value_t = CliResampleFilter::Triangle)]
    pub filter: CliResampleFilter,

    /// Output container
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Do not write composite metadata into the container
    #[arg(long)]
    pub no_metadata: bool,

    /// Output file
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON capture script
    #[arg(long, value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Asset store directory [default: <pictures>/photo-matte]
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Deny asset store authorization
    #[arg(long)]
    pub deny_authorization: bool,

    /// Composite on the calling task instead of the blocking pool
    #[arg(long)]
    pub inline: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Webp => OutputFormat::WebP,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<CliResampleFilter> for ResampleFilter {
    fn from(filter: CliResampleFilter) -> Self {
        match filter {
            CliResampleFilter::Nearest => ResampleFilter::Nearest,
            CliResampleFilter::Triangle => ResampleFilter::Triangle,
            CliResampleFilter::CatmullRom => ResampleFilter::CatmullRom,
            CliResampleFilter::Lanczos3 => ResampleFilter::Lanczos3,
        }
    }
}

/// Main entry point for CLI application
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
        .context("Failed to initialize tracing")?;

    match &cli.command {
        Command::Composite(args) => run_composite(args),
        Command::Replay(args) => run_replay(args).await,
    }
}

fn run_composite(args: &CompositeArgs) -> Result<()> {
    let config = CliConfigBuilder::compositor_config(args)?;
    let matte_type = CliConfigBuilder::matte_type(&args.matte_type);

    let photo_bytes = AssetIOService::read_bytes(&args.image)
        .with_context(|| format!("Failed to read photo {}", args.image.display()))?;
    let (photo, profile) = AssetIOService::decode_with_profile(&photo_bytes)
        .with_context(|| format!("Failed to decode photo {}", args.image.display()))?;
    let matte = AssetIOService::load_matte(&args.matte)
        .with_context(|| format!("Failed to load matte {}", args.matte.display()))?;

    debug!(
        photo = %format!("{}x{}", photo.width(), photo.height()),
        matte = %format!("{}x{}", matte.pixels.width(), matte.pixels.height()),
        profile = ?profile.as_ref().map(|p| p.color_space),
        "Inputs loaded"
    );

    let compositor = MatteCompositor::new(config)?;
    let result = compositor
        .composite(&photo, profile.as_ref(), &matte, &matte_type, args.orientation)
        .context("Compositing failed")?;

    AssetIOService::write_bytes(&args.output, &result.bytes)?;
    info!(
        output = %args.output.display(),
        kind = result.kind.metadata_value(),
        width = result.dimensions.0,
        height = result.dimensions.1,
        "✅ Composite written"
    );
    Ok(())
}

async fn run_replay(args: &ReplayArgs) -> Result<()> {
    let script = CaptureScript::load(&args.script)?;
    let store_root = args
        .store
        .clone()
        .or_else(|| dirs::picture_dir().map(|dir| dir.join("photo-matte")))
        .unwrap_or_else(|| PathBuf::from("photo-matte-library"));

    let store = Arc::new(DirectoryAssetStore::new(&store_root));
    store.set_authorized(!args.deny_authorization);

    let config = TrackerConfig {
        composite_execution: CliConfigBuilder::composite_execution(args.inline),
        ..script.tracker_config()
    };
    let coordinator = CaptureCoordinator::new(config, Arc::new(LoggingCaptureHooks), store)?;

    let report: ReplayReport = script.replay(&coordinator).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(store = %store_root.display(), finished = report.summary.is_some(), "Replay done");
    Ok(())
}
