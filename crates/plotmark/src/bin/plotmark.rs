//! plotmark CLI: decode plot identifiers, normalize plot photographs, sort
//! photo collections, print markers and calibrate cameras.

use clap::{Args, Parser, Subcommand};
use plotmark::{BoardDims, MarkerPrintParams, PlotConfig};
use std::path::{Path, PathBuf};

#[cfg(not(feature = "tracing"))]
use plotmark::core::init_with_verbosity;
#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "plotmark")]
#[command(about = "Decode color-coded plot markers and normalize plot photographs")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the plot identifier of the configured image.
    Id {
        /// JSON job config.
        config: PathBuf,
    },

    /// Normalize the configured image and write its JSON report.
    Normalize {
        /// JSON job config.
        config: PathBuf,

        /// Output image; overrides `output_path` of the config.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Estimate a camera model from chessboard photographs.
    Calibrate(CalibrateArgs),

    /// Draw the printable marker of a plot identifier.
    Marker(MarkerArgs),

    /// Move or normalize every image of a directory into per-identifier folders.
    Sort(SortArgs),

    /// Print the version.
    Version,
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    /// Inner corners along one board side.
    #[arg(long)]
    size1: u32,

    /// Inner corners along the other board side.
    #[arg(long)]
    size2: u32,

    /// Where to write the camera model (JSON).
    #[arg(long, default_value = "camera.json")]
    output: PathBuf,

    /// Images or directories of images.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct MarkerArgs {
    /// Inner corners along one board side.
    #[arg(long)]
    size1: u32,

    /// Inner corners along the other board side.
    #[arg(long)]
    size2: u32,

    /// Plot identifier to encode.
    #[arg(long)]
    id: u64,

    /// Cell side in pixels.
    #[arg(long, default_value_t = 36)]
    cell_px: u32,

    /// Output image; never overwritten.
    #[arg(long, default_value = "marker.png")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct SortArgs {
    /// Directory scanned recursively.
    from: PathBuf,

    /// Directory receiving one folder per identifier.
    to: PathBuf,

    /// JSON job config; `image_path` is ignored.
    #[arg(long)]
    config: PathBuf,

    /// Write normalized images instead of moving the originals.
    #[arg(long)]
    normalize: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    #[cfg(not(feature = "tracing"))]
    {
        let _ = init_with_verbosity(verbose);
    }
    #[cfg(feature = "tracing")]
    {
        let _ = LogTracer::init();
        plotmark::core::init_tracing(false, plotmark::core::level_for_verbosity(verbose));
    }
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Id { config } => {
            let config = PlotConfig::load_json(config)?;
            let id = plotmark::compute_id(&config)?;
            println!("{} {}", id.value(), id.dir_name());
        }
        Commands::Normalize { config, output } => {
            let mut config = PlotConfig::load_json(config)?;
            if let Some(output) = output {
                config.output_path = Some(output.display().to_string());
            }
            let report = plotmark::normalize(&config)?;
            println!(
                "{} -> {} (id {})",
                report.source.as_deref().unwrap_or("-"),
                config.output_path().display(),
                report.id.dir_name
            );
        }
        Commands::Calibrate(args) => run_calibrate(args)?,
        Commands::Marker(args) => run_marker(args)?,
        Commands::Sort(args) => run_sort(args)?,
        Commands::Version => println!("plotmark {}", env!("CARGO_PKG_VERSION")),
    }
    Ok(())
}

fn run_calibrate(args: CalibrateArgs) -> CliResult<()> {
    let dims = BoardDims::new(args.size1, args.size2)?;
    let mut images = Vec::new();
    for input in &args.inputs {
        expand_input(input, &mut images)?;
    }
    let camera = plotmark::calibrate(&images, dims)?;
    camera.write_json(&args.output)?;
    println!(
        "calibrated from {} image(s), wrote {}",
        images.len(),
        args.output.display()
    );
    Ok(())
}

fn run_marker(args: MarkerArgs) -> CliResult<()> {
    let dims = BoardDims::new(args.size1, args.size2)?;
    let params = MarkerPrintParams {
        cell_px: args.cell_px,
        ..MarkerPrintParams::default()
    };
    let marker = plotmark::render_marker(dims, args.id, &params)?;
    plotmark::save_new_image(&marker, &args.output)?;
    println!(
        "marker {} ({} data squares) written to {}",
        args.id,
        plotmark::data_square_count(dims),
        args.output.display()
    );
    Ok(())
}

fn expand_input(input: &Path, images: &mut Vec<PathBuf>) -> CliResult<()> {
    if input.is_dir() {
        images.extend(plotmark::collect_files(input)?);
    } else {
        images.push(input.to_path_buf());
    }
    Ok(())
}

fn run_sort(args: SortArgs) -> CliResult<()> {
    let config = PlotConfig::load_json(&args.config)?;
    let summary = if args.normalize {
        plotmark::process_dir(&args.from, &args.to, &config)?
    } else {
        plotmark::classify_dir(&args.from, &args.to, &config)?
    };
    println!(
        "{} image(s) sorted, {} skipped",
        summary.done.len(),
        summary.failed.len()
    );
    Ok(())
}
