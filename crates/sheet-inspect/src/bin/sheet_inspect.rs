//! sheet-inspect CLI: camera calibration and single-image inspection.

use clap::{Args, Parser, Subcommand};
use sheet_inspect::calib::{CalibrationEngine, CharucoBoard, CharucoBoardSpec, MarkerCharucoDetector};
use sheet_inspect::core::LogFilter;
use sheet_inspect::features::{ExternalCandidate, FeatureDetector};
use sheet_inspect::markers::{MarkerDetectParams, MarkerResolver};
use sheet_inspect::matching::Specification;
use sheet_inspect::{frames, InspectionConfig, Inspector};
use std::fs;
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "sheet-inspect")]
#[command(about = "Measure sheet-metal parts against a specification from calibrated camera images")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Per-crate levels, e.g. `info,sheet_inspect_features=trace`; overrides -v.
    #[arg(long, global = true, value_name = "FILTER")]
    log: Option<LogFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the camera intrinsics from ChArUco board captures.
    Calibrate(CalibrateArgs),

    /// Inspect one image and print the JSON report.
    Inspect(InspectArgs),

    /// Run only the geometric detectors and print their raw output.
    Detect {
        /// Detector settings (JSON); defaults when omitted.
        #[arg(long)]
        params: Option<PathBuf>,

        image: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// Board specification (JSON); the default 5 × 7 board when omitted.
    #[arg(long)]
    board: Option<PathBuf>,

    /// Where the solved calibration is written.
    #[arg(long)]
    calibration: PathBuf,

    /// Directory of marker code tables overriding the built-in ones.
    #[arg(long)]
    dictionary_dir: Option<PathBuf>,

    /// Board captures, in any supported image format.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct InspectArgs {
    /// Expected features and acceptance limits (JSON).
    #[arg(long)]
    specification: PathBuf,

    /// Camera calibration (JSON); the fallback scale is used when absent.
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Camera-to-sheet distance in millimeters.
    #[arg(long)]
    distance_mm: Option<f64>,

    /// Inspection settings (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// External detector output: a JSON array of `{type, pixelGeometry, confidence}`.
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    image: PathBuf,
}

fn init_logging(verbose: u8, filter: Option<LogFilter>) {
    #[cfg(feature = "tracing")]
    {
        let _ = (verbose, filter);
        let _ = tracing_log::LogTracer::init();
        sheet_inspect::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let filter = filter.unwrap_or_else(|| {
            LogFilter::new(match verbose {
                0 => log::LevelFilter::Info,
                1 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            })
        });
        // A logger installed earlier keeps its configuration.
        let _ = sheet_inspect::core::init_with_filter(filter);
    }
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log);

    match cli.command {
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Detect { params, image } => run_detect(params.as_deref(), &image),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> CliResult<T> {
    let raw = fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("cannot read {what} {}: {e}", path.display()).into() })?;
    serde_json::from_str(&raw)
        .map_err(|e| -> CliError { format!("invalid {what} {}: {e}", path.display()).into() })
}

fn run_calibrate(args: &CalibrateArgs) -> CliResult<()> {
    let spec: CharucoBoardSpec = match &args.board {
        Some(path) => read_json(path, "board")?,
        None => CharucoBoardSpec::default(),
    };
    let board = CharucoBoard::new(spec)?;

    let params = MarkerDetectParams {
        dictionary: spec.dictionary,
        dictionary_dir: args.dictionary_dir.clone(),
        ..MarkerDetectParams::default()
    };
    let detector = MarkerCharucoDetector::new(board.clone(), MarkerResolver::new(params));
    let mut engine = CalibrationEngine::new(board, detector, &args.calibration);

    let accepted = frames::add_calibration_files(&mut engine, &args.images)?;
    log::info!("{accepted} of {} images show the board", args.images.len());

    let rms = engine
        .run_calibration()
        .map_err(|e| -> CliError { format!("calibration failed ({}): {e}", e.code()).into() })?;
    println!("rms reprojection error: {rms:.4} px");
    println!("calibration written to {}", args.calibration.display());
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> CliResult<()> {
    let specification = Specification::from_json_file(&args.specification).map_err(|e| -> CliError {
        format!("cannot load specification {}: {e}", args.specification.display()).into()
    })?;
    let mut config = match &args.config {
        Some(path) => InspectionConfig::from_json_file(path)?,
        None => InspectionConfig::default(),
    };
    if args.distance_mm.is_some() {
        config.distance_mm = args.distance_mm;
    }
    let calibration = match &args.calibration {
        Some(path) => Some(sheet_inspect::calib::io::load_calibration_file(path)?),
        None => None,
    };
    let candidates: Vec<ExternalCandidate> = match &args.candidates {
        Some(path) => read_json(path, "candidates")?,
        None => Vec::new(),
    };

    let inspector = Inspector::new(specification, config).with_calibration(calibration);
    let img = frames::load_rgb(&args.image)?;
    let report = inspector.inspect_with_candidates(&frames::rgb_view(&img), &candidates);

    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_detect(params: Option<&Path>, image: &Path) -> CliResult<()> {
    let params = match params {
        Some(path) => read_json(path, "detector params")?,
        None => Default::default(),
    };
    let img = frames::load_rgb(image)?;
    let report = FeatureDetector::new(params).detect_report(&frames::rgb_view(&img));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
