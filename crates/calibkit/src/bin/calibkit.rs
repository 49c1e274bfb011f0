//! `calibkit` command-line tool: board generation and result file handling.

use calibkit::calib::{load_result, save_result, CalibError, CalibrationResult};
use calibkit::print::{
    BoardConfig, BoardError, BoardIoError, BoardSpec, CalibrationBoard, ExportError,
    MarkerRenderer,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("board config: {0}")]
    BoardConfig(#[from] BoardIoError),
    #[error(transparent)]
    Calib(#[from] CalibError),
    #[error("--kind is required unless --config is given")]
    MissingKind,
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "calibkit")]
#[command(about = "Generate printable calibration boards and manage calibration results")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON log lines (with the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a board onto a page and write it as PDF or an image.
    Generate(GenerateArgs),

    /// Convert a calibration result between .npz, .json and .txt.
    Convert {
        input: PathBuf,
        output: PathBuf,
    },

    /// Print a summary of a calibration result file.
    Show { result: PathBuf },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Checkerboard,
    CircleGrid,
    AsymmetricCircleGrid,
    ArucoGrid,
    Charuco,
}

#[derive(Debug, Clone, Args)]
struct GenerateArgs {
    /// Board config JSON. Replaces the board flags below.
    #[arg(long, conflicts_with = "kind")]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Cells along x.
    #[arg(long, default_value_t = 8)]
    squares_x: u32,

    /// Cells along y.
    #[arg(long, default_value_t = 6)]
    squares_y: u32,

    /// Cell edge length in millimetres.
    #[arg(long, default_value_t = 25.0)]
    square_mm: f64,

    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Paper format: A4, A3, A5, Letter or Legal.
    #[arg(long, default_value = "A4")]
    paper: String,

    /// Marker dictionary for ArUco and ChArUco boards.
    #[arg(long, default_value = "5x5_250")]
    dictionary: String,

    /// ArUco grid: marker side as a fraction of the cell.
    #[arg(long, default_value_t = 0.75)]
    marker_ratio: f64,

    /// ChArUco: marker side in millimetres (default: 0.75 * square_mm).
    #[arg(long)]
    marker_mm: Option<f64>,

    /// Output file; `.pdf` or an image extension. Defaults to `<kind>_<paper>.pdf`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the board config used to this JSON file.
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl GenerateArgs {
    fn to_config(&self) -> CliResult<BoardConfig> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::load_json(path)?,
            None => BoardConfig::new(self.board_from_flags()?),
        };
        if let Some(output) = &self.output {
            config.output_path = Some(output.display().to_string());
        }
        Ok(config)
    }

    fn board_from_flags(&self) -> CliResult<CalibrationBoard> {
        let kind = self.kind.ok_or(CliError::MissingKind)?;
        let spec = BoardSpec::with_paper_name(
            self.squares_x,
            self.squares_y,
            self.square_mm,
            self.dpi,
            &self.paper,
        )?;
        let board = match kind {
            KindArg::Checkerboard => CalibrationBoard::checkerboard(spec),
            KindArg::CircleGrid => CalibrationBoard::circle_grid(spec, false),
            KindArg::AsymmetricCircleGrid => CalibrationBoard::circle_grid(spec, true),
            KindArg::ArucoGrid => {
                CalibrationBoard::aruco_grid(spec, &self.dictionary, self.marker_ratio)?
            }
            KindArg::Charuco => {
                let marker_mm = self.marker_mm.unwrap_or(0.75 * self.square_mm);
                CalibrationBoard::charuco(spec, &self.dictionary, marker_mm)?
            }
        };
        Ok(board)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: u8, json: bool) {
    let _ = LogTracer::init();
    calibkit::core::init_tracing(json);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8, _json: bool) {
    let _ = calibkit::core::init_with_level(calibkit::core::level_from_verbosity(verbose));
}

fn run(command: Commands) -> CliResult<()> {
    match command {
        Commands::Generate(args) => generate(&args),
        Commands::Convert { input, output } => convert(&input, &output),
        Commands::Show { result } => show(&result),
    }
}

fn generate(args: &GenerateArgs) -> CliResult<()> {
    let config = args.to_config()?;
    if let Some(path) = &args.save_config {
        config.write_json(path)?;
        log::info!("wrote board config to {}", path.display());
    }
    let output = config.output_path();
    #[cfg(feature = "opencv")]
    let backend = calibkit_opencv::OpenCvBackend::default();
    #[cfg(feature = "opencv")]
    let renderer: Option<&dyn MarkerRenderer> = Some(&backend);
    #[cfg(not(feature = "opencv"))]
    let renderer: Option<&dyn MarkerRenderer> = None;
    if renderer.is_none() && config.board.kind().needs_marker_renderer() {
        log::warn!(
            "{} boards need a marker renderer (build with the `opencv` feature)",
            config.board.kind().name()
        );
    }
    let canvas = config.board.generate_to_file(&output, renderer)?;
    println!(
        "wrote {} board ({}x{} px, {} at {} dpi) to {}",
        config.board.kind().name(),
        canvas.width(),
        canvas.height(),
        config.board.spec().paper(),
        config.board.spec().dpi(),
        output.display()
    );
    Ok(())
}

fn convert(input: &Path, output: &Path) -> CliResult<()> {
    let result = load_result(input)?;
    save_result(&result, output)?;
    println!("converted {} -> {}", input.display(), output.display());
    Ok(())
}

fn show(path: &Path) -> CliResult<()> {
    let result = load_result(path)?;
    print!("{}", summary(&result));
    Ok(())
}

fn summary(result: &CalibrationResult) -> String {
    let k = &result.camera_matrix;
    let distortion: Vec<String> = result.distortion.iter().map(|d| format!("{d:.6}")).collect();
    let mut out = String::new();
    out.push_str(&format!("rms:        {:.4} px\n", result.rms));
    if let Some(size) = result.image_size {
        out.push_str(&format!("image size: {size}\n"));
    }
    out.push_str(&format!("fx, fy:     {:.4}, {:.4}\n", k[(0, 0)], k[(1, 1)]));
    out.push_str(&format!("cx, cy:     {:.4}, {:.4}\n", k[(0, 2)], k[(1, 2)]));
    out.push_str(&format!("distortion: [{}]\n", distortion.join(", ")));
    out.push_str(&format!("views:      {}\n", result.rvecs.len()));
    if !result.extras.is_empty() {
        let keys: Vec<&str> = result.extras.keys().map(String::as_str).collect();
        out.push_str(&format!("extras:     {}\n", keys.join(", ")));
    }
    out
}
