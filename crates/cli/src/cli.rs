use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vigil_core::{DetectorKind, FusionStrategy, Priority};

/// Ensemble anomaly detection over JSON payloads.
///
/// Reads a payload (or a full detection request) from a JSON file and
/// prints the result as JSON on stdout. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Ensemble anomaly detection over JSON payloads")]
pub struct CliArgs {
    /// Configuration preset (default: VIGIL_PRESET or "standard").
    /// When given, other VIGIL_* overrides are ignored.
    #[arg(long, global = true)]
    pub preset: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run detection on a payload or request file
    Detect(DetectArgs),

    /// Classify a payload and show its statistics and recommended methods
    Profile {
        /// JSON file holding the payload, or `-` for stdin
        #[arg(long, short)]
        input: PathBuf,
    },

    /// List the built-in presets
    Presets,
}

#[derive(clap::Args, Debug)]
pub struct DetectArgs {
    /// JSON file holding the payload or a detection request, or `-` for stdin
    #[arg(long, short)]
    pub input: PathBuf,

    /// Fusion strategy: voting, weighted, stacking or adaptive
    #[arg(long)]
    pub strategy: Option<FusionStrategy>,

    /// Request priority: low, medium, high or critical
    #[arg(long)]
    pub priority: Option<Priority>,

    /// Run exactly these methods (repeatable)
    #[arg(long = "method", short = 'm')]
    pub methods: Vec<DetectorKind>,

    /// Score threshold override in [0, 1]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Sliding-window size override for sequence analysis
    #[arg(long)]
    pub window: Option<usize>,

    /// Processing time budget in seconds
    #[arg(long, env = "VIGIL_TIMEOUT_SECS")]
    pub timeout_secs: Option<f64>,

    /// Reference payload to train the multivariate model on before detecting
    #[arg(long)]
    pub train: Option<PathBuf>,
}
