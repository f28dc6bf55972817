use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "Sprout CLI - Grow congeneric ligand series from a template inside a rigid receptor: R-group attachment, conformer generation, clash filtering, hybrid-energy refinement, and ranking.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach fragments to a template, then embed, filter, minimize, and rank the resulting congeners.
    Grow(GrowArgs),
    /// Inspect fragment libraries.
    Fragments(FragmentsArgs),
}

/// Arguments for the `grow` subcommand.
#[derive(Args, Debug)]
pub struct GrowArgs {
    // --- Core Arguments ---
    /// Template molecule (SDF/MOL with explicit hydrogens and 3D coordinates).
    /// Only the first record is used.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub template: PathBuf,

    /// Template hydrogens to replace, as 0-based atom indices (comma separated or repeated).
    #[arg(short, long = "attach", required = true, value_delimiter = ',', value_name = "INDEX")]
    pub attachments: Vec<usize>,

    /// Directory that receives one SDF per ranked pose and `summary.csv`.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Receptor structure (PDB). Without it, clash filtering and the
    /// intermolecular energy are skipped.
    #[arg(short, long, value_name = "PATH")]
    pub receptor: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Fragment Selection ---
    /// Fragment names to grow (comma separated or repeated). Defaults to the whole library.
    #[arg(short, long = "fragment", value_delimiter = ',', value_name = "NAME")]
    pub fragments: Vec<String>,

    /// Fragment library: an SDF file or a directory of SDF/MOL files.
    /// Defaults to the built-in library.
    #[arg(short = 'l', long, value_name = "PATH")]
    pub fragment_library: Option<PathBuf>,

    // --- Generation Overrides ---
    /// Override the number of conformers to generate per congener.
    #[arg(short, long, value_name = "INT")]
    pub num_conf: Option<usize>,

    /// Override the minimum heavy-atom RMSD between retained conformers (Å).
    #[arg(long = "rms", value_name = "FLOAT")]
    pub minimum_conf_rms: Option<f64>,

    /// Additional template atoms (0-based) allowed to move during embedding.
    #[arg(long, value_delimiter = ',', value_name = "INDEX")]
    pub flexible: Vec<usize>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Filtering and Optimization Overrides ---
    /// Override the ligand-receptor clash distance (Å).
    #[arg(long, value_name = "FLOAT")]
    pub clash_threshold: Option<f64>,

    /// Override the classical force field: a built-in name ('uff', 'dreiding') or a TOML path.
    #[arg(long, value_name = "NAME_OR_PATH")]
    pub ligand_force_field: Option<String>,

    /// Override `optimization.use-ani` from the config file.
    #[command(flatten)]
    pub ani: AniToggle,

    /// Override the learned potential model file.
    #[arg(long, value_name = "PATH")]
    pub ani_model: Option<PathBuf>,

    /// Override the energy window kept per congener (kcal/mol).
    #[arg(short = 'e', long, value_name = "FLOAT")]
    pub energy_range: Option<f64>,

    // --- Scoring ---
    /// Score the final poses with gnina, found on PATH unless `--gnina` is given.
    #[arg(long)]
    pub score: bool,

    /// Path to the gnina executable. Implies `--score`.
    #[arg(long, value_name = "PATH")]
    pub gnina: Option<PathBuf>,

    /// Stop after this many seconds, keeping whatever has finished.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S generation.num-conf=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive flags for the learned intramolecular potential.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct AniToggle {
    /// Use the learned potential for intramolecular energies.
    #[arg(long)]
    pub ani: bool,
    /// Use the classical force field for intramolecular energies.
    #[arg(long)]
    pub no_ani: bool,
}

/// Arguments for the `fragments` subcommand.
#[derive(Args, Debug)]
pub struct FragmentsArgs {
    #[command(subcommand)]
    pub command: FragmentsCommands,
}

#[derive(Subcommand, Debug)]
pub enum FragmentsCommands {
    /// List the fragments of a library with their attachment atoms.
    List {
        /// An SDF file or a directory of SDF/MOL files. Defaults to the built-in library.
        #[arg(short = 'l', long, value_name = "PATH")]
        library: Option<PathBuf>,
    },
}
