//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "ccda2omop",
    version,
    about = "Convert C-CDA clinical documents to OMOP CDM 5.3 CSV files",
    long_about = "Convert C-CDA XML documents to OMOP CDM 5.3 CSV files.\n\n\
                  Clinical sections are mapped by declarative YAML rules against\n\
                  an OMOP vocabulary loaded from CONCEPT / CONCEPT_RELATIONSHIP\n\
                  exports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert C-CDA XML files to OMOP CSV tables.
    Convert(ConvertArgs),

    /// Look up a code against the loaded vocabulary.
    VocabCheck(VocabCheckArgs),
}

#[derive(Parser)]
pub struct ConvertArgs {
    /// C-CDA XML file, or a directory of XML files.
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input: PathBuf,

    /// Directory for OMOP CSV output files.
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// YAML rules file or directory of rule files.
    #[arg(long = "rules", value_name = "PATH", default_value = "rules")]
    pub rules: PathBuf,

    /// OMOP CONCEPT.csv vocabulary export.
    #[arg(long = "concept", value_name = "PATH")]
    pub concept_file: Option<PathBuf>,

    /// OMOP CONCEPT_RELATIONSHIP.csv export.
    #[arg(long = "relationship", value_name = "PATH")]
    pub relationship_file: Option<PathBuf>,

    /// Directory of supplementary CONCEPT-shaped CSV files.
    #[arg(long = "vocab-dir", value_name = "DIR")]
    pub vocab_dir: Option<PathBuf>,

    /// Generate a conversion coverage report.
    #[arg(long = "report")]
    pub report: bool,

    /// Report output path (stdout when omitted; .json extension selects JSON).
    #[arg(long = "report-output", value_name = "PATH")]
    pub report_output: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

#[derive(Parser)]
pub struct VocabCheckArgs {
    /// OMOP CONCEPT.csv vocabulary export.
    #[arg(long = "concept", value_name = "PATH")]
    pub concept_file: PathBuf,

    /// OMOP CONCEPT_RELATIONSHIP.csv export.
    #[arg(long = "relationship", value_name = "PATH")]
    pub relationship_file: Option<PathBuf>,

    /// Directory of supplementary CONCEPT-shaped CSV files.
    #[arg(long = "vocab-dir", value_name = "DIR")]
    pub vocab_dir: Option<PathBuf>,

    /// Code system: a vocabulary id, code-system OID, or alias.
    #[arg(value_name = "SYSTEM")]
    pub system: String,

    /// The source code to resolve.
    #[arg(value_name = "CODE")]
    pub code: String,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
