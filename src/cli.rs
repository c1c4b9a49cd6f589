use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "transparency-checkr",
    about = "Infer AI provider jurisdictions and score documentation transparency",
    version
)]
pub struct Cli {
    /// JSON file of fetched pages: [{ model_name, provider, pages: [...] }]
    pub input: PathBuf,

    /// Config file [default: ./.transparency-checkr/config.toml, fallback ~/.config/transparency-checkr/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Records of an earlier run; new results only fill their gaps
    #[arg(long = "gap-fill", value_name = "RECORDS")]
    pub gap_fill: Option<PathBuf>,

    /// Write the JSON records to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show per-section scores and region candidates for every model
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
