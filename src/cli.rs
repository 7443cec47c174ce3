//! CLI argument parsing for condition validation campaigns.
use crate::policy::{HltMenu, WorkflowType};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Directory scanned for input templates when `prepare` gets no explicit file.
pub const DEFAULT_TEMPLATE_DIR: &str = "Validations";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "condval",
    version,
    about = "Conditions validation campaigns: driver configurations and request files",
    after_help = "Commands:\n  submit --gt <GT> --newgt <GT> --run <RUNS>  Compose drivers and a request file\n  prepare [--template <FILE>]                 Turn a validation template into metadata JSON\n\nExamples:\n  condval submit --type HLT+RECO --gt REF_GT --newgt NEW_GT --basegt PROMPT_GT --run 355769 --ds /ZeroBias/Run2022C-v1/RAW --jira 1234 --hlt SameAsRun --dry\n  condval prepare --template-dir Validations",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Submit(SubmitArgs),
    Prepare(PrepareArgs),
}

/// Submit command inputs for one validation campaign.
#[derive(Parser, Debug, Clone)]
#[command(about = "Compose driver commands and the request file for a campaign")]
pub struct SubmitArgs {
    /// Workflow type (HLT, PR, PR+ALCA, EXPR, RECO+HLT, HLT+RECO, EXPR+RECO, HLT+RECO+ALCA)
    #[arg(long = "type", value_name = "TYPE", default_value = "HLT")]
    pub kind: WorkflowType,

    /// Reference global tag
    #[arg(long, value_name = "GT")]
    pub gt: Option<String>,

    /// Global tag carrying the conditions under test
    #[arg(long, value_name = "GT")]
    pub newgt: Option<String>,

    /// Global tag shared by the downstream stages of chained workflows
    #[arg(long, value_name = "GT", default_value = "")]
    pub basegt: String,

    /// Comma-separated run numbers
    #[arg(long, value_name = "RUNS", conflicts_with = "run_ls")]
    pub run: Option<String>,

    /// Run to lumi-section ranges, e.g. "{'355769': [[1, 100]]}"
    #[arg(long, value_name = "MAPPING")]
    pub run_ls: Option<String>,

    /// Comma-separated input datasets
    #[arg(
        long,
        value_name = "DATASETS",
        default_value = "/MinimumBias/Run2012B-PromptReco-v1/RECO"
    )]
    pub ds: String,

    /// Ticket number used in campaign and request identifiers
    #[arg(long, value_name = "ID", default_value = "")]
    pub jira: String,

    /// Zero-tesla magnetic field reconstruction
    #[arg(long)]
    pub b0t: bool,

    /// Cosmics reconstruction
    #[arg(long)]
    pub cosmics: bool,

    /// Heavy-ion reconstruction (not supported)
    #[arg(long)]
    pub hion: bool,

    /// Proton-ion reconstruction
    #[arg(long)]
    pub pa: bool,

    /// HLT menu (SameAsRun, GRun, 50nsGRun, Custom, 25ns14e33_v3)
    #[arg(long, value_name = "MENU")]
    pub hlt: Option<HltMenu>,

    /// Menu to extract when --hlt is Custom
    #[arg(long, value_name = "MENU")]
    pub hlt_custom_menu: Option<String>,

    /// Processing string for output dataset names (default: current time)
    #[arg(long = "string", value_name = "STRING")]
    pub processing_string: Option<String>,

    /// Release area for the reconstruction stages when it differs from the HLT one
    #[arg(long, value_name = "DIR")]
    pub reco_cmssw_dir: Option<PathBuf>,

    /// Skip the replica-catalog availability check
    #[arg(long)]
    pub no_site_check: bool,

    /// Also request a workflow for the new conditions
    #[arg(long)]
    pub two_wfs: bool,

    /// Print and record commands without running them
    #[arg(long)]
    pub dry: bool,

    /// Submitter configuration JSON
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Command script path (default from config)
    #[arg(long, value_name = "PATH")]
    pub script: Option<PathBuf>,
}

/// Prepare command inputs for turning a template into metadata.
#[derive(Parser, Debug, Clone)]
#[command(about = "Read a validation template and write per-workflow metadata JSON")]
pub struct PrepareArgs {
    /// Template file (default: newest file under --template-dir)
    #[arg(long, value_name = "FILE", conflicts_with = "template_dir")]
    pub template: Option<PathBuf>,

    /// Directory holding templates
    #[arg(long, value_name = "DIR", default_value = DEFAULT_TEMPLATE_DIR)]
    pub template_dir: PathBuf,

    /// Output directory for metadata files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,
}
