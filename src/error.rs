//! Error categories that callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context attached at the
//! I/O edges. Every category here is terminal for the campaign.
use std::process::ExitStatus;
use thiserror::Error;

/// Raised while resolving driver parameters for a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{feature} validations are not implemented")]
    NotImplemented { feature: &'static str },

    #[error("release {release} is not supported (requires CMSSW_8_0_1 or newer)")]
    UnsupportedRelease { release: String },

    #[error("release {release:?} is not of the form CMSSW_<major>_<minor>_<patch>")]
    MalformedRelease { release: String },
}

/// Raised before any work begins when the invocation is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("missing mandatory option {0}")]
    MissingOption(&'static str),

    #[error("environment variable {0} is not set; set up the release area first")]
    MissingEnv(&'static str),

    #[error("stray marker file {0} exists in the working directory; remove it first")]
    StrayMarker(String),

    #[error("{0} does not contain a slash-separated path to a CMSSW release")]
    NotAReleasePath(String),

    #[error("HLTrigger/Configuration is missing under {0}; cannot create the HLT configuration")]
    MissingHltPackage(String),
}

/// Raised when a requested run has no replica block in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    #[error("no suitable blocks for run {run} in {dataset}")]
    Unavailable { dataset: String, run: u64 },
}

/// Raised when an external command cannot be run or exits non-zero.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("required tool {tool} is not on PATH")]
    Missing { tool: String },

    #[error("command failed with status {status}: {command}")]
    Failed { command: String, status: ExitStatus },
}
