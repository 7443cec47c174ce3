//! Rendering a resolved campaign into driver commands and a request file.
//!
//! Composers only build strings; everything that is run goes through the
//! campaign's `CommandSink`.
mod driver;
mod ini;
mod request;
mod setup;

pub use driver::compose_drivers;
pub use request::submit_request;
pub use setup::{extract_hlt_menu, hlt_menu_path, list_input_files, record_release_setup};

use crate::conditions::ConditionPair;
use crate::policy::{ParameterRecord, WorkflowSpec};
use crate::runs::RunSelection;
use std::path::PathBuf;

/// Everything the composers need about one campaign, fixed up front.
#[derive(Debug, Clone)]
pub struct CampaignPlan {
    pub spec: WorkflowSpec,
    pub record: ParameterRecord,
    pub pairs: [ConditionPair; 2],
    pub runs: RunSelection,
    /// Global tag shared by the downstream stages of chained workflows.
    pub base_gt: String,
    pub jira: String,
    /// Suffix for output dataset names.
    pub processing_string: String,
    /// `YYYY_MM_DD_HH_MM` stamp for campaign and request identifiers.
    pub stamp: String,
    /// Release area used for the HLT stage (`CMSSW_BASE`).
    pub hlt_cmssw_dir: Option<PathBuf>,
    /// Separate release area for the reconstruction stages.
    pub reco_cmssw_dir: Option<PathBuf>,
    pub hlt_custom_menu: Option<String>,
    pub two_wfs: bool,
    pub user: String,
}

impl CampaignPlan {
    /// `--scenario` value passed to every driver invocation.
    pub fn scenario(&self) -> &'static str {
        if self.spec.cosmics {
            "cosmics"
        } else {
            "pp"
        }
    }

    pub fn campaign_id(&self) -> String {
        format!("{}__ALCA_{}-{}", self.spec.release, self.jira, self.stamp)
    }
}

/// Shell prefix that loads the runtime of the release area at `dir`.
pub(crate) fn runtime_prefix(dir: &std::path::Path) -> String {
    format!("cd {}; eval `scramv1 runtime -sh`; cd -", dir.display())
}
