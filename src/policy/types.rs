//! Closed vocabularies and records exchanged with the policy resolver.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Processing-stage combination requested for a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowType {
    #[serde(rename = "HLT")]
    Hlt,
    #[serde(rename = "PR")]
    Pr,
    #[serde(rename = "PR+ALCA")]
    PrAlca,
    #[serde(rename = "EXPR")]
    Expr,
    #[serde(rename = "RECO+HLT")]
    RecoHlt,
    #[serde(rename = "HLT+RECO")]
    HltReco,
    #[serde(rename = "EXPR+RECO")]
    ExprReco,
    #[serde(rename = "HLT+RECO+ALCA")]
    HltRecoAlca,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 8] = [
        WorkflowType::Hlt,
        WorkflowType::Pr,
        WorkflowType::PrAlca,
        WorkflowType::Expr,
        WorkflowType::RecoHlt,
        WorkflowType::HltReco,
        WorkflowType::ExprReco,
        WorkflowType::HltRecoAlca,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowType::Hlt => "HLT",
            WorkflowType::Pr => "PR",
            WorkflowType::PrAlca => "PR+ALCA",
            WorkflowType::Expr => "EXPR",
            WorkflowType::RecoHlt => "RECO+HLT",
            WorkflowType::HltReco => "HLT+RECO",
            WorkflowType::ExprReco => "EXPR+RECO",
            WorkflowType::HltRecoAlca => "HLT+RECO+ALCA",
        }
    }

    /// Types that only re-run the prompt/express reconstruction.
    pub fn is_prompt_family(self) -> bool {
        matches!(
            self,
            WorkflowType::Pr | WorkflowType::PrAlca | WorkflowType::Expr
        )
    }

    /// Types that chain a reconstruction+DQM stage after the HLT.
    pub fn has_reco_dqm_stage(self) -> bool {
        matches!(
            self,
            WorkflowType::HltReco | WorkflowType::HltRecoAlca | WorkflowType::ExprReco
        )
    }

    /// Types that run a second stage after the first one.
    pub fn is_combined(self) -> bool {
        self == WorkflowType::RecoHlt || self.has_reco_dqm_stage()
    }

    pub fn has_alca(self) -> bool {
        matches!(self, WorkflowType::PrAlca | WorkflowType::HltRecoAlca)
    }

    /// Everything but plain HLT relies on driver options missing before 8_0_1.
    pub fn requires_modern_driver(self) -> bool {
        self != WorkflowType::Hlt
    }

    /// Whether the run summary should mention the HLT menu and GTs.
    pub fn involves_hlt(self) -> bool {
        self.as_str().contains("HLT") || self == WorkflowType::ExprReco
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        WorkflowType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| {
                let known: Vec<&str> = WorkflowType::ALL.iter().map(|k| k.as_str()).collect();
                anyhow!(
                    "unsupported workflow type {value:?} (expected one of {})",
                    known.join(", ")
                )
            })
    }
}

/// HLT menu selection for the HLT stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HltMenu {
    SameAsRun,
    #[serde(rename = "GRun")]
    GRun,
    #[serde(rename = "50nsGRun")]
    GRun50ns,
    Custom,
    #[serde(rename = "25ns14e33_v3")]
    Ns25x14e33V3,
}

impl HltMenu {
    pub const ALL: [HltMenu; 5] = [
        HltMenu::SameAsRun,
        HltMenu::GRun,
        HltMenu::GRun50ns,
        HltMenu::Custom,
        HltMenu::Ns25x14e33V3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HltMenu::SameAsRun => "SameAsRun",
            HltMenu::GRun => "GRun",
            HltMenu::GRun50ns => "50nsGRun",
            HltMenu::Custom => "Custom",
            HltMenu::Ns25x14e33V3 => "25ns14e33_v3",
        }
    }

    /// Menus that have to be extracted into the release area first.
    pub fn needs_extraction(self) -> bool {
        matches!(self, HltMenu::SameAsRun | HltMenu::Custom)
    }
}

impl fmt::Display for HltMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HltMenu {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        HltMenu::ALL
            .into_iter()
            .find(|menu| menu.as_str() == value)
            .ok_or_else(|| anyhow!("unsupported HLT menu {value:?}"))
    }
}

/// The `requestType` vocabulary understood by the driver and request tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Hlt,
    Pr,
    Expr,
    Express,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::Hlt => "HLT",
            RequestType::Pr => "PR",
            RequestType::Expr => "EXPR",
            RequestType::Express => "EXPRESS",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the resolver needs to know about one validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSpec {
    pub kind: WorkflowType,
    pub release: String,
    pub datasets: Vec<String>,
    pub reco_release: Option<String>,
    pub zero_field: bool,
    pub cosmics: bool,
    pub heavy_ion: bool,
    pub proton_ion: bool,
    pub hlt_menu: Option<HltMenu>,
}

impl WorkflowSpec {
    /// A spec with every run condition off.
    pub fn new(kind: WorkflowType, release: impl Into<String>, datasets: Vec<String>) -> Self {
        Self {
            kind,
            release: release.into(),
            datasets,
            reco_release: None,
            zero_field: false,
            cosmics: false,
            heavy_ion: false,
            proton_ion: false,
            hlt_menu: None,
        }
    }

    /// Release used by the reconstruction stages.
    pub fn effective_reco_release(&self) -> &str {
        self.reco_release.as_deref().unwrap_or(&self.release)
    }
}

/// Driver parameters for one processing stage.
///
/// Empty strings mean "option not passed to the driver".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterRecord {
    pub request_type: RequestType,
    pub steps: String,
    pub process_name: String,
    pub data_tier: String,
    pub event_content: String,
    pub input_commands: String,
    pub era: String,
    pub custom_commands: String,
    pub custom_conditions: String,
    pub customise: String,
    pub mag_field: String,
    pub dump_python: bool,
    pub lumi_to_process: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<Box<ParameterRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reco_dqm: Option<Box<ParameterRecord>>,
}

impl ParameterRecord {
    /// A record of the given request type with every option unset.
    pub fn empty(request_type: RequestType) -> Self {
        Self {
            request_type,
            steps: String::new(),
            process_name: String::new(),
            data_tier: String::new(),
            event_content: String::new(),
            input_commands: String::new(),
            era: String::new(),
            custom_commands: String::new(),
            custom_conditions: String::new(),
            customise: String::new(),
            mag_field: String::new(),
            dump_python: false,
            lumi_to_process: String::new(),
            output: String::new(),
            base: None,
            reco_dqm: None,
        }
    }
}
