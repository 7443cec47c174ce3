//! Driver parameter resolution for a validation workflow.
//!
//! `resolve` is a pure function of the `WorkflowSpec`: it picks the base
//! table for the workflow type, runs it through the stage's overlay chain,
//! attaches the downstream stage for chained types and finally checks that
//! the reconstruction release is new enough.
mod era;
mod overlay;
mod release;
mod types;

pub use era::era_for;
pub use overlay::LUMI_RANGES_FILE;
pub use release::{ensure_supported, release_from_path, Release};
pub use types::{HltMenu, ParameterRecord, RequestType, WorkflowSpec, WorkflowType};

use crate::error::PolicyError;
use overlay::{
    apply_chain, hlt_base, prompt_base, raw_reco_base, reco_dqm_base, HLT_STAGE_OVERLAYS,
    PROMPT_OVERLAYS, RECO_DQM_OVERLAYS,
};

/// Resolve the driver parameters for every stage of `spec`.
pub fn resolve(spec: &WorkflowSpec) -> Result<ParameterRecord, PolicyError> {
    let reco_era = era_for(spec.effective_reco_release(), &spec.datasets);

    let record = if spec.kind.is_prompt_family() {
        apply_chain("prompt", prompt_base(reco_era), PROMPT_OVERLAYS, spec)?
    } else {
        let hlt_era = era_for(&spec.release, &spec.datasets);
        let hlt = apply_chain("hlt", hlt_base(hlt_era), HLT_STAGE_OVERLAYS, spec)?;
        match spec.kind {
            WorkflowType::RecoHlt => ParameterRecord {
                base: Some(Box::new(raw_reco_base())),
                ..hlt
            },
            kind if kind.has_reco_dqm_stage() => {
                let reco_dqm =
                    apply_chain("recodqm", reco_dqm_base(reco_era), RECO_DQM_OVERLAYS, spec)?;
                ParameterRecord {
                    reco_dqm: Some(Box::new(reco_dqm)),
                    ..hlt
                }
            }
            _ => hlt,
        }
    };

    if spec.kind.requires_modern_driver() {
        ensure_supported(spec.effective_reco_release())?;
    }
    Ok(record)
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
