//! Base parameter tables and the ordered overlays applied on top of them.
//!
//! Each overlay is a pure function from one record to the next. The chains
//! at the bottom fix the precedence: later entries win.
use super::era::{PROTON_ION_RUN2_ERA, PROTON_ION_RUN3_ERA};
use super::types::{ParameterRecord, RequestType, WorkflowSpec, WorkflowType};
use crate::error::PolicyError;

/// File holding the run->lumi ranges produced while listing input files.
pub const LUMI_RANGES_FILE: &str = "step1_lumi_ranges.txt";

const HLT_INPUT_COMMANDS: &str =
    "keep *,drop *_hlt*_*_HLT,drop *_TriggerResults_*_HLT,drop *_*_*_RECO";
const HLT_CUSTOM_COMMANDS: &str = "process.load('Configuration.StandardSequences.Reconstruction_cff'); \
     process.hltTrackRefitterForSiStripMonitorTrack.src = 'generalTracks'; ";
const HLT_CUSTOM_CONDITIONS: &str = "JetCorrectorParametersCollection_CSA14_V4_MC_AK4PF,\
     JetCorrectionsRecord,frontier://FrontierProd/CMS_CONDITIONS,AK4PF";

const PROMPT_STEPS: &str = "RAW2DIGI,L1Reco,RECO,EI,PAT,DQM";
const RECO_DQM_STEPS: &str = "RAW2DIGI,L1Reco,RECO,EI,PAT,DQM:DQMOffline+offlineValidationHLTSource";
const COSMICS_RECO_STEPS: &str = "RAW2DIGI,L1Reco,RECO,DQM";
const ALCA_RECO_STEPS: &str = "RAW2DIGI,L1Reco,RECO,ALCA:SiStripCalMinBias,DQM";

const CUSTOMISE_PROMPT: &str = "Configuration/DataProcessing/RecoTLR.customisePrompt";
const CUSTOMISE_EXPRESS: &str = "Configuration/DataProcessing/RecoTLR.customiseExpress";
const CUSTOMISE_COSMIC_DATA: &str = "Configuration/DataProcessing/RecoTLR.customiseCosmicData";

pub type OverlayFn = fn(ParameterRecord, &WorkflowSpec) -> Result<ParameterRecord, PolicyError>;

/// A named step in an overlay chain.
pub struct Overlay {
    pub name: &'static str,
    pub apply: OverlayFn,
}

pub const HLT_STAGE_OVERLAYS: &[Overlay] = &[
    Overlay {
        name: "magnetic-field",
        apply: magnetic_field,
    },
    Overlay {
        name: "cosmics",
        apply: cosmics_hlt_content,
    },
    Overlay {
        name: "proton-ion",
        apply: proton_ion_run3,
    },
    Overlay {
        name: "heavy-ion",
        apply: reject_heavy_ion,
    },
    Overlay {
        name: "hlt-menu",
        apply: hlt_menu,
    },
    Overlay {
        name: "combined-stage",
        apply: combined_hlt_stage,
    },
];

pub const PROMPT_OVERLAYS: &[Overlay] = &[
    Overlay {
        name: "magnetic-field",
        apply: magnetic_field,
    },
    Overlay {
        name: "cosmics",
        apply: cosmics_reconstruction,
    },
    Overlay {
        name: "proton-ion",
        apply: proton_ion_run2,
    },
    Overlay {
        name: "heavy-ion",
        apply: reject_heavy_ion,
    },
    Overlay {
        name: "alca",
        apply: alca_steps,
    },
    Overlay {
        name: "express",
        apply: express_request_type,
    },
];

pub const RECO_DQM_OVERLAYS: &[Overlay] = &[
    Overlay {
        name: "magnetic-field",
        apply: magnetic_field,
    },
    Overlay {
        name: "cosmics",
        apply: cosmics_reconstruction,
    },
    Overlay {
        name: "proton-ion",
        apply: proton_ion_run3,
    },
    Overlay {
        name: "heavy-ion",
        apply: reject_heavy_ion,
    },
    Overlay {
        name: "alca",
        apply: alca_steps,
    },
];

/// Run `record` through `chain` in order.
pub fn apply_chain(
    stage: &'static str,
    record: ParameterRecord,
    chain: &[Overlay],
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    chain.iter().try_fold(record, |record, overlay| {
        tracing::debug!(stage, overlay = overlay.name, "apply overlay");
        (overlay.apply)(record, spec)
    })
}

pub fn hlt_base(era: &str) -> ParameterRecord {
    ParameterRecord {
        steps: "L1REPACK:Full,HLT,DQM".to_string(),
        process_name: "HLT2".to_string(),
        data_tier: "FEVTDEBUGHLT,DQM".to_string(),
        event_content: "FEVTDEBUGHLT,DQM".to_string(),
        input_commands: HLT_INPUT_COMMANDS.to_string(),
        era: era.to_string(),
        custom_commands: HLT_CUSTOM_COMMANDS.to_string(),
        custom_conditions: HLT_CUSTOM_CONDITIONS.to_string(),
        ..ParameterRecord::empty(RequestType::Hlt)
    }
}

pub fn prompt_base(era: &str) -> ParameterRecord {
    ParameterRecord {
        steps: PROMPT_STEPS.to_string(),
        process_name: "reRECO".to_string(),
        data_tier: "RECO,DQMIO".to_string(),
        event_content: "RECO,DQM".to_string(),
        era: era.to_string(),
        lumi_to_process: LUMI_RANGES_FILE.to_string(),
        ..ParameterRecord::empty(RequestType::Pr)
    }
}

pub fn reco_dqm_base(era: &str) -> ParameterRecord {
    ParameterRecord {
        steps: RECO_DQM_STEPS.to_string(),
        process_name: "reRECO".to_string(),
        data_tier: "RECO,DQMIO".to_string(),
        event_content: "RECO,DQM".to_string(),
        era: era.to_string(),
        ..ParameterRecord::empty(RequestType::Pr)
    }
}

/// Second stage of `RECO+HLT`: re-reconstruct the HLT output into RAW-RECO.
pub fn raw_reco_base() -> ParameterRecord {
    ParameterRecord {
        steps: "RAW2DIGI,L1Reco,RECO".to_string(),
        process_name: "reRECO".to_string(),
        data_tier: "RAW-RECO".to_string(),
        event_content: "RAWRECO".to_string(),
        ..ParameterRecord::empty(RequestType::Pr)
    }
}

pub fn magnetic_field(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if !spec.zero_field {
        return Ok(record);
    }
    Ok(ParameterRecord {
        mag_field: "0T".to_string(),
        ..record
    })
}

pub fn cosmics_hlt_content(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if !spec.cosmics {
        return Ok(record);
    }
    Ok(ParameterRecord {
        data_tier: "FEVTDEBUG,DQM".to_string(),
        event_content: "FEVTDEBUG,DQM".to_string(),
        ..record
    })
}

pub fn cosmics_reconstruction(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if !spec.cosmics {
        return Ok(record);
    }
    let customise = match spec.kind {
        WorkflowType::Pr => format!("{CUSTOMISE_PROMPT},{CUSTOMISE_COSMIC_DATA}"),
        WorkflowType::Expr | WorkflowType::ExprReco => {
            format!("{CUSTOMISE_EXPRESS},{CUSTOMISE_COSMIC_DATA}")
        }
        _ => record.customise.clone(),
    };
    Ok(ParameterRecord {
        steps: COSMICS_RECO_STEPS.to_string(),
        customise,
        ..record
    })
}

pub fn proton_ion_run3(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    with_proton_ion_era(record, spec, PROTON_ION_RUN3_ERA)
}

pub fn proton_ion_run2(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    with_proton_ion_era(record, spec, PROTON_ION_RUN2_ERA)
}

fn with_proton_ion_era(
    record: ParameterRecord,
    spec: &WorkflowSpec,
    era: &str,
) -> Result<ParameterRecord, PolicyError> {
    if !spec.proton_ion {
        return Ok(record);
    }
    Ok(ParameterRecord {
        era: era.to_string(),
        ..record
    })
}

/// No heavy-ion era or conditions mapping exists, so every type refuses it.
pub fn reject_heavy_ion(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if spec.heavy_ion {
        return Err(PolicyError::NotImplemented {
            feature: "heavy-ion",
        });
    }
    Ok(record)
}

pub fn hlt_menu(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    let Some(menu) = spec.hlt_menu else {
        return Ok(record);
    };
    Ok(ParameterRecord {
        steps: format!("L1REPACK,HLT:{menu},DQM"),
        dump_python: false,
        ..record
    })
}

/// The HLT stage of a chained workflow only produces RAW for the next stage.
pub fn combined_hlt_stage(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if !spec.kind.has_reco_dqm_stage() {
        return Ok(record);
    }
    let record = match spec.hlt_menu {
        Some(menu) => ParameterRecord {
            steps: format!("L1REPACK,HLT:{menu}"),
            custom_commands: String::new(),
            custom_conditions: String::new(),
            output: String::new(),
            dump_python: false,
            lumi_to_process: LUMI_RANGES_FILE.to_string(),
            ..record
        },
        None => ParameterRecord {
            steps: "L1REPACK,HLT".to_string(),
            custom_commands: String::new(),
            custom_conditions: String::new(),
            mag_field: String::new(),
            ..record
        },
    };
    if spec.kind == WorkflowType::ExprReco {
        return Ok(ParameterRecord {
            request_type: RequestType::Express,
            ..record
        });
    }
    Ok(record)
}

pub fn alca_steps(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if !spec.kind.has_alca() {
        return Ok(record);
    }
    Ok(ParameterRecord {
        steps: ALCA_RECO_STEPS.to_string(),
        ..record
    })
}

pub fn express_request_type(
    record: ParameterRecord,
    spec: &WorkflowSpec,
) -> Result<ParameterRecord, PolicyError> {
    if spec.kind != WorkflowType::Expr {
        return Ok(record);
    }
    Ok(ParameterRecord {
        request_type: RequestType::Expr,
        ..record
    })
}
