//! The workload-management request file and its test submission.
use super::ini::{IniDocument, IniSection};
use super::CampaignPlan;
use crate::conditions::{short_global_tag, ConditionLabel, ConditionPair};
use crate::config::SubmitterConfig;
use crate::sink::{CommandSink, Echo};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Short global tags as they appear in the request file.
struct TagNames {
    /// Tag of the first task: the base tag for chained workflows.
    target: String,
    reference: String,
    new: String,
}

impl TagNames {
    fn for_plan(plan: &CampaignPlan) -> Self {
        let [reference, new] = &plan.pairs;
        let chained = plan.record.base.is_some() || plan.record.reco_dqm.is_some();
        Self {
            target: if chained {
                short_global_tag(&plan.base_gt)
            } else {
                new.short_tag()
            },
            reference: reference.short_tag(),
            new: new.short_tag(),
        }
    }

    fn for_pair(&self, pair: &ConditionPair) -> &str {
        match pair.label {
            ConditionLabel::Reference => &self.reference,
            ConditionLabel::New => &self.new,
        }
    }
}

/// `/ZeroBias/Run2021B-v1/RAW` -> `ZeroBias_Run2021B_v1_RAW`.
fn dataset_name(dataset: &str) -> String {
    dataset
        .strip_prefix('/')
        .unwrap_or(dataset)
        .replace(['/', '-'], "_")
}

fn request_id(plan: &CampaignPlan, dataset: &str, label: &str) -> String {
    format!(
        "{}_{}_{}{label}",
        plan.campaign_id(),
        dataset_name(dataset),
        plan.record.request_type
    )
}

fn defaults(plan: &CampaignPlan, config: &SubmitterConfig, tags: &TagNames) -> IniSection {
    let mut section = IniSection::new("DEFAULT");
    section
        .set("group", &config.group)
        .set("user", &plan.user)
        .set("request_type", "TaskChain")
        .set("priority", config.priority)
        .set("release", &plan.spec.release)
        .set(
            "globaltag",
            if plan.record.reco_dqm.is_some() {
                &tags.new
            } else {
                &tags.target
            },
        )
        .set("campaign", plan.campaign_id())
        .set("acquisition_era", &plan.spec.release);
    if let Some(mapping) = plan.runs.lumi_mapping_text() {
        section.set("lumi_list", mapping);
    }
    section
        .set("multicore", config.multicore)
        .set("enableharvesting", "True")
        .set("dqmuploadurl", &config.dqm_upload_url)
        .set("subreq_type", "RelVal");
    section
}

/// Keys shared by every per-dataset request section.
///
/// `string_label` goes into the processing string only.
fn dataset_section(
    plan: &CampaignPlan,
    pair: &ConditionPair,
    dataset: &str,
    section_label: &str,
    string_label: &str,
    global_tag: &str,
    time_event: u32,
) -> IniSection {
    let reqtype = plan.record.request_type;
    let label = pair.label.short();
    let mut section = IniSection::new(format!("{reqtype}_{section_label}_{}", dataset_name(dataset)));
    section
        .set("input_name", dataset)
        .set("request_id", request_id(plan, dataset, label))
        .set("time_event", time_event)
        .set("size_memory", 8000)
        .set("step1_lumisperjob", 1)
        .set(
            "processing_string",
            format!("{}_{reqtype}{string_label}_{global_tag}", plan.processing_string),
        )
        .set("cfg_path", pair.label.config_name())
        .set(
            "req_name",
            format!("{reqtype}_{section_label}_RelVal_{}", plan.runs.first_run()),
        )
        .set("globaltag", global_tag);
    section
}

fn harvest_cfg(label: &str) -> String {
    format!("step4_{label}_HARVESTING.py")
}

/// Build the request file for `plan`.
pub fn build_request(plan: &CampaignPlan, config: &SubmitterConfig) -> IniDocument {
    let tags = TagNames::for_plan(plan);
    let reqtype = plan.record.request_type;
    let mut doc = IniDocument::default();
    doc.push(defaults(plan, config, &tags));

    if plan.record.base.is_some() {
        let mut section = IniSection::new("HLT_validation");
        section
            .set("cfg_path", "reco.py")
            .set("req_name", format!("{reqtype}_RelVal_{}", plan.runs.first_run()));
        for (task, pair) in (2..).zip(&plan.pairs) {
            section
                .set(format!("step{task}_output"), "RAWRECOoutput")
                .set(format!("step{task}_cfg"), pair.label.config_name())
                .set(format!("step{task}_globaltag"), tags.for_pair(pair))
                .set(format!("step{task}_input"), "Task1");
        }
        doc.push(section);
    } else if plan.record.reco_dqm.is_some() {
        let output = if plan.spec.cosmics {
            "FEVTDEBUGoutput"
        } else {
            "FEVTDEBUGHLToutput"
        };
        for pair in &plan.pairs {
            let label = pair.label.short();
            let global_tag = tags.for_pair(pair);
            for dataset in &plan.spec.datasets {
                let mut section = dataset_section(plan, pair, dataset, label, label, global_tag, 1);
                section
                    .set("keep_step2", "True")
                    .set("step2_output", output)
                    .set("step2_cfg", format!("recodqm_{label}.py"))
                    .set("step2_lumisperjob", 1)
                    .set("step2_globaltag", &tags.target)
                    .set(
                        "step2_processstring",
                        format!("{}_{reqtype}{label}_{global_tag}", plan.processing_string),
                    )
                    .set("step2_input", "Task1")
                    .set("step2_timeevent", 10);
                if let Some(reco_release) = &plan.spec.reco_release {
                    section.set("step2_release", reco_release);
                }
                section.set("harvest_cfg", harvest_cfg(label));
                doc.push(section);
            }
        }
    } else {
        let [reference, new] = &plan.pairs;
        for dataset in &plan.spec.datasets {
            let mut section = dataset_section(
                plan,
                reference,
                dataset,
                "reference",
                "ref",
                &tags.reference,
                10,
            );
            section
                .set("keep_step1", "True")
                .set("harvest_cfg", harvest_cfg(reference.label.short()));
            doc.push(section);
        }
        if plan.two_wfs {
            let label = new.label.short();
            for dataset in &plan.spec.datasets {
                let mut section = dataset_section(plan, new, dataset, label, label, &tags.target, 10);
                section
                    .set("keep_step1", "True")
                    .set("harvest_cfg", harvest_cfg(label));
                doc.push(section);
            }
        }
    }
    doc
}

/// `<reqtype>ConditionValidation_<release>_<gt>_<runs>.conf`
pub fn request_file_name(plan: &CampaignPlan) -> String {
    format!(
        "{}ConditionValidation_{}_{}_{}.conf",
        plan.record.request_type,
        plan.spec.release,
        TagNames::for_plan(plan).target,
        plan.runs.label()
    )
}

/// Write the request file into `dir` and send the test submission to `sink`.
pub fn submit_request(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    sink: &mut CommandSink,
    dir: &Path,
) -> Result<PathBuf> {
    let name = request_file_name(plan);
    let path = dir.join(&name);
    let doc = build_request(plan, config);
    fs::write(&path, doc.to_string()).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        sections = doc.sections.len(),
        "request file written"
    );

    sink.run(&format!("./wmcontrol.py --test --req_file {name}"), Echo::Loud)?;
    println!("Now execute:\n./wmcontrol.py --req_file {name}  |& tee wmcontrol.1.log");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::plan;
    use super::*;
    use crate::policy::WorkflowType;
    use crate::runs::RunSelection;
    use crate::sink::ExecMode;
    use std::collections::BTreeMap;

    const DATASET_SECTION: &str = "ZeroBias_Run2021B_v1_RAW";

    #[test]
    fn dataset_names_flatten_slashes_and_dashes() {
        assert_eq!(dataset_name("/ZeroBias/Run2021B-v1/RAW"), DATASET_SECTION);
    }

    #[test]
    fn prompt_request_has_reference_section_only() {
        let plan = plan(WorkflowType::Pr);
        let doc = build_request(&plan, &SubmitterConfig::default());
        assert_eq!(doc.sections.len(), 2);

        let defaults = doc.section("DEFAULT").unwrap();
        assert_eq!(defaults.get("globaltag"), Some("NEW_GT_v2"));
        assert_eq!(
            defaults.get("campaign"),
            Some("CMSSW_12_4_0__ALCA_1234-2024_05_01_10_30")
        );
        assert!(defaults.get("lumi_list").is_none());

        let section = doc
            .section(&format!("PR_reference_{DATASET_SECTION}"))
            .unwrap();
        assert_eq!(section.get("input_name"), Some("/ZeroBias/Run2021B-v1/RAW"));
        assert_eq!(
            section.get("request_id"),
            Some("CMSSW_12_4_0__ALCA_1234-2024_05_01_10_30_ZeroBias_Run2021B_v1_RAW_PRrefer")
        );
        assert_eq!(
            section.get("processing_string"),
            Some("2024_05_01_10_30_PRref_REF_GT_v1")
        );
        assert_eq!(section.get("cfg_path"), Some("REFERENCE.py"));
        assert_eq!(section.get("req_name"), Some("PR_reference_RelVal_346512"));
        assert_eq!(section.get("harvest_cfg"), Some("step4_refer_HARVESTING.py"));
    }

    #[test]
    fn two_workflows_add_new_condition_sections() {
        let mut plan = plan(WorkflowType::Pr);
        plan.two_wfs = true;
        let doc = build_request(&plan, &SubmitterConfig::default());
        let section = doc.section(&format!("PR_newco_{DATASET_SECTION}")).unwrap();
        assert_eq!(section.get("cfg_path"), Some("NEWCONDITIONS0.py"));
        assert_eq!(section.get("globaltag"), Some("NEW_GT_v2"));
        assert_eq!(section.get("req_name"), Some("PR_newco_RelVal_346512"));
        assert_eq!(
            section.get("processing_string"),
            Some("2024_05_01_10_30_PRnewco_NEW_GT_v2")
        );
    }

    #[test]
    fn reco_dqm_request_chains_second_task() {
        let plan = plan(WorkflowType::HltReco);
        let doc = build_request(&plan, &SubmitterConfig::default());
        assert_eq!(doc.sections.len(), 3);
        assert_eq!(
            doc.section("DEFAULT").unwrap().get("globaltag"),
            Some("NEW_GT_v2")
        );
        let section = doc.section(&format!("HLT_refer_{DATASET_SECTION}")).unwrap();
        assert_eq!(section.get("globaltag"), Some("REF_GT_v1"));
        assert_eq!(section.get("step2_globaltag"), Some("BASE_GT_v3"));
        assert_eq!(section.get("step2_cfg"), Some("recodqm_refer.py"));
        assert_eq!(section.get("step2_output"), Some("FEVTDEBUGHLToutput"));
        assert_eq!(section.get("step2_release"), Some("CMSSW_12_4_0"));
        assert_eq!(section.get("time_event"), Some("1"));
        assert!(doc.section(&format!("HLT_newco_{DATASET_SECTION}")).is_some());
    }

    #[test]
    fn cosmics_reco_dqm_keeps_plain_event_content() {
        let mut plan = plan(WorkflowType::HltReco);
        plan.spec.cosmics = true;
        let doc = build_request(&plan, &SubmitterConfig::default());
        for label in ["refer", "newco"] {
            let section = doc
                .section(&format!("HLT_{label}_{DATASET_SECTION}"))
                .unwrap();
            assert_eq!(section.get("step2_output"), Some("FEVTDEBUGoutput"));
            assert_eq!(
                section.get("processing_string"),
                Some(if label == "refer" {
                    "2024_05_01_10_30_HLTrefer_REF_GT_v1"
                } else {
                    "2024_05_01_10_30_HLTnewco_NEW_GT_v2"
                })
            );
        }
    }

    #[test]
    fn base_request_lists_both_conditions_as_tasks() {
        let plan = plan(WorkflowType::RecoHlt);
        let doc = build_request(&plan, &SubmitterConfig::default());
        assert_eq!(
            doc.section("DEFAULT").unwrap().get("globaltag"),
            Some("BASE_GT_v3")
        );
        let section = doc.section("HLT_validation").unwrap();
        assert_eq!(section.get("cfg_path"), Some("reco.py"));
        assert_eq!(section.get("step2_cfg"), Some("REFERENCE.py"));
        assert_eq!(section.get("step2_globaltag"), Some("REF_GT_v1"));
        assert_eq!(section.get("step3_cfg"), Some("NEWCONDITIONS0.py"));
        assert_eq!(section.get("step3_globaltag"), Some("NEW_GT_v2"));
        assert_eq!(
            request_file_name(&plan),
            "HLTConditionValidation_CMSSW_12_4_0_BASE_GT_v3_346512.conf"
        );
    }

    #[test]
    fn lumi_selection_goes_to_defaults() {
        let mut plan = plan(WorkflowType::Expr);
        plan.runs = RunSelection::RunLumis(BTreeMap::from([(355769, vec![[1, 100]])]));
        let doc = build_request(&plan, &SubmitterConfig::default());
        assert_eq!(
            doc.section("DEFAULT").unwrap().get("lumi_list"),
            Some("{\"355769\": [[1, 100]]}")
        );
    }

    #[test]
    fn submission_writes_file_and_skips_recording_in_dry_mode() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(WorkflowType::Pr);
        let mut sink =
            CommandSink::create(&dir.path().join("cmsDrivers.sh"), ExecMode::Dry, "/bin/sh -c")
                .unwrap();
        let path = submit_request(&plan, &SubmitterConfig::default(), &mut sink, dir.path()).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("PRConditionValidation_CMSSW_12_4_0_NEW_GT_v2_346512.conf")
        );
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("[DEFAULT]\ngroup = ppd\nuser = alice\nrequest_type = TaskChain\n"));
        assert_eq!(sink.recorded(), 0);
    }
}
