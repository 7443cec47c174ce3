//! `cmsDriver.py` invocations for every stage and condition.
use super::{runtime_prefix, CampaignPlan};
use crate::conditions::{ConditionLabel, ConditionPair};
use crate::config::SubmitterConfig;
use crate::policy::ParameterRecord;
use crate::sink::{CommandSink, Echo};
use anyhow::Result;
use std::fmt::Display;

const INPUT_FILE_LIST: &str = "filelist:step1_files.txt";
const POST_ERA_CUSTOMISE: &str = "Configuration/DataProcessing/RecoTLR.customisePostEra_Run3";

/// Word-by-word builder for one driver invocation.
#[derive(Debug, Clone)]
struct DriverCommand {
    words: Vec<String>,
}

impl DriverCommand {
    fn new(label: &str) -> Self {
        Self {
            words: vec!["cmsDriver.py".to_string(), label.to_string()],
        }
    }

    fn opt(mut self, name: &str, value: impl Display) -> Self {
        self.words.push(format!("{name} {value}"));
        self
    }

    /// Like `opt`, skipped when `value` is empty.
    fn opt_nonempty(self, name: &str, value: &str) -> Self {
        if value.is_empty() {
            return self;
        }
        self.opt(name, value)
    }

    /// `name=value`, the form a few driver options are documented with.
    fn assign(mut self, name: &str, value: impl Display) -> Self {
        self.words.push(format!("{name}={value}"));
        self
    }

    fn flag(mut self, name: &str) -> Self {
        self.words.push(name.to_string());
        self
    }

    fn flag_if(self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.flag(name)
        } else {
            self
        }
    }

    /// Common head shared by every processing stage.
    fn stage(label: &str, record: &ParameterRecord, scenario: &str) -> Self {
        Self::new(label)
            .opt("-s", &record.steps)
            .opt("--processName", &record.process_name)
            .flag("--data")
            .opt("--scenario", scenario)
            .opt("--datatier", &record.data_tier)
    }

    fn finish(self, events: u32) -> Self {
        self.flag("--no_exec").opt("-n", events)
    }

    fn render(&self) -> String {
        self.words.join(" ")
    }
}

fn quoted(value: &str) -> String {
    shell_words::quote(value).into_owned()
}

/// Driver for the first stage of `pair`.
pub(crate) fn main_stage(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    pair: &ConditionPair,
) -> String {
    let record = &plan.record;
    DriverCommand::stage(record.request_type.as_str(), record, plan.scenario())
        .opt("--conditions", &pair.global_tag)
        .opt("--python_filename", pair.label.config_name())
        .opt("--filein", quoted(INPUT_FILE_LIST))
        .opt("--fileout", quoted("file:step2.root"))
        .finish(config.events)
        .opt_nonempty("--eventcontent", &record.event_content)
        .opt_nonempty("--output", &quoted_nonempty(&record.output))
        .flag_if("--dump_python", record.dump_python)
        .opt_nonempty("--customise", &record.customise)
        .opt_nonempty("--era", &record.era)
        .opt_nonempty("--magField", &record.mag_field)
        .opt_nonempty(
            "--lumiToProcess",
            if plan.runs.is_lumi_filtered() {
                record.lumi_to_process.as_str()
            } else {
                ""
            },
        )
        .opt_nonempty("--inputCommands", &quoted_nonempty(&record.input_commands))
        .opt_nonempty(
            "--custom_conditions",
            &quoted_nonempty(&record.custom_conditions),
        )
        .opt_nonempty(
            "--customise_commands",
            &quoted_nonempty(&record.custom_commands),
        )
        .opt("--customise", POST_ERA_CUSTOMISE)
        .render()
}

fn quoted_nonempty(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        quoted(value)
    }
}

/// Driver for the RAW-RECO stage of `RECO+HLT`.
pub(crate) fn base_stage(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    base: &ParameterRecord,
) -> String {
    DriverCommand::stage(plan.record.request_type.as_str(), base, plan.scenario())
        .opt("--eventcontent", &base.event_content)
        .opt("--conditions", &plan.base_gt)
        .opt("--python_filename", "reco.py")
        .finish(config.events)
        .render()
}

/// Driver for the reconstruction+DQM stage following the HLT.
pub(crate) fn reco_dqm_stage(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    reco: &ParameterRecord,
    label: &str,
) -> String {
    DriverCommand::stage(plan.record.request_type.as_str(), reco, plan.scenario())
        .opt("--eventcontent", &reco.event_content)
        .opt("--conditions", &plan.base_gt)
        .opt("--hltProcess", "HLT2")
        .assign("--filein", "file:step2.root")
        .assign("--fileout", "file:step3.root")
        .opt("--python_filename", format!("recodqm_{label}.py"))
        .finish(config.events)
        .opt_nonempty("--customise", &reco.customise)
        .opt_nonempty("--era", &reco.era)
        .flag_if("--dump_python", reco.dump_python)
        .opt_nonempty("--magField", &reco.mag_field)
        .opt_nonempty(
            "--customise_commands",
            &quoted_nonempty(&reco.custom_commands),
        )
        .opt("--customise", POST_ERA_CUSTOMISE)
        .render()
}

/// DQM harvesting of the last stage's DQM output.
pub(crate) fn harvesting(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    global_tag: &str,
    era: &str,
    label: &str,
    filein: &str,
    with_fileout: bool,
) -> String {
    let mut command = DriverCommand::new("step4")
        .opt("-s", "HARVESTING:dqmHarvesting")
        .flag("--data")
        .opt("--scenario", plan.scenario())
        .opt("--filetype", "DQM")
        .opt("--conditions", global_tag)
        .assign("--filein", format!("file:{filein}"));
    if with_fileout {
        command = command.assign("--fileout", "file:step4.root");
    }
    command
        .assign("--python_filename", format!("step4_{label}_HARVESTING.py"))
        .finish(config.events)
        .opt_nonempty("--era", era)
        .render()
}

/// DQM file produced by the stage feeding the harvesting step.
fn harvest_input(plan: &CampaignPlan, chained: bool) -> String {
    if plan.spec.kind.has_alca() {
        format!(
            "{}_RAW2DIGI_L1Reco_RECO_ALCA_DQM_inDQM.root",
            plan.record.request_type
        )
    } else if chained {
        "step3_inDQM.root".to_string()
    } else {
        "step2_inDQM.root".to_string()
    }
}

/// Send every driver command of the campaign to `sink`, reference first.
pub fn compose_drivers(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    sink: &mut CommandSink,
) -> Result<()> {
    for pair in &plan.pairs {
        sink.note(&format!(
            "\n##### Steps for {} conditions!!",
            pair.label.banner()
        ))?;
        tracing::info!(config = pair.label.config_name(), "creating driver configuration");

        let driver = main_stage(plan, config, pair);
        match (&plan.hlt_cmssw_dir, pair.label, &plan.reco_cmssw_dir) {
            (Some(hlt_dir), ConditionLabel::New, Some(_)) => {
                sink.run(&format!("{}; {driver}", runtime_prefix(hlt_dir)), Echo::Loud)?
            }
            _ => sink.run(&driver, Echo::Loud)?,
        }

        if let Some(base) = &plan.record.base {
            sink.run(&base_stage(plan, config, base), Echo::Loud)?;
        }

        let label = pair.label.short();
        match &plan.record.reco_dqm {
            Some(reco) => {
                run_in_reco_area(plan, sink, &reco_dqm_stage(plan, config, reco, label))?;
                let harvest = harvesting(
                    plan,
                    config,
                    &plan.base_gt,
                    &reco.era,
                    label,
                    &harvest_input(plan, true),
                    true,
                );
                run_in_reco_area(plan, sink, &harvest)?;
            }
            None => {
                let harvest = harvesting(
                    plan,
                    config,
                    &pair.global_tag,
                    &plan.record.era,
                    label,
                    &harvest_input(plan, false),
                    false,
                );
                sink.run(&harvest, Echo::Loud)?;
            }
        }
    }
    Ok(())
}

fn run_in_reco_area(plan: &CampaignPlan, sink: &mut CommandSink, command: &str) -> Result<()> {
    match &plan.reco_cmssw_dir {
        Some(dir) => sink.run(&format!("{}; {command}", runtime_prefix(dir)), Echo::Loud),
        None => sink.run(command, Echo::Loud),
    }
}
