//! The `submit` flow: preconditions, availability, resolution, composition.
use crate::catalog::{check_availability, DbsCatalog, ReplicaCatalog};
use crate::cli::SubmitArgs;
use crate::compose::{
    compose_drivers, extract_hlt_menu, hlt_menu_path, list_input_files, record_release_setup,
    submit_request, CampaignPlan,
};
use crate::conditions::condition_pairs;
use crate::config::{load_config, Environment, SubmitterConfig};
use crate::error::PreconditionError;
use crate::policy::{release_from_path, resolve, HltMenu, WorkflowSpec, WorkflowType};
use crate::runs::RunSelection;
use crate::sink::{require_tools, CommandSink, ExecMode};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const MARKER_SUFFIX: &str = ".couchID";
const STAMP_FORMAT: &str = "%Y_%m_%d_%H_%M";

/// Files produced by one campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignOutput {
    pub script: PathBuf,
    pub request: PathBuf,
}

/// Entry point for `condval submit`.
pub fn run_submit(args: &SubmitArgs) -> Result<CampaignOutput> {
    let workdir = std::env::current_dir().context("resolve working directory")?;
    ensure_no_marker(&workdir)?;
    let env = Environment::from_process()?;
    let config = load_config(args.config.as_deref())?;
    let catalog = DbsCatalog::new(config.dbs_url.clone());
    run_campaign(args, &env, &config, &catalog, &workdir, chrono::Local::now())
}

/// Refuse to run next to a previous submission's marker file.
pub fn ensure_no_marker(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(MARKER_SUFFIX) {
            return Err(PreconditionError::StrayMarker(name).into());
        }
    }
    Ok(())
}

fn required<'a>(
    value: &'a Option<String>,
    flag: &'static str,
) -> Result<&'a str, PreconditionError> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or(PreconditionError::MissingOption(flag))
}

fn run_selection(args: &SubmitArgs) -> Result<RunSelection> {
    match (&args.run, &args.run_ls) {
        (Some(runs), _) => RunSelection::parse_runs(runs),
        (None, Some(mapping)) => RunSelection::parse_run_lumis(mapping),
        (None, None) => Err(PreconditionError::MissingOption("--run").into()),
    }
}

/// Release used by the reconstruction stages, from the explicit area or `CMSSW_BASE`.
fn reco_release(args: &SubmitArgs, env: &Environment) -> Result<Option<String>> {
    let dir = args.reco_cmssw_dir.as_deref().or(env.release_base.as_deref());
    dir.map(release_from_path)
        .transpose()
        .map_err(Into::into)
}

/// Build the campaign plan without touching the filesystem or network.
pub fn plan_campaign<Tz: TimeZone>(
    args: &SubmitArgs,
    env: &Environment,
    now: &DateTime<Tz>,
) -> Result<CampaignPlan>
where
    Tz::Offset: std::fmt::Display,
{
    let newgt = required(&args.newgt, "--newgt")?;
    let gt = required(&args.gt, "--gt")?;
    let runs = run_selection(args)?;

    let datasets: Vec<String> = args
        .ds
        .split(',')
        .map(str::trim)
        .filter(|ds| !ds.is_empty())
        .map(str::to_string)
        .collect();
    if datasets.is_empty() {
        return Err(PreconditionError::MissingOption("--ds").into());
    }
    if let Some(menu) = args.hlt.filter(|menu| menu.needs_extraction()) {
        if menu == HltMenu::Custom && args.hlt_custom_menu.is_none() {
            return Err(PreconditionError::MissingOption("--hlt-custom-menu").into());
        }
        if env.release_base.is_none() {
            return Err(PreconditionError::MissingEnv("CMSSW_BASE").into());
        }
    }

    let spec = WorkflowSpec {
        reco_release: reco_release(args, env)?,
        zero_field: args.b0t,
        cosmics: args.cosmics,
        heavy_ion: args.hion,
        proton_ion: args.pa,
        hlt_menu: args.hlt,
        ..WorkflowSpec::new(args.kind, env.release.clone(), datasets)
    };
    let record = resolve(&spec)?;
    let pairs = condition_pairs(gt, newgt)?;

    let stamp = now.format(STAMP_FORMAT).to_string();
    tracing::info!(
        kind = %spec.kind,
        release = %spec.release,
        reco_release = spec.effective_reco_release(),
        runs = %runs.label(),
        "campaign resolved"
    );
    Ok(CampaignPlan {
        record,
        pairs,
        runs,
        base_gt: args.basegt.clone(),
        jira: args.jira.clone(),
        processing_string: args
            .processing_string
            .clone()
            .unwrap_or_else(|| stamp.clone()),
        stamp,
        hlt_cmssw_dir: env.release_base.clone(),
        reco_cmssw_dir: args.reco_cmssw_dir.clone(),
        hlt_custom_menu: args.hlt_custom_menu.clone(),
        two_wfs: args.two_wfs,
        user: env.user.clone(),
        spec,
    })
}

/// External tools the executed commands rely on.
fn tools_for(plan: &CampaignPlan) -> Vec<&'static str> {
    let mut tools = vec!["cmsDriver.py", "dasgoclient"];
    if plan.runs.is_lumi_filtered() {
        tools.push("das-selected-lumis.py");
    }
    if plan.spec.hlt_menu.is_some_and(HltMenu::needs_extraction) {
        tools.push("hltGetConfiguration");
    }
    tools
}

/// Run a whole campaign in `workdir`.
pub fn run_campaign<Tz: TimeZone>(
    args: &SubmitArgs,
    env: &Environment,
    config: &SubmitterConfig,
    catalog: &dyn ReplicaCatalog,
    workdir: &Path,
    now: DateTime<Tz>,
) -> Result<CampaignOutput>
where
    Tz::Offset: std::fmt::Display,
{
    let plan = plan_campaign(args, env, &now)?;

    if args.no_site_check || plan.runs.is_lumi_filtered() {
        tracing::info!("skipping availability check");
    } else {
        let available = check_availability(catalog, &plan.spec.datasets, &plan.runs.runs())?;
        tracing::info!(
            datasets = available.len(),
            blocks = available.values().map(BTreeSet::len).sum::<usize>(),
            "all runs available"
        );
    }

    let mode = if args.dry {
        ExecMode::Dry
    } else {
        ExecMode::Execute
    };
    if mode == ExecMode::Execute {
        require_tools(&tools_for(&plan))?;
    }
    let script = args
        .script
        .clone()
        .unwrap_or_else(|| workdir.join(&config.script_name));
    let mut sink = CommandSink::create(&script, mode, &config.shell)?;

    record_release_setup(&plan, config, &mut sink)?;
    extract_hlt_menu(&plan, &mut sink)?;
    list_input_files(&plan, &mut sink)?;
    compose_drivers(&plan, config, &mut sink)?;
    let request = submit_request(&plan, config, &mut sink, workdir)?;
    let script = sink.finish()?;

    print!("{}", summary(&plan));
    Ok(CampaignOutput { script, request })
}

/// Menu name from the first line of the generated menu fragment.
fn menu_name(plan: &CampaignPlan) -> Option<String> {
    let dir = plan.hlt_cmssw_dir.as_deref()?;
    let path = hlt_menu_path(dir, plan.spec.hlt_menu.unwrap_or(HltMenu::GRun));
    let text = fs::read_to_string(path).ok()?;
    let first = text.lines().next()?;
    first.rsplit(':').next().map(|name| name.trim().to_string())
}

/// Operator-facing recap of the campaign.
pub fn summary(plan: &CampaignPlan) -> String {
    let kind = plan.spec.kind;
    let [reference, new] = &plan.pairs;
    let mut out = String::from("\n");
    out.push_str(&format!("type: {kind}\n"));
    out.push_str(&format!("dataset: {}\n", plan.spec.datasets.join(",")));
    match &plan.runs {
        RunSelection::Runs(runs) => {
            let runs: Vec<String> = runs.iter().map(u64::to_string).collect();
            out.push_str(&format!("run: {}\n", runs.join(",")));
        }
        RunSelection::RunLumis(_) => {
            let mapping = plan.runs.lumi_mapping_text().unwrap_or_default();
            out.push_str(&format!("run: {mapping}\n"));
        }
    }
    if kind.involves_hlt() {
        let menu = menu_name(plan).unwrap_or_else(|| "None".to_string());
        out.push_str(&format!("HLT menu: {menu}\n"));
        out.push_str(&format!("Target HLT GT: {}\n", new.short_tag()));
        out.push_str(&format!("Reference HLT GT: {}\n", reference.short_tag()));
    }
    if kind.is_combined() && kind != WorkflowType::ExprReco {
        out.push_str(&format!("Common Prompt GT: {}\n", plan.base_gt));
    }
    if matches!(kind, WorkflowType::Pr | WorkflowType::Expr) {
        out.push_str(&format!("Target {kind} GT: {}\n", new.short_tag()));
        out.push_str(&format!("Reference {kind} GT: {}\n", reference.short_tag()));
    }
    out
}

#[cfg(test)]
#[path = "campaign_tests.rs"]
mod tests;
