//! Commands that prepare the release area and the input file list.
use super::{runtime_prefix, CampaignPlan};
use crate::config::SubmitterConfig;
use crate::error::PreconditionError;
use crate::policy::{release_from_path, HltMenu, Release, LUMI_RANGES_FILE};
use crate::runs::format_ranges;
use crate::sink::{CommandSink, Echo, ExecMode};
use anyhow::Result;
use std::path::{Path, PathBuf};

const INPUT_FILES: &str = "step1_files.txt";

/// Record how the release area was built; only meaningful for dry runs.
pub fn record_release_setup(
    plan: &CampaignPlan,
    config: &SubmitterConfig,
    sink: &mut CommandSink,
) -> Result<()> {
    if sink.mode() != ExecMode::Dry {
        return Ok(());
    }
    let release = &plan.spec.release;
    let commands = [
        format!("export SCRAM_ARCH={}", config.scram_arch),
        format!("scramv1 project {release}"),
        format!("cd {release}/src"),
        "eval `scramv1 runtime -sh`".to_string(),
        "git cms-addpkg HLTrigger/Configuration".to_string(),
        "scramv1 b".to_string(),
        "cd -".to_string(),
    ];
    for command in &commands {
        sink.run(command, Echo::Quiet)?;
    }
    Ok(())
}

/// Location of the generated menu fragment for `menu`.
pub fn hlt_menu_path(hlt_dir: &Path, menu: HltMenu) -> PathBuf {
    hlt_dir
        .join("src/HLTrigger/Configuration/python")
        .join(format!("HLT_{menu}_cff.py"))
}

/// Dump the requested HLT menu into the HLT release area.
///
/// Releases that cannot consume `hltGetConfiguration` output directly get
/// the DQM output modules patched out and the package rebuilt.
pub fn extract_hlt_menu(plan: &CampaignPlan, sink: &mut CommandSink) -> Result<()> {
    let Some(menu) = plan.spec.hlt_menu.filter(|menu| menu.needs_extraction()) else {
        return Ok(());
    };
    let hlt_dir = plan
        .hlt_cmssw_dir
        .as_deref()
        .ok_or(PreconditionError::MissingEnv("CMSSW_BASE"))?;
    let package_dir = hlt_dir.join("src/HLTrigger/Configuration");
    if !package_dir.is_dir() {
        return Err(PreconditionError::MissingHltPackage(hlt_dir.display().to_string()).into());
    }

    let source = match menu {
        HltMenu::Custom => plan
            .hlt_custom_menu
            .clone()
            .ok_or(PreconditionError::MissingOption("--hlt-custom-menu"))?,
        _ => format!("run:{}", plan.runs.first_run()),
    };
    let menu_file = hlt_menu_path(hlt_dir, menu);
    let hlt_command = format!(
        "hltGetConfiguration --unprescale --cff --offline {source} > {}",
        menu_file.display()
    );

    let release = Release::parse(&release_from_path(hlt_dir)?)?;
    if release.supports_hlt_get_configuration() {
        return sink.run(&hlt_command, Echo::Loud);
    }

    tracing::warn!(
        release = ?release,
        "release cannot use hltGetConfiguration output directly, patching the menu"
    );
    let menu_file = menu_file.display();
    let command = [
        runtime_prefix(hlt_dir),
        hlt_command,
        format!("sed -i 's/+ fragment.hltDQMFileSaver//g' {menu_file}"),
        format!("sed -i 's/, fragment.DQMHistograms//g' {menu_file}"),
        format!(
            "cd {}/src; eval `scramv1 runtime -sh`; scram b; cd -",
            hlt_dir.display()
        ),
    ]
    .join("; ");
    sink.run(&command, Echo::Loud)
}

/// Query the data catalog for the files of the first run of every dataset.
pub fn list_input_files(plan: &CampaignPlan, sink: &mut CommandSink) -> Result<()> {
    sink.note("\n# Step1: create list of input files\n")?;
    let run = plan.runs.first_run();
    let ranges = plan.runs.lumi_ranges(run);

    sink.run(&format!("echo '' > {INPUT_FILES}"), Echo::Quiet)?;
    for dataset in &plan.spec.datasets {
        let command = match ranges.and_then(|ranges| ranges.first()) {
            Some([first, last]) => format!(
                "dasgoclient --limit 10 --format json --query 'lumi,file dataset={dataset} run={run}' \
                 | das-selected-lumis.py {first},{last} | sort -u >> {INPUT_FILES}"
            ),
            None => format!(
                "dasgoclient --limit 10 --format list --query 'file dataset={dataset} run={run}' >> {INPUT_FILES}"
            ),
        };
        sink.run(&command, Echo::Quiet)?;
    }
    if let Some(ranges) = ranges {
        let mapping = format!("{{\"{run}\": {}}}", format_ranges(ranges));
        sink.run(&format!("echo '{mapping}' > {LUMI_RANGES_FILE}"), Echo::Quiet)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::plan;
    use super::*;
    use crate::policy::WorkflowType;
    use crate::runs::RunSelection;
    use std::collections::BTreeMap;

    fn dry_sink(dir: &Path) -> CommandSink {
        CommandSink::create(&dir.join("cmsDrivers.sh"), ExecMode::Dry, "/bin/sh -c").unwrap()
    }

    #[test]
    fn release_setup_only_recorded_for_dry_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = dry_sink(dir.path());
        let plan = plan(WorkflowType::Hlt);
        record_release_setup(&plan, &SubmitterConfig::default(), &mut sink).unwrap();
        assert_eq!(sink.recorded(), 7);
        let text = std::fs::read_to_string(sink.finish().unwrap()).unwrap();
        assert!(text.contains("export SCRAM_ARCH=slc7_amd64_gcc900\nscramv1 project CMSSW_12_4_0\n"));
    }

    #[test]
    fn lumi_filtered_file_listing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = dry_sink(dir.path());
        let mut plan = plan(WorkflowType::Pr);
        plan.runs = RunSelection::RunLumis(BTreeMap::from([(346512, vec![[5, 9], [11, 12]])]));
        list_input_files(&plan, &mut sink).unwrap();
        let text = std::fs::read_to_string(sink.finish().unwrap()).unwrap();
        assert!(text.contains("# Step1: create list of input files"));
        assert!(text.contains(
            "--query 'lumi,file dataset=/ZeroBias/Run2021B-v1/RAW run=346512' | das-selected-lumis.py 5,9 | sort -u >> step1_files.txt"
        ));
        assert!(text.contains("echo '{\"346512\": [[5, 9], [11, 12]]}' > step1_lumi_ranges.txt"));
    }

    #[test]
    fn plain_run_file_listing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = dry_sink(dir.path());
        let plan = plan(WorkflowType::Pr);
        list_input_files(&plan, &mut sink).unwrap();
        assert_eq!(sink.recorded(), 2);
        let text = std::fs::read_to_string(sink.finish().unwrap()).unwrap();
        assert!(text.contains("--format list --query 'file dataset=/ZeroBias/Run2021B-v1/RAW run=346512' >> step1_files.txt"));
        assert!(!text.contains(LUMI_RANGES_FILE));
    }

    #[test]
    fn menu_extraction_requires_hlt_package() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = dry_sink(dir.path());
        let mut plan = plan(WorkflowType::Hlt);
        plan.spec.hlt_menu = Some(HltMenu::SameAsRun);
        plan.hlt_cmssw_dir = Some(dir.path().join("CMSSW_12_4_0"));
        let err = extract_hlt_menu(&plan, &mut sink).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::MissingHltPackage(_))
        ));
    }

    #[test]
    fn menu_extraction_for_run() {
        let dir = tempfile::tempdir().unwrap();
        let release_dir = dir.path().join("CMSSW_12_4_0");
        std::fs::create_dir_all(release_dir.join("src/HLTrigger/Configuration/python")).unwrap();
        let mut sink = dry_sink(dir.path());
        let mut plan = plan(WorkflowType::Hlt);
        plan.spec.hlt_menu = Some(HltMenu::SameAsRun);
        plan.hlt_cmssw_dir = Some(release_dir.clone());
        extract_hlt_menu(&plan, &mut sink).unwrap();
        let text = std::fs::read_to_string(sink.finish().unwrap()).unwrap();
        assert!(text.contains("# Step 0: Extract custom HLT configuration from given HLT menu"));
        assert!(text.contains(&format!(
            "hltGetConfiguration --unprescale --cff --offline run:346512 > {}",
            hlt_menu_path(&release_dir, HltMenu::SameAsRun).display()
        )));
    }

    #[test]
    fn old_release_patches_and_rebuilds_the_menu() {
        let dir = tempfile::tempdir().unwrap();
        let release_dir = dir.path().join("CMSSW_8_1_0");
        std::fs::create_dir_all(release_dir.join("src/HLTrigger/Configuration/python")).unwrap();
        let mut sink = dry_sink(dir.path());
        let mut plan = plan(WorkflowType::Hlt);
        plan.spec.hlt_menu = Some(HltMenu::SameAsRun);
        plan.hlt_cmssw_dir = Some(release_dir.clone());
        extract_hlt_menu(&plan, &mut sink).unwrap();
        assert_eq!(sink.recorded(), 1);

        let menu = hlt_menu_path(&release_dir, HltMenu::SameAsRun);
        let menu = menu.display();
        let release = release_dir.display();
        let expected = format!(
            "cd {release}; eval `scramv1 runtime -sh`; cd -; \
             hltGetConfiguration --unprescale --cff --offline run:346512 > {menu}; \
             sed -i 's/+ fragment.hltDQMFileSaver//g' {menu}; \
             sed -i 's/, fragment.DQMHistograms//g' {menu}; \
             cd {release}/src; eval `scramv1 runtime -sh`; scram b; cd -"
        );
        let text = std::fs::read_to_string(sink.finish().unwrap()).unwrap();
        assert!(text.contains(&expected), "script was:\n{text}");
    }

    #[test]
    fn custom_menu_needs_a_menu_name() {
        let dir = tempfile::tempdir().unwrap();
        let release_dir = dir.path().join("CMSSW_12_4_0");
        std::fs::create_dir_all(release_dir.join("src/HLTrigger/Configuration")).unwrap();
        let mut sink = dry_sink(dir.path());
        let mut plan = plan(WorkflowType::Hlt);
        plan.spec.hlt_menu = Some(HltMenu::Custom);
        plan.hlt_cmssw_dir = Some(release_dir);
        let err = extract_hlt_menu(&plan, &mut sink).unwrap_err();
        assert!(err.to_string().contains("--hlt-custom-menu"));

        plan.hlt_custom_menu = Some("orcoff:/cdaq/physics/Run2022/v1.0/HLT/V1".to_string());
        extract_hlt_menu(&plan, &mut sink).unwrap();
    }

    #[test]
    fn grun_menu_needs_no_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = dry_sink(dir.path());
        let mut plan = plan(WorkflowType::Hlt);
        plan.spec.hlt_menu = Some(HltMenu::GRun);
        plan.hlt_cmssw_dir = None;
        extract_hlt_menu(&plan, &mut sink).unwrap();
        assert_eq!(sink.recorded(), 0);
    }
}
