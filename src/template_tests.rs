use super::*;
use serde_json::json;

const TEMPLATE: &str = "\
# Weekly conditions validation
Title: Beam spot update
Labels: HLT, Week23, 2022, BeamSpot

Dataset: /ZeroBias/Run2022C-v1/RAW
Run: {'355769': [[1, 100]]}
Jira: 1234
WorkflowsToSubmit: HLT/Prompt
HLT_release: None
PR_release: CMSSW_12_4_3
Expr_release: None
TargetGT_HLT: 124X_dataRun3_HLT_new_v1
ReferenceGT_HLT: 124X_dataRun3_HLT_v1
TargetGT_Prompt: 124X_dataRun3_Prompt_new_v1
ReferenceGT_Prompt: 124X_dataRun3_Prompt_v1
TargetGT_Express: 124X_dataRun3_Express_new_v1
ReferenceGT_Express: 124X_dataRun3_Express_v1
b_field: 3.8
class: Collisions22
cmssw_version: CMSSW_12_4_2
hlt_key: /cdaq/physics/Run2022/2e34/v1.2.3/HLT/V2
";

#[test]
fn fields_keep_extra_colons_and_skip_comments() {
    let fields = parse_fields("# note\n\nurl: https://example.org:8443/x\n");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["url"], "https://example.org:8443/x");
}

#[test]
fn template_resolves_releases_and_menu() {
    let template = ValidationTemplate::parse(TEMPLATE).unwrap();
    assert_eq!(template.week, "Week23");
    assert_eq!(template.year, "2022");
    assert_eq!(template.label(), "HLT_Week23_2022_BeamSpot");
    assert_eq!(template.hlt_release, "CMSSW_12_4_2");
    assert_eq!(template.express_release, "CMSSW_12_4_2");
    assert_eq!(template.prompt_release, "CMSSW_12_4_3");
    assert_eq!(template.hlt_menu, HltMenu::Custom);
    assert!(template.runs.is_lumi_filtered());
    assert!(template.requests(MetadataKind::Hlt));
    assert!(!template.requests(MetadataKind::Express));
}

#[test]
fn hlt_metadata_matches_submission_options() {
    let template = ValidationTemplate::parse(TEMPLATE).unwrap();
    let metadata = template.metadata(MetadataKind::Hlt).unwrap();
    let value = serde_json::to_value(&metadata).unwrap();
    assert_eq!(
        value,
        json!({
            "HLT_release": "CMSSW_12_4_2",
            "PR_release": "CMSSW_12_4_3",
            "options": {
                "recoCmsswDir": "CMSSW_12_4_3",
                "HLTCustomMenu": "orcoff:/cdaq/physics/Run2022/2e34/v1.2.3/HLT/V2",
                "HLT": "Custom",
                "Type": "HLT+RECO",
                "ds": "/ZeroBias/Run2022C-v1/RAW",
                "basegt": "124X_dataRun3_Prompt_new_v1",
                "gt": "124X_dataRun3_HLT_v1",
                "newgt": "124X_dataRun3_HLT_new_v1",
                "runLs": {"355769": [[1, 100]]},
                "jira": "1234"
            }
        })
    );
}

#[test]
fn other_release_selects_grun_menu() {
    let text = TEMPLATE.replace("HLT_release: None", "HLT_release: CMSSW_12_4_5");
    let template = ValidationTemplate::parse(&text).unwrap();
    assert_eq!(template.hlt_menu, HltMenu::GRun);
    let metadata = template.metadata(MetadataKind::Hlt).unwrap();
    assert_eq!(metadata.options.hlt_custom_menu, Some(None));
    let value = serde_json::to_value(&metadata).unwrap();
    assert_eq!(value["options"]["HLTCustomMenu"], Value::Null);
}

#[test]
fn zero_field_cosmics_prompt_metadata() {
    let text = TEMPLATE
        .replace("b_field: 3.8", "b_field: 0.02")
        .replace("class: Collisions22", "class: Cosmics22")
        .replace("Run: {'355769': [[1, 100]]}", "Run: 355769");
    let template = ValidationTemplate::parse(&text).unwrap();
    let value = serde_json::to_value(template.metadata(MetadataKind::Prompt).unwrap()).unwrap();
    assert_eq!(value["PR_release"], "CMSSW_12_4_3");
    assert_eq!(value["options"]["B0T"], "");
    assert_eq!(value["options"]["cosmics"], "");
    assert_eq!(value["options"]["Type"], "PR");
    assert_eq!(value["options"]["run"], 355769);
    assert_eq!(value["options"]["two_WFs"], "");
    assert!(value["options"].get("HLTCustomMenu").is_none());
}

#[test]
fn labels_need_week_and_year() {
    let text = TEMPLATE.replace("Labels: HLT, Week23, 2022, BeamSpot", "Labels: HLT, BeamSpot");
    let err = ValidationTemplate::parse(&text).unwrap_err();
    assert!(err.to_string().contains("Week"));
}

#[test]
fn metadata_written_for_requested_workflows() {
    let dir = tempfile::tempdir().unwrap();
    let template = ValidationTemplate::parse(TEMPLATE).unwrap();
    let written = write_metadata(&template, dir.path()).unwrap();
    let names: Vec<_> = written
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .collect();
    assert_eq!(names, vec!["metadata_HLT.json", "metadata_Prompt.json"]);
}

#[test]
fn newest_template_is_picked() {
    let dir = tempfile::tempdir().unwrap();
    let older = dir.path().join("older.txt");
    let newer = dir.path().join("newer.txt");
    fs::write(&older, "a: b\n").unwrap();
    fs::write(&newer, "a: b\n").unwrap();
    let past = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&older)
        .unwrap()
        .set_modified(past)
        .unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    assert_eq!(newest_template(dir.path()).unwrap(), newer);
}

#[test]
fn empty_template_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(newest_template(dir.path()).is_err());
}
