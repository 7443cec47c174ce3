//! Validation request templates and the per-workflow metadata derived from them.
//!
//! A template is a `key: value` text file; values keep any further colons.
//! Run-registry facts (`b_field`, `class`, `cmssw_version`, `hlt_key`) are
//! carried in the template itself.
use crate::policy::{HltMenu, WorkflowType};
use crate::runs::RunSelection;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Workflows a template can request, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Hlt,
    Express,
    Prompt,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 3] = [
        MetadataKind::Hlt,
        MetadataKind::Express,
        MetadataKind::Prompt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetadataKind::Hlt => "HLT",
            MetadataKind::Express => "Express",
            MetadataKind::Prompt => "Prompt",
        }
    }

    pub fn file_name(self) -> String {
        format!("metadata_{}.json", self.as_str())
    }
}

/// Parsed template with run-registry facts applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationTemplate {
    fields: BTreeMap<String, String>,
    pub labels: Vec<String>,
    pub week: String,
    pub year: String,
    pub runs: RunSelection,
    pub b_field: f64,
    pub class: String,
    pub hlt_release: String,
    pub prompt_release: String,
    pub express_release: String,
    pub hlt_menu: HltMenu,
    pub hlt_key: String,
}

/// Driver options of one workflow, keyed the way submission jobs read them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOptions {
    #[serde(rename = "B0T", skip_serializing_if = "Option::is_none")]
    pub zero_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cosmics: Option<String>,
    #[serde(rename = "recoCmsswDir", skip_serializing_if = "Option::is_none")]
    pub reco_cmssw_dir: Option<String>,
    /// Present for HLT workflows only; `null` selects the GRun menu.
    #[serde(rename = "HLTCustomMenu", skip_serializing_if = "Option::is_none")]
    pub hlt_custom_menu: Option<Option<String>>,
    #[serde(rename = "HLT", skip_serializing_if = "Option::is_none")]
    pub hlt: Option<HltMenu>,
    #[serde(rename = "Type")]
    pub kind: WorkflowType,
    pub ds: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basegt: Option<String>,
    pub gt: String,
    pub newgt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<Value>,
    #[serde(rename = "runLs", skip_serializing_if = "Option::is_none")]
    pub run_ls: Option<Value>,
    pub jira: String,
    #[serde(rename = "two_WFs", skip_serializing_if = "Option::is_none")]
    pub two_wfs: Option<String>,
}

/// One `metadata_<kind>.json` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowMetadata {
    #[serde(rename = "HLT_release", skip_serializing_if = "Option::is_none")]
    pub hlt_release: Option<String>,
    #[serde(rename = "Expr_release", skip_serializing_if = "Option::is_none")]
    pub express_release: Option<String>,
    #[serde(rename = "PR_release", skip_serializing_if = "Option::is_none")]
    pub prompt_release: Option<String>,
    pub options: WorkflowOptions,
}

/// Most recently modified file directly under `dir`.
pub fn newest_template(dir: &Path) -> Result<PathBuf> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let meta = entry
            .metadata()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .with_context(|| format!("mtime of {}", entry.path().display()))?;
        let newer = match &newest {
            Some((time, _)) => modified >= *time,
            None => true,
        };
        if newer {
            newest = Some((modified, entry.path()));
        }
    }
    newest
        .map(|(_, path)| path)
        .ok_or_else(|| anyhow!("no templates found in {}", dir.display()))
}

/// Split template text into fields, skipping comments and blank lines.
pub fn parse_fields(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(':') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

impl ValidationTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read template {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("process template {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let fields = parse_fields(text);
        let field = |key: &str| {
            fields
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow!("template is missing {key}"))
        };

        let labels: Vec<String> = field("Labels")?
            .split(',')
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
        let week = labels
            .iter()
            .find(|label| label.contains("Week"))
            .cloned()
            .ok_or_else(|| anyhow!("Labels must include a Week label"))?;
        let year = labels
            .iter()
            .find(|label| label.contains("202"))
            .cloned()
            .ok_or_else(|| anyhow!("Labels must include a year label"))?;

        let runs = RunSelection::parse_any(&field("Run")?)?;
        let b_field = field("b_field")?
            .parse::<f64>()
            .context("b_field must be a number")?;
        let run_release = field("cmssw_version")?;
        let release_or_run = |key: &str| -> Result<String> {
            let value = field(key)?;
            Ok(if value.contains("CMSSW") {
                value
            } else {
                run_release.clone()
            })
        };
        let hlt_release = release_or_run("HLT_release")?;
        let (hlt_menu, hlt_key) = if hlt_release == run_release {
            (HltMenu::Custom, field("hlt_key")?)
        } else {
            (HltMenu::GRun, format!("the GRun menu for {hlt_release}"))
        };

        let class = field("class")?;
        let prompt_release = release_or_run("PR_release")?;
        let express_release = release_or_run("Expr_release")?;

        Ok(Self {
            labels,
            week,
            year,
            runs,
            b_field,
            class,
            prompt_release,
            express_release,
            hlt_release,
            hlt_menu,
            hlt_key,
            fields,
        })
    }

    pub fn field(&self, key: &str) -> Result<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("template is missing {key}"))
    }

    /// Whether `WorkflowsToSubmit` names `kind`.
    pub fn requests(&self, kind: MetadataKind) -> bool {
        self.fields
            .get("WorkflowsToSubmit")
            .is_some_and(|value| value.split('/').any(|wf| wf.trim() == kind.as_str()))
    }

    /// `Labels` joined with `_`.
    pub fn label(&self) -> String {
        self.labels.join("_")
    }

    fn base_options(&self, kind: WorkflowType, gt_suffix: &str) -> Result<WorkflowOptions> {
        let (run, run_ls) = run_values(&self.runs);
        Ok(WorkflowOptions {
            zero_field: (self.b_field.round() == 0.0).then(String::new),
            cosmics: self.class.contains("Cosmics").then(String::new),
            reco_cmssw_dir: None,
            hlt_custom_menu: None,
            hlt: None,
            kind,
            ds: self.field("Dataset")?.to_string(),
            basegt: None,
            gt: self.field(&format!("ReferenceGT_{gt_suffix}"))?.to_string(),
            newgt: self.field(&format!("TargetGT_{gt_suffix}"))?.to_string(),
            run,
            run_ls,
            jira: self.field("Jira")?.to_string(),
            two_wfs: None,
        })
    }

    pub fn metadata(&self, kind: MetadataKind) -> Result<WorkflowMetadata> {
        Ok(match kind {
            MetadataKind::Hlt => WorkflowMetadata {
                hlt_release: Some(self.hlt_release.clone()),
                express_release: None,
                prompt_release: Some(self.prompt_release.clone()),
                options: WorkflowOptions {
                    reco_cmssw_dir: (self.hlt_release != self.prompt_release)
                        .then(|| self.prompt_release.clone()),
                    hlt_custom_menu: Some(match self.hlt_menu {
                        HltMenu::GRun => None,
                        _ => Some(format!("orcoff:{}", self.hlt_key)),
                    }),
                    hlt: Some(self.hlt_menu),
                    basegt: Some(self.field("TargetGT_Prompt")?.to_string()),
                    ..self.base_options(WorkflowType::HltReco, "HLT")?
                },
            },
            MetadataKind::Express => WorkflowMetadata {
                hlt_release: None,
                express_release: Some(self.express_release.clone()),
                prompt_release: None,
                options: WorkflowOptions {
                    two_wfs: Some(String::new()),
                    ..self.base_options(WorkflowType::Expr, "Express")?
                },
            },
            MetadataKind::Prompt => WorkflowMetadata {
                hlt_release: None,
                express_release: None,
                prompt_release: Some(self.prompt_release.clone()),
                options: WorkflowOptions {
                    two_wfs: Some(String::new()),
                    ..self.base_options(WorkflowType::Pr, "Prompt")?
                },
            },
        })
    }
}

fn run_values(runs: &RunSelection) -> (Option<Value>, Option<Value>) {
    match runs {
        RunSelection::Runs(list) => {
            let value = match list.as_slice() {
                [single] => Value::from(*single),
                _ => Value::from(list.clone()),
            };
            (Some(value), None)
        }
        RunSelection::RunLumis(mapping) => {
            let object = mapping
                .iter()
                .map(|(run, ranges)| {
                    let ranges: Vec<Vec<u64>> = ranges.iter().map(|range| range.to_vec()).collect();
                    (run.to_string(), Value::from(ranges))
                })
                .collect::<serde_json::Map<_, _>>();
            (None, Some(Value::Object(object)))
        }
    }
}

/// Write metadata for every requested workflow into `out_dir`.
pub fn write_metadata(template: &ValidationTemplate, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for kind in MetadataKind::ALL {
        if !template.requests(kind) {
            continue;
        }
        let metadata = template.metadata(kind)?;
        let path = out_dir.join(kind.file_name());
        let text = serde_json::to_string_pretty(&metadata)
            .with_context(|| format!("serialize {}", kind.file_name()))?;
        fs::write(&path, text + "\n").with_context(|| format!("write {}", path.display()))?;
        tracing::info!(workflow = kind.as_str(), path = %path.display(), "metadata written");
        written.push(path);
    }
    if written.is_empty() {
        tracing::warn!("WorkflowsToSubmit names no known workflow");
    }
    Ok(written)
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
