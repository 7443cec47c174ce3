//! Run selection: a plain run list or a run -> lumi-section ranges mapping.
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

/// Inclusive lumi-section range `[first, last]`.
pub type LumiRange = [u64; 2];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSelection {
    Runs(Vec<u64>),
    RunLumis(BTreeMap<u64, Vec<LumiRange>>),
}

impl RunSelection {
    /// Parse a comma-separated run list such as `355769,355770`.
    pub fn parse_runs(raw: &str) -> Result<Self> {
        let runs = raw
            .split(',')
            .map(str::trim)
            .filter(|run| !run.is_empty())
            .map(|run| {
                run.parse::<u64>()
                    .with_context(|| format!("invalid run number {run:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if runs.is_empty() {
            bail!("run list is empty");
        }
        Ok(RunSelection::Runs(runs))
    }

    /// Parse a certification-style mapping like `{'355769': [[1, 100]]}`.
    ///
    /// Single or double quotes are accepted, and run keys may be bare numbers.
    pub fn parse_run_lumis(raw: &str) -> Result<Self> {
        static BARE_KEY: OnceLock<Regex> = OnceLock::new();
        let bare_key =
            BARE_KEY.get_or_init(|| Regex::new(r#"([{,]\s*)(\d+)\s*:"#).expect("valid regex"));
        let normalized = raw.trim().replace('\'', "\"");
        let normalized = bare_key.replace_all(&normalized, r#"$1"$2":"#);
        let parsed: BTreeMap<String, Vec<LumiRange>> = serde_json::from_str(&normalized)
            .with_context(|| format!("parse run/lumi mapping {raw:?}"))?;
        if parsed.is_empty() {
            bail!("run/lumi mapping is empty");
        }
        let mut mapping = BTreeMap::new();
        for (run, ranges) in parsed {
            let run = run
                .parse::<u64>()
                .with_context(|| format!("invalid run number {run:?}"))?;
            if let Some([first, last]) = ranges.iter().find(|[first, last]| first > last) {
                return Err(anyhow!("lumi range [{first}, {last}] of run {run} is reversed"));
            }
            mapping.insert(run, ranges);
        }
        Ok(RunSelection::RunLumis(mapping))
    }

    /// Accept either form, choosing by the presence of a `:`.
    pub fn parse_any(raw: &str) -> Result<Self> {
        if raw.contains(':') {
            Self::parse_run_lumis(raw)
        } else {
            Self::parse_runs(raw)
        }
    }

    pub fn runs(&self) -> Vec<u64> {
        match self {
            RunSelection::Runs(runs) => runs.clone(),
            RunSelection::RunLumis(mapping) => mapping.keys().copied().collect(),
        }
    }

    /// The run used wherever a single representative run is needed.
    pub fn first_run(&self) -> u64 {
        match self {
            RunSelection::Runs(runs) => runs.first().copied().unwrap_or_default(),
            RunSelection::RunLumis(mapping) => mapping.keys().next().copied().unwrap_or_default(),
        }
    }

    pub fn lumi_ranges(&self, run: u64) -> Option<&[LumiRange]> {
        match self {
            RunSelection::Runs(_) => None,
            RunSelection::RunLumis(mapping) => mapping.get(&run).map(Vec::as_slice),
        }
    }

    pub fn is_lumi_filtered(&self) -> bool {
        matches!(self, RunSelection::RunLumis(_))
    }

    /// `_`-joined run numbers for file names.
    pub fn label(&self) -> String {
        self.runs()
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The mapping rendered as `{"run": [[a, b], ...], ...}`.
    pub fn lumi_mapping_text(&self) -> Option<String> {
        let RunSelection::RunLumis(mapping) = self else {
            return None;
        };
        let entries: Vec<String> = mapping
            .iter()
            .map(|(run, ranges)| format!("\"{run}\": {}", format_ranges(ranges)))
            .collect();
        Some(format!("{{{}}}", entries.join(", ")))
    }
}

/// Render ranges as `[[1, 10], [20, 30]]`.
pub fn format_ranges(ranges: &[LumiRange]) -> String {
    let mut out = String::from("[");
    for (idx, [first, last]) in ranges.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "[{first}, {last}]");
    }
    out.push(']');
    out
}
