//! The command script: every command the campaign runs or would run.
//!
//! One `CommandSink` is opened per campaign and handed to each composer.
//! Entries are appended in order and annotated so the script reads as a
//! record of the campaign; in dry mode nothing is executed.
use crate::error::CommandError;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

const SCRIPT_HEADER: &str = "#!/bin/bash \nset -x\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Print and record only.
    Dry,
    /// Record, then run through the configured shell.
    Execute,
}

/// Whether the command gets its own paragraph in the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echo {
    Loud,
    Quiet,
}

pub struct CommandSink {
    path: PathBuf,
    out: BufWriter<File>,
    mode: ExecMode,
    shell: Vec<String>,
    recorded: usize,
}

impl CommandSink {
    /// Create (truncating) the script at `path`.
    pub fn create(path: &Path, mode: ExecMode, shell: &str) -> Result<Self> {
        let shell = shell_words::split(shell).with_context(|| format!("parse shell: {shell}"))?;
        if shell.is_empty() {
            return Err(anyhow!("shell command is empty"));
        }
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(SCRIPT_HEADER.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
            mode,
            shell,
            recorded: 0,
        })
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Number of commands recorded so far.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Append free text (banners, section comments) verbatim.
    pub fn note(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))
    }

    /// Record `command` and run it unless in dry mode.
    pub fn run(&mut self, command: &str, echo: Echo) -> Result<()> {
        match self.mode {
            ExecMode::Dry => {
                println!("{command}");
                // Request submission is never part of a dry-run record.
                if !command.contains("wmcontrol") {
                    self.record(command, echo)?;
                }
                Ok(())
            }
            ExecMode::Execute => {
                self.record(command, echo)?;
                self.out
                    .flush()
                    .with_context(|| format!("flush {}", self.path.display()))?;
                self.spawn(command)
            }
        }
    }

    /// Flush the script and hand back its path.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.out
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            commands = self.recorded,
            "command script written"
        );
        Ok(self.path)
    }

    fn record(&mut self, command: &str, echo: Echo) -> Result<()> {
        let text = annotate(command, echo);
        self.note(&text)?;
        self.recorded += 1;
        Ok(())
    }

    fn spawn(&self, command: &str) -> Result<()> {
        tracing::info!(command, "executing");
        let status = Command::new(&self.shell[0])
            .args(&self.shell[1..])
            .arg(command)
            .status()
            .with_context(|| format!("spawn shell {}", self.shell[0]))?;
        if !status.success() {
            return Err(CommandError::Failed {
                command: command.to_string(),
                status,
            }
            .into());
        }
        tracing::info!(command, "executed");
        Ok(())
    }
}

/// Fail early when a tool the campaign will run is not installed.
pub fn require_tools(tools: &[&str]) -> Result<(), CommandError> {
    for tool in tools {
        if which::which(tool).is_err() {
            return Err(CommandError::Missing {
                tool: tool.to_string(),
            });
        }
    }
    Ok(())
}

/// Render the script entry for `command`.
///
/// Stage markers are derived from the command text, driver invocations are
/// commented one option per line, and loud entries get their own paragraph.
pub fn annotate(command: &str, echo: Echo) -> String {
    let loud = echo == Echo::Loud;
    let mut out = String::new();
    if loud {
        out.push('\n');
    }
    if command.contains("hltGetConfiguration") {
        out.push_str("# Step 0: Extract custom HLT configuration from given HLT menu\n");
    }
    if command.contains("--processName HLT2") {
        out.push_str("# Step 2: HLT\n");
    }
    if command.contains("--processName reRECO") {
        out.push_str("# Step 3: Reconstruction\n");
    }
    if command.contains("step4") {
        out.push_str("# Step 4: DQM Harvesting\n");
    }
    for part in command.split(';') {
        if part.contains("cmsDriver") {
            for (idx, option) in part.split("--").enumerate() {
                if idx == 0 {
                    out.push_str(&format!("# {option}\n"));
                } else {
                    out.push_str(&format!("# --{option}\n"));
                }
            }
        } else if loud {
            out.push_str(&format!("# {part}\n"));
        }
    }
    if loud {
        out.push('\n');
    }
    out.push_str(command);
    out.push('\n');
    out
}
