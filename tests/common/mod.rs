//! Shared test infrastructure for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const RELEASE: &str = "CMSSW_12_4_0";

/// A scratch working directory with a fake release area next to it.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn create() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("work")).expect("create work dir");
        fs::create_dir_all(dir.path().join("config")).expect("create config dir");
        Self { dir }
    }

    /// Directory the binary runs in.
    pub fn workdir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// `CMSSW_BASE` of the fake release area.
    pub fn release_base(&self) -> PathBuf {
        self.dir.path().join(RELEASE)
    }

    pub fn read(&self, name: &str) -> String {
        let path = self.workdir().join(name);
        fs::read_to_string(&path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
    }

    /// Command for `condval` with a release environment and no user config.
    pub fn condval(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_condval"));
        command
            .current_dir(self.workdir())
            .env("CMSSW_VERSION", RELEASE)
            .env("CMSSW_BASE", self.release_base())
            .env("USER", "tester")
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("RUST_LOG", "warn");
        command
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.condval().args(args).output().expect("run condval")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Names of the files directly under `dir`, sorted.
#[allow(dead_code)]
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
