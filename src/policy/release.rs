//! Release string parsing and the version gates that depend on it.
use crate::error::{PolicyError, PreconditionError};
use std::path::Path;

/// A `CMSSW_<major>_<minor>_<patch>[_suffix]` release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Release {
    pub fn parse(name: &str) -> Result<Self, PolicyError> {
        let malformed = || PolicyError::MalformedRelease {
            release: name.to_string(),
        };
        let mut parts = name.split('_').skip(1);
        let mut number = || -> Result<u32, PolicyError> {
            parts
                .next()
                .and_then(|part| part.parse().ok())
                .ok_or_else(malformed)
        };
        Ok(Self {
            major: number()?,
            minor: number()?,
            patch: number()?,
        })
    }

    /// Releases up to and including 8_0_0 lack the current customise functions.
    pub fn is_before_eight(self) -> bool {
        match self.major {
            m if m < 8 => true,
            8 => self.minor < 1 && self.patch < 1,
            _ => false,
        }
    }

    /// Whether `hltGetConfiguration` output can be used without patching.
    pub fn supports_hlt_get_configuration(self) -> bool {
        match self.major {
            m if m > 8 => true,
            8 => self.minor < 1 && self.patch >= 9,
            _ => false,
        }
    }
}

/// Fails with `UnsupportedRelease` for releases older than 8_0_1.
pub fn ensure_supported(release: &str) -> Result<Release, PolicyError> {
    let parsed = Release::parse(release)?;
    if parsed.is_before_eight() {
        return Err(PolicyError::UnsupportedRelease {
            release: release.to_string(),
        });
    }
    Ok(parsed)
}

/// Return the first path component that names a release.
pub fn release_from_path(path: &Path) -> Result<String, PreconditionError> {
    let text = path.to_string_lossy();
    text.split('/')
        .find(|component| component.contains("CMSSW"))
        .map(str::to_string)
        .ok_or_else(|| PreconditionError::NotAReleasePath(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prerelease_suffix() {
        let release = Release::parse("CMSSW_12_4_0_pre3").unwrap();
        assert_eq!(
            release,
            Release {
                major: 12,
                minor: 4,
                patch: 0
            }
        );
    }

    #[test]
    fn rejects_names_without_patch() {
        let err = Release::parse("CMSSW_12_4").unwrap_err();
        assert!(matches!(err, PolicyError::MalformedRelease { .. }));
        assert!(Release::parse("CMSSW_X_Y_Z").is_err());
    }

    #[test]
    fn minimum_release_gate() {
        assert!(Release::parse("CMSSW_7_6_0").unwrap().is_before_eight());
        assert!(Release::parse("CMSSW_8_0_0").unwrap().is_before_eight());
        assert!(!Release::parse("CMSSW_8_0_1").unwrap().is_before_eight());
        assert!(!Release::parse("CMSSW_8_1_0").unwrap().is_before_eight());
        assert!(!Release::parse("CMSSW_13_0_2").unwrap().is_before_eight());
    }

    #[test]
    fn hlt_get_configuration_gate() {
        let ok = |name: &str| Release::parse(name).unwrap().supports_hlt_get_configuration();
        assert!(ok("CMSSW_12_4_0"));
        assert!(ok("CMSSW_8_0_9"));
        assert!(!ok("CMSSW_8_0_8"));
        assert!(!ok("CMSSW_8_1_0"));
        assert!(!ok("CMSSW_7_6_3"));
    }

    #[test]
    fn release_found_in_install_path() {
        let path = Path::new("/afs/cern.ch/work/u/user/CMSSW_12_4_9/src");
        assert_eq!(release_from_path(path).unwrap(), "CMSSW_12_4_9");
        assert!(release_from_path(Path::new("/tmp/work")).is_err());
    }
}
