//! Era selection from the release series and the datasets' run period.

/// Era used when no rule matches.
pub const DEFAULT_ERA: &str = "Run2_2018";

pub const PROTON_ION_RUN3_ERA: &str = "Run3_2022_pA";
pub const PROTON_ION_RUN2_ERA: &str = "Run2_2016_pA";

struct EraRule {
    release_marker: &'static str,
    dataset_marker: &'static str,
    era: &'static str,
}

// Evaluated top to bottom; the last matching rule wins.
const ERA_RULES: &[EraRule] = &[
    EraRule {
        release_marker: "10_",
        dataset_marker: "2018",
        era: "Run2_2018",
    },
    EraRule {
        release_marker: "11_",
        dataset_marker: "2021",
        era: "Run3",
    },
    EraRule {
        release_marker: "12_",
        dataset_marker: "2021",
        era: "Run3",
    },
];

/// Pick the era for a release processing the given datasets.
pub fn era_for(release: &str, datasets: &[String]) -> &'static str {
    ERA_RULES
        .iter()
        .rev()
        .find(|rule| {
            release.contains(rule.release_marker)
                && datasets.iter().any(|ds| ds.contains(rule.dataset_marker))
        })
        .map(|rule| rule.era)
        .unwrap_or(DEFAULT_ERA)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datasets(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn run3_for_2021_data_in_recent_releases() {
        let ds = datasets(&["/A/Run2021B/RECO"]);
        assert_eq!(era_for("CMSSW_12_4_0", &ds), "Run3");
        assert_eq!(era_for("CMSSW_11_3_2", &ds), "Run3");
    }

    #[test]
    fn default_when_nothing_matches() {
        let ds = datasets(&["/ZeroBias/Run2022C-v1/RAW"]);
        assert_eq!(era_for("CMSSW_12_4_0", &ds), DEFAULT_ERA);
        assert_eq!(era_for("CMSSW_9_4_0", &datasets(&[])), DEFAULT_ERA);
    }

    #[test]
    fn any_dataset_can_trigger_a_rule() {
        let ds = datasets(&["/A/Run2018D/RAW", "/B/Run2021A/RAW"]);
        assert_eq!(era_for("CMSSW_12_0_1", &ds), "Run3");
        assert_eq!(era_for("CMSSW_10_6_2", &ds), "Run2_2018");
    }
}
