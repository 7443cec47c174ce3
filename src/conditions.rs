//! Reference/new global tag pairs driving the two sides of a validation.
use crate::error::PreconditionError;
use regex::Regex;
use std::sync::OnceLock;

/// Which side of the comparison a pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionLabel {
    Reference,
    New,
}

impl ConditionLabel {
    /// Driver configuration written for this side.
    pub fn config_name(self) -> &'static str {
        match self {
            ConditionLabel::Reference => "REFERENCE.py",
            ConditionLabel::New => "NEWCONDITIONS0.py",
        }
    }

    /// Five-character tag used in derived file and section names.
    pub fn short(self) -> &'static str {
        match self {
            ConditionLabel::Reference => "refer",
            ConditionLabel::New => "newco",
        }
    }

    /// Banner text in the command script.
    pub fn banner(self) -> &'static str {
        match self {
            ConditionLabel::Reference => "REFERENCE",
            ConditionLabel::New => "NEW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionPair {
    pub label: ConditionLabel,
    pub global_tag: String,
}

impl ConditionPair {
    pub fn short_tag(&self) -> String {
        short_global_tag(&self.global_tag)
    }
}

/// Build the ordered `[reference, new]` pair list.
pub fn condition_pairs(
    reference: &str,
    new: &str,
) -> Result<[ConditionPair; 2], PreconditionError> {
    if reference.trim().is_empty() {
        return Err(PreconditionError::MissingOption("--gt"));
    }
    if new.trim().is_empty() {
        return Err(PreconditionError::MissingOption("--newgt"));
    }
    Ok([
        ConditionPair {
            label: ConditionLabel::Reference,
            global_tag: reference.to_string(),
        },
        ConditionPair {
            label: ConditionLabel::New,
            global_tag: new.to_string(),
        },
    ])
}

/// Strip a `tag,record,connection` triplet down to its leading part.
pub fn short_global_tag(tag: &str) -> String {
    static TRIPLET: OnceLock<Regex> = OnceLock::new();
    let triplet = TRIPLET.get_or_init(|| Regex::new(r"^(.*),(.*),(.*)").expect("valid regex"));
    triplet
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| tag.to_string())
}
