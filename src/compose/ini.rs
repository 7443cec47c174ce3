//! Minimal INI writer for request files.
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Display) -> &mut Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Sections in insertion order; keys keep their insertion order too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    pub sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn push(&mut self, section: IniSection) {
        self.sections.push(section);
    }

    #[cfg(test)]
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|section| section.name == name)
    }
}

impl Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, section) in self.sections.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(f, "{key} = {value}")?;
            }
        }
        Ok(())
    }
}
