use std::fmt::{Display, Formatter};
use std::str::FromStr;

use backoffice_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::ModuleId;

const WILDCARD: &str = "*";
const PREFIX_SUFFIX: &str = ".*";

/// One entry of a department module allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModulePattern {
    /// `*`: every module.
    Any,
    /// `hr.*`: the `hr` module and every `hr.<x>` module.
    Prefix(ModuleId),
    /// `finance`: exactly one module.
    Exact(ModuleId),
}

impl ModulePattern {
    /// Returns whether the pattern covers a module.
    #[must_use]
    pub fn matches(&self, module: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => exact.as_str() == module,
            Self::Prefix(prefix) => {
                let prefix = prefix.as_str();
                module == prefix
                    || module
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('.'))
            }
        }
    }
}

impl FromStr for ModulePattern {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value == WILDCARD {
            return Ok(Self::Any);
        }

        match value.strip_suffix(PREFIX_SUFFIX) {
            Some(prefix) => ModuleId::new(prefix).map(Self::Prefix),
            None => ModuleId::new(value).map(Self::Exact),
        }
        .map_err(|error| {
            AppError::Validation(format!("invalid module pattern '{value}': {error}"))
        })
    }
}

impl TryFrom<String> for ModulePattern {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl From<ModulePattern> for String {
    fn from(value: ModulePattern) -> Self {
        value.to_string()
    }
}

impl Display for ModulePattern {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => formatter.write_str(WILDCARD),
            Self::Prefix(prefix) => write!(formatter, "{prefix}{PREFIX_SUFFIX}"),
            Self::Exact(module) => formatter.write_str(module.as_str()),
        }
    }
}

/// Modules a department may use, independent of what positions grant.
///
/// An empty list allows nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleAllowList(Vec<ModulePattern>);

impl ModuleAllowList {
    /// Allow-list containing only `*`.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self(vec![ModulePattern::Any])
    }

    /// Builds an allow-list from parsed patterns.
    #[must_use]
    pub fn new(patterns: Vec<ModulePattern>) -> Self {
        Self(patterns)
    }

    /// Parses an allow-list from raw storage values.
    pub fn parse<I, S>(values: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| ModulePattern::from_str(value.as_ref()))
            .collect::<AppResult<Vec<_>>>()
            .map(Self)
    }

    /// Returns whether the list contains the `*` wildcard.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.0.contains(&ModulePattern::Any)
    }

    /// Returns whether any entry covers the module.
    #[must_use]
    pub fn allows(&self, module: &str) -> bool {
        self.is_unrestricted() || self.0.iter().any(|pattern| pattern.matches(module))
    }

    /// Returns the configured patterns.
    #[must_use]
    pub fn patterns(&self) -> &[ModulePattern] {
        self.0.as_slice()
    }

    /// Returns the storage representation.
    #[must_use]
    pub fn to_storage_values(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl Default for ModuleAllowList {
    fn default() -> Self {
        Self::unrestricted()
    }
}

#[cfg(test)]
mod tests {
    use super::{ModuleAllowList, ModulePattern};

    #[test]
    fn prefix_pattern_covers_module_and_children_only() {
        let pattern: Result<ModulePattern, _> = "hr.*".parse();
        let Ok(pattern) = pattern else {
            panic!("hr.* should parse");
        };

        assert!(pattern.matches("hr"));
        assert!(pattern.matches("hr.employee"));
        assert!(pattern.matches("hr.employee.contract"));
        assert!(!pattern.matches("hrx"));
        assert!(!pattern.matches("finance.flow"));
    }

    #[test]
    fn exact_pattern_does_not_cover_children() {
        let Ok(list) = ModuleAllowList::parse(["finance"]) else {
            panic!("finance should parse");
        };

        assert!(list.allows("finance"));
        assert!(!list.allows("finance.flow"));
    }

    #[test]
    fn wildcard_anywhere_in_list_unrestricts() {
        let Ok(list) = ModuleAllowList::parse(["hr.*", "*"]) else {
            panic!("list should parse");
        };

        assert!(list.is_unrestricted());
        assert!(list.allows("assets"));
    }

    #[test]
    fn empty_list_allows_nothing() {
        let list = ModuleAllowList::new(Vec::new());
        assert!(!list.allows("hr"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(ModuleAllowList::parse(["hr.**"]).is_err());
        assert!(ModuleAllowList::parse([""]).is_err());
    }

    #[test]
    fn storage_values_round_trip() {
        let values = ["*", "hr.*", "finance"];
        let Ok(list) = ModuleAllowList::parse(values) else {
            panic!("list should parse");
        };

        assert_eq!(list.to_storage_values(), values.map(str::to_owned).to_vec());
    }
}
