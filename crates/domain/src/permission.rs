use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use backoffice_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

macro_rules! policy_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal, $allow_dot:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl Into<String>) -> AppResult<Self> {
                let value = value.into();
                validate_policy_identifier(value.as_str(), $label, $allow_dot)?;
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = AppError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::new(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                formatter.write_str(self.0.as_str())
            }
        }
    };
}

policy_identifier!(
    /// Top-level business module (`hr`, `finance`, `hr.employee`).
    ModuleId,
    "module",
    true
);
policy_identifier!(
    /// Sub-module inside a module (`employee`, `flow`).
    SubModuleId,
    "sub-module",
    false
);
policy_identifier!(
    /// Action granted on a sub-module (`view`, `edit`, `approve`).
    ActionId,
    "action",
    false
);

fn validate_policy_identifier(value: &str, label: &str, allow_dot: bool) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{label} must not be empty")));
    }

    let valid = value.chars().all(|character| {
        character.is_ascii_alphanumeric()
            || character == '_'
            || character == '-'
            || (allow_dot && character == '.')
    });
    if !valid || value.starts_with('.') || value.ends_with('.') {
        return Err(AppError::Validation(format!(
            "{label} '{value}' may only contain letters, digits, '_' or '-'{}",
            if allow_dot { " separated by '.'" } else { "" }
        )));
    }

    Ok(())
}

/// Row-visibility tier attached to a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    /// Only rows owned by the acting employee.
    #[default]
    #[serde(rename = "self")]
    SelfOnly,
    /// Rows anchored to the acting employee's project.
    Project,
    /// Rows anchored to the acting employee's department.
    Group,
    /// Every row.
    All,
}

impl DataScope {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfOnly => "self",
            Self::Project => "project",
            Self::Group => "group",
            Self::All => "all",
        }
    }

    /// Returns all known scopes from narrowest to widest.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[DataScope] = &[
            DataScope::SelfOnly,
            DataScope::Project,
            DataScope::Group,
            DataScope::All,
        ];

        ALL
    }
}

impl FromStr for DataScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "self" => Ok(Self::SelfOnly),
            "project" => Ok(Self::Project),
            "group" => Ok(Self::Group),
            "all" => Ok(Self::All),
            _ => Err(AppError::Validation(format!(
                "unknown data scope value '{value}'"
            ))),
        }
    }
}

/// Module → sub-module → action grant table of one position.
///
/// A missing level is a denial, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grants(BTreeMap<ModuleId, BTreeMap<SubModuleId, BTreeSet<ActionId>>>);

impl Grants {
    /// Creates an empty grant table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the grant table with one action added.
    #[must_use]
    pub fn with_action(
        mut self,
        module: ModuleId,
        sub_module: SubModuleId,
        action: ActionId,
    ) -> Self {
        self.grant(module, sub_module, action);
        self
    }

    /// Adds one action to the grant table.
    pub fn grant(&mut self, module: ModuleId, sub_module: SubModuleId, action: ActionId) {
        self.0
            .entry(module)
            .or_default()
            .entry(sub_module)
            .or_default()
            .insert(action);
    }

    /// Parses a grant table from `(module, sub_module, action)` string triples.
    pub fn from_triples<'a>(
        triples: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    ) -> AppResult<Self> {
        let mut grants = Self::new();
        for (module, sub_module, action) in triples {
            grants.grant(
                ModuleId::new(module)?,
                SubModuleId::new(sub_module)?,
                ActionId::new(action)?,
            );
        }

        Ok(grants)
    }

    /// Returns the sub-module table of a module, if granted at all.
    #[must_use]
    pub fn module(&self, module: &str) -> Option<&BTreeMap<SubModuleId, BTreeSet<ActionId>>> {
        self.0.get(module)
    }

    /// Returns the action set of a sub-module, if granted at all.
    #[must_use]
    pub fn actions(&self, module: &str, sub_module: &str) -> Option<&BTreeSet<ActionId>> {
        self.module(module)?.get(sub_module)
    }

    /// Iterates modules in stable order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.0.keys()
    }

    /// Iterates the full grant table.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ModuleId, &BTreeMap<SubModuleId, BTreeSet<ActionId>>)> {
        self.0.iter()
    }

    /// Returns whether nothing is granted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0
            .values()
            .all(|sub_modules| sub_modules.values().all(BTreeSet::is_empty))
    }
}

/// One `(module, sub_module?, action?)` check used in batch evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionRequirement {
    /// Required module.
    pub module: String,
    /// Optional sub-module narrowing.
    pub sub_module: Option<String>,
    /// Optional action narrowing; ignored without a sub-module.
    pub action: Option<String>,
}

impl PermissionRequirement {
    /// Requires any grant under a module.
    #[must_use]
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            sub_module: None,
            action: None,
        }
    }

    /// Requires any action on a sub-module.
    #[must_use]
    pub fn sub_module(module: impl Into<String>, sub_module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            sub_module: Some(sub_module.into()),
            action: None,
        }
    }

    /// Requires one specific action.
    #[must_use]
    pub fn action(
        module: impl Into<String>,
        sub_module: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            sub_module: Some(sub_module.into()),
            action: Some(action.into()),
        }
    }
}

impl Display for PermissionRequirement {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.module.as_str())?;
        if let Some(sub_module) = &self.sub_module {
            write!(formatter, ".{sub_module}")?;
            if let Some(action) = &self.action {
                write!(formatter, ".{action}")?;
            }
        }

        Ok(())
    }
}

/// Combinator for batch permission checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLogic {
    /// Every requirement must pass.
    #[default]
    And,
    /// At least one requirement must pass.
    Or,
}
