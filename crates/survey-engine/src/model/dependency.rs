use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::ReservedCode;

/// A readable slot: `(qualified component code, reserved code)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub component_code: SmolStr,
    pub reserved_code: ReservedCode,
}

impl Dependency {
    pub fn new(component_code: impl Into<SmolStr>, reserved_code: ReservedCode) -> Self {
        Self {
            component_code: component_code.into(),
            reserved_code,
        }
    }

    /// Key under which scripts read this slot, e.g. `Q1.value`.
    pub fn to_value_key(&self) -> String {
        format!("{}.{}", self.component_code, self.reserved_code)
    }

    pub fn from_value_key(key: &str) -> Option<Self> {
        let (component_code, reserved_code) = key.split_once('.')?;
        if component_code.is_empty() {
            return None;
        }
        ReservedCode::from_code(reserved_code).map(|reserved_code| Self::new(component_code, reserved_code))
    }

    pub fn to_dependent(&self) -> Dependent {
        Dependent::new(self.component_code.clone(), self.reserved_code.code())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component_code, self.reserved_code)
    }
}

/// A computed instruction: `(qualified component code, instruction code)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependent {
    pub component_code: SmolStr,
    pub instruction_code: SmolStr,
}

impl Dependent {
    pub fn new(component_code: impl Into<SmolStr>, instruction_code: impl Into<SmolStr>) -> Self {
        Self {
            component_code: component_code.into(),
            instruction_code: instruction_code.into(),
        }
    }

    pub fn to_dependency(&self) -> Option<Dependency> {
        ReservedCode::from_code(&self.instruction_code)
            .map(|reserved_code| Dependency::new(self.component_code.clone(), reserved_code))
    }
}

impl fmt::Display for Dependent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component_code, self.instruction_code)
    }
}

/// Dependent to the slots its script reads, in first-seen order.
pub type DependencyMap = IndexMap<Dependent, Vec<Dependency>>;

/// Slot to the dependents that read it, in first-seen order.
pub type ImpactMap = IndexMap<Dependency, Vec<Dependent>>;

/// String keyed form of [`ImpactMap`], e.g. `"Q1.value" -> ["Q2.conditional_relevance"]`.
pub type StringImpactMap = IndexMap<String, Vec<String>>;

/// Computed slot values.
pub type Bindings = IndexMap<Dependency, serde_json::Value>;

/// Evaluated reference instructions, keyed by `(component, reference code)`.
pub type FormatBindings = IndexMap<Dependent, serde_json::Value>;

/// Slot values keyed by value key, as exchanged with hosts.
pub type ValueMap = IndexMap<String, serde_json::Value>;
