use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use smol_str::SmolStr;
use thiserror::Error;

use super::Dependency;

/// Authoring error attached to an instruction.
///
/// Serialized as an object carrying the variant specific fields followed by a `name`
/// discriminator, e.g. `{"items":["A1"],"name":"RandomGroupItemNotChild"}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[serde(try_from = "RawInstructionError")]
pub enum InstructionError {
    #[error("Forward dependency on {0}")]
    ForwardDependency(Dependency),
    #[error("Script error at {start}..{end}: {message}")]
    ScriptError { message: String, start: usize, end: usize },
    #[error("Invalid skip target `{0}`")]
    InvalidSkipReference(SmolStr),
    #[error("Skip to end cannot target an end group")]
    SkipToEndOfEndGroup,
    #[error("Invalid reference `{reference}`")]
    InvalidReference { reference: String, invalid_component: bool },
    #[error("Not children of this component: {}", .0.join(", "))]
    InvalidChildReferences(Vec<SmolStr>),
    #[error("Priority limit out of range")]
    PriorityLimitMismatch,
    #[error("Duplicate priority group items: {}", .0.join(", "))]
    DuplicatePriorityGroupItems(Vec<SmolStr>),
    #[error("Priority group items are not children: {}", .0.join(", "))]
    PriorityGroupItemNotChild(Vec<SmolStr>),
    #[error("Items cannot be prioritized: {}", .0.join(", "))]
    InvalidPriorityItem(Vec<SmolStr>),
    #[error("Items cannot be randomized: {}", .0.join(", "))]
    InvalidRandomItem(Vec<SmolStr>),
    #[error("Duplicate random group items: {}", .0.join(", "))]
    DuplicateRandomGroupItems(Vec<SmolStr>),
    #[error("Random group items are not children: {}", .0.join(", "))]
    RandomGroupItemNotChild(Vec<SmolStr>),
    #[error("Duplicate instruction code")]
    DuplicateInstructionCode,
    #[error("Instruction not allowed inside an end group")]
    InvalidInstructionInEndGroup,
}

impl InstructionError {
    pub fn name(&self) -> &'static str {
        match self {
            InstructionError::ForwardDependency(_) => "ForwardDependency",
            InstructionError::ScriptError { .. } => "ScriptError",
            InstructionError::InvalidSkipReference(_) => "InvalidSkipReference",
            InstructionError::SkipToEndOfEndGroup => "SkipToEndOfEndGroup",
            InstructionError::InvalidReference { .. } => "InvalidReference",
            InstructionError::InvalidChildReferences(_) => "InvalidChildReferences",
            InstructionError::PriorityLimitMismatch => "PriorityLimitMismatch",
            InstructionError::DuplicatePriorityGroupItems(_) => "DuplicatePriorityGroupItems",
            InstructionError::PriorityGroupItemNotChild(_) => "PriorityGroupItemNotChild",
            InstructionError::InvalidPriorityItem(_) => "InvalidPriorityItem",
            InstructionError::InvalidRandomItem(_) => "InvalidRandomItem",
            InstructionError::DuplicateRandomGroupItems(_) => "DuplicateRandomGroupItems",
            InstructionError::RandomGroupItemNotChild(_) => "RandomGroupItemNotChild",
            InstructionError::DuplicateInstructionCode => "DuplicateInstructionCode",
            InstructionError::InvalidInstructionInEndGroup => "InvalidInstructionInEndGroup",
        }
    }
}

impl Serialize for InstructionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            InstructionError::ForwardDependency(dependency) => map.serialize_entry("dependency", dependency)?,
            InstructionError::ScriptError { message, start, end } => {
                map.serialize_entry("message", message)?;
                map.serialize_entry("start", start)?;
                map.serialize_entry("end", end)?;
            }
            InstructionError::InvalidSkipReference(component) => map.serialize_entry("component", component)?,
            InstructionError::InvalidReference {
                reference,
                invalid_component,
            } => {
                map.serialize_entry("reference", reference)?;
                map.serialize_entry("invalidComponent", invalid_component)?;
            }
            InstructionError::InvalidChildReferences(items)
            | InstructionError::DuplicatePriorityGroupItems(items)
            | InstructionError::PriorityGroupItemNotChild(items)
            | InstructionError::InvalidPriorityItem(items)
            | InstructionError::InvalidRandomItem(items)
            | InstructionError::DuplicateRandomGroupItems(items)
            | InstructionError::RandomGroupItemNotChild(items) => map.serialize_entry("items", items)?,
            InstructionError::SkipToEndOfEndGroup
            | InstructionError::PriorityLimitMismatch
            | InstructionError::DuplicateInstructionCode
            | InstructionError::InvalidInstructionInEndGroup => {}
        }
        map.serialize_entry("name", self.name())?;
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstructionError {
    name: String,
    #[serde(default)]
    items: Vec<SmolStr>,
    dependency: Option<Dependency>,
    message: Option<String>,
    start: Option<usize>,
    end: Option<usize>,
    component: Option<SmolStr>,
    reference: Option<String>,
    #[serde(default)]
    invalid_component: bool,
}

impl TryFrom<RawInstructionError> for InstructionError {
    type Error = String;

    fn try_from(raw: RawInstructionError) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("`{}` requires field `{field}`", raw.name);
        let error = match raw.name.as_str() {
            "ForwardDependency" => InstructionError::ForwardDependency(raw.dependency.ok_or_else(|| missing("dependency"))?),
            "ScriptError" => InstructionError::ScriptError {
                message: raw.message.unwrap_or_default(),
                start: raw.start.unwrap_or_default(),
                end: raw.end.unwrap_or_default(),
            },
            "InvalidSkipReference" => InstructionError::InvalidSkipReference(raw.component.ok_or_else(|| missing("component"))?),
            "SkipToEndOfEndGroup" => InstructionError::SkipToEndOfEndGroup,
            "InvalidReference" => InstructionError::InvalidReference {
                reference: raw.reference.ok_or_else(|| missing("reference"))?,
                invalid_component: raw.invalid_component,
            },
            "InvalidChildReferences" => InstructionError::InvalidChildReferences(raw.items),
            // Older outputs used this name for the limit check.
            "PriorityLimitMismatch" | "DuplicateLimitMismatch" => InstructionError::PriorityLimitMismatch,
            "DuplicatePriorityGroupItems" => InstructionError::DuplicatePriorityGroupItems(raw.items),
            "PriorityGroupItemNotChild" => InstructionError::PriorityGroupItemNotChild(raw.items),
            "InvalidPriorityItem" => InstructionError::InvalidPriorityItem(raw.items),
            "InvalidRandomItem" => InstructionError::InvalidRandomItem(raw.items),
            "DuplicateRandomGroupItems" => InstructionError::DuplicateRandomGroupItems(raw.items),
            "RandomGroupItemNotChild" => InstructionError::RandomGroupItemNotChild(raw.items),
            "DuplicateInstructionCode" => InstructionError::DuplicateInstructionCode,
            "InvalidInstructionInEndGroup" => InstructionError::InvalidInstructionInEndGroup,
            name => return Err(format!("unknown instruction error `{name}`")),
        };
        Ok(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservedCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::items(
        InstructionError::RandomGroupItemNotChild(vec![SmolStr::new("A1"), SmolStr::new("A2")]),
        r#"{"items":["A1","A2"],"name":"RandomGroupItemNotChild"}"#
    )]
    #[case::script_error(
        InstructionError::ScriptError { message: "error message".to_string(), start: 5, end: 120 },
        r#"{"message":"error message","start":5,"end":120,"name":"ScriptError"}"#
    )]
    #[case::forward_dependency(
        InstructionError::ForwardDependency(Dependency::new("G1Q1", ReservedCode::Value)),
        r#"{"dependency":{"componentCode":"G1Q1","reservedCode":"value"},"name":"ForwardDependency"}"#
    )]
    #[case::unit(InstructionError::SkipToEndOfEndGroup, r#"{"name":"SkipToEndOfEndGroup"}"#)]
    #[case::skip_reference(
        InstructionError::InvalidSkipReference(SmolStr::new("G7")),
        r#"{"component":"G7","name":"InvalidSkipReference"}"#
    )]
    #[case::reference_to_component(
        InstructionError::InvalidReference { reference: "Q9.label".to_string(), invalid_component: true },
        r#"{"reference":"Q9.label","invalidComponent":true,"name":"InvalidReference"}"#
    )]
    #[case::reference_to_slot(
        InstructionError::InvalidReference { reference: "Q1.colour".to_string(), invalid_component: false },
        r#"{"reference":"Q1.colour","invalidComponent":false,"name":"InvalidReference"}"#
    )]
    #[case::child_references(
        InstructionError::InvalidChildReferences(vec![SmolStr::new("A9")]),
        r#"{"items":["A9"],"name":"InvalidChildReferences"}"#
    )]
    #[case::priority_limit(InstructionError::PriorityLimitMismatch, r#"{"name":"PriorityLimitMismatch"}"#)]
    #[case::duplicate_priority_items(
        InstructionError::DuplicatePriorityGroupItems(vec![SmolStr::new("A1")]),
        r#"{"items":["A1"],"name":"DuplicatePriorityGroupItems"}"#
    )]
    #[case::priority_item_not_child(
        InstructionError::PriorityGroupItemNotChild(vec![SmolStr::new("A5"), SmolStr::new("A6")]),
        r#"{"items":["A5","A6"],"name":"PriorityGroupItemNotChild"}"#
    )]
    #[case::invalid_priority_item(
        InstructionError::InvalidPriorityItem(vec![SmolStr::new("A2")]),
        r#"{"items":["A2"],"name":"InvalidPriorityItem"}"#
    )]
    #[case::invalid_random_item(
        InstructionError::InvalidRandomItem(vec![SmolStr::new("A3")]),
        r#"{"items":["A3"],"name":"InvalidRandomItem"}"#
    )]
    #[case::duplicate_random_items(
        InstructionError::DuplicateRandomGroupItems(vec![SmolStr::new("A1"), SmolStr::new("A2")]),
        r#"{"items":["A1","A2"],"name":"DuplicateRandomGroupItems"}"#
    )]
    #[case::duplicate_instruction(
        InstructionError::DuplicateInstructionCode,
        r#"{"name":"DuplicateInstructionCode"}"#
    )]
    #[case::end_group_instruction(
        InstructionError::InvalidInstructionInEndGroup,
        r#"{"name":"InvalidInstructionInEndGroup"}"#
    )]
    fn test_serialize(#[case] error: InstructionError, #[case] expected: &str) {
        let serialized = serde_json::to_string(&error).unwrap();
        assert_eq!(serialized, expected);
        let parsed: InstructionError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(parsed, error);
    }

    #[test]
    fn test_deserialize_legacy_limit_name() {
        let parsed: InstructionError = serde_json::from_value(json!({"name": "DuplicateLimitMismatch"})).unwrap();
        assert_eq!(parsed, InstructionError::PriorityLimitMismatch);
    }

    #[test]
    fn test_deserialize_unknown_name() {
        let parsed = serde_json::from_value::<InstructionError>(json!({"name": "Nope"}));
        assert!(parsed.is_err());
    }
}
