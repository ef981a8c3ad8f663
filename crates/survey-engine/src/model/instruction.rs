use std::borrow::Cow;

use itertools::Itertools;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use smol_str::SmolStr;

use super::{Dependency, InstructionError, ReservedCode, ReturnType, codes};
use crate::error::{EngineError, Result};

pub const RANDOM_GROUP_CODE: &str = "random_group";
pub const PRIORITY_GROUPS_CODE: &str = "priority_groups";
pub const PARENT_RELEVANCE_CODE: &str = "parent_relevance";

/// A unit of behaviour attached to a component.
///
/// `SimpleState` and `Skip` are states: they compute a reserved slot of their owner.
/// `Reference` is computed like a state but produces a format binding instead of a slot.
/// The group instructions only shape the children of their owner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawInstruction")]
pub enum Instruction {
    SimpleState(SimpleState),
    Skip(SkipInstruction),
    Reference(Reference),
    RandomGroups(RandomGroups),
    PriorityGroups(PriorityGroups),
    ParentRelevance(ParentRelevance),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleState {
    pub reserved_code: ReservedCode,
    pub text: String,
    pub return_type: ReturnType,
    pub is_active: bool,
    pub errors: Vec<InstructionError>,
}

impl SimpleState {
    pub fn new(text: impl Into<String>, reserved_code: ReservedCode) -> Self {
        Self {
            text: text.into(),
            return_type: reserved_code.default_return_type(),
            is_active: reserved_code.default_is_active(),
            reserved_code,
            errors: Vec::new(),
        }
    }

    pub fn with_return_type(mut self, return_type: ReturnType) -> Result<Self> {
        if !self.reserved_code.accepts_return_type(return_type) {
            return Err(EngineError::InvalidInstruction(format!(
                "`{}` must return {}",
                self.reserved_code,
                self.reserved_code.default_return_type()
            )));
        }
        self.return_type = return_type;
        Ok(self)
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// Conditional jump to a later group or question.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipInstruction {
    pub code: SmolStr,
    pub skip_to_component: SmolStr,
    pub condition: String,
    pub to_end: bool,
    pub is_active: bool,
    pub errors: Vec<InstructionError>,
}

impl SkipInstruction {
    pub fn new(code: impl Into<SmolStr>, skip_to_component: impl Into<SmolStr>) -> Result<Self> {
        let code = code.into();
        if !codes::is_skip_code(&code) {
            return Err(EngineError::InvalidCode {
                code: code.to_string(),
                element: "skip instruction".to_string(),
            });
        }
        Ok(Self {
            code,
            skip_to_component: skip_to_component.into(),
            condition: "true".to_string(),
            to_end: false,
            is_active: true,
            errors: Vec::new(),
        })
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    pub fn with_to_end(mut self, to_end: bool) -> Self {
        self.to_end = to_end;
        self
    }

    pub fn reserved_code(&self) -> ReservedCode {
        ReservedCode::Skip(self.code.clone())
    }
}

/// Exposes slots of other components to text formatting, e.g. `Q1.label`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub code: SmolStr,
    pub references: Vec<String>,
    pub lang: String,
    pub errors: Vec<InstructionError>,
}

impl Reference {
    pub fn new(code: impl Into<SmolStr>, references: Vec<String>, lang: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if !codes::is_reference_code(&code) {
            return Err(EngineError::InvalidCode {
                code: code.to_string(),
                element: "reference instruction".to_string(),
            });
        }
        Ok(Self {
            code,
            references,
            lang: lang.into(),
            errors: Vec::new(),
        })
    }

    /// Script producing a map of the referenced slots, e.g. `{Q1: {label : Q1.label}}`.
    pub fn text(&self) -> String {
        let entries = self
            .references
            .iter()
            .filter_map(|reference| reference.split_once('.'))
            .into_group_map_by(|(component, _)| *component);
        let body = self
            .references
            .iter()
            .filter_map(|reference| reference.split_once('.').map(|(component, _)| component))
            .unique()
            .filter_map(|component| {
                entries.get(component).map(|slots| {
                    let slots = slots
                        .iter()
                        .map(|(component, slot)| format!("{slot} : {component}.{slot}"))
                        .join(", ");
                    format!("{component}: {{{slots}}}")
                })
            })
            .join(", ");
        format!("{{{body}}}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RandomOption {
    #[default]
    Random,
    Alpha,
    Flip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomGroup {
    pub codes: Vec<SmolStr>,
    #[serde(default)]
    pub random_option: RandomOption,
}

impl RandomGroup {
    pub fn new(codes: Vec<SmolStr>, random_option: RandomOption) -> Self {
        Self { codes, random_option }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RandomGroups {
    pub groups: Vec<RandomGroup>,
    pub errors: Vec<InstructionError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPriority {
    pub code: SmolStr,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl ChildPriority {
    pub fn new(code: impl Into<SmolStr>, weight: f32) -> Self {
        Self {
            code: code.into(),
            weight,
        }
    }
}

/// Weighted children of which only the top `limit + 1` are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPriorityGroup")]
pub struct PriorityGroup {
    pub weights: Vec<ChildPriority>,
    pub limit: i64,
}

impl PriorityGroup {
    /// Group keeping every child.
    pub fn new(weights: Vec<ChildPriority>) -> Self {
        let limit = weights.len() as i64 - 1;
        Self { weights, limit }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_limit_valid(&self) -> bool {
        (0..self.weights.len() as i64).contains(&self.limit)
    }
}

#[derive(Deserialize)]
struct RawPriorityGroup {
    weights: Vec<ChildPriority>,
    limit: Option<i64>,
}

impl From<RawPriorityGroup> for PriorityGroup {
    fn from(raw: RawPriorityGroup) -> Self {
        match raw.limit {
            Some(limit) => PriorityGroup::new(raw.weights).with_limit(limit),
            None => PriorityGroup::new(raw.weights),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriorityGroups {
    pub priorities: Vec<PriorityGroup>,
    pub errors: Vec<InstructionError>,
}

/// Parent relevance derived from children: an AND over groups, each an OR over its children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParentRelevance {
    pub children: Vec<Vec<SmolStr>>,
    pub errors: Vec<InstructionError>,
}

/// Executable view of a state or reference instruction, as sent to the script engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnableInstruction {
    pub code: SmolStr,
    pub text: String,
    pub return_type: ReturnType,
    pub is_active: bool,
}

impl RunnableInstruction {
    /// Script actually evaluated: passive string slots are quoted literals and empty
    /// texts fall back to the slot default.
    pub fn script(&self) -> Cow<'_, str> {
        if self.text.trim().is_empty() {
            match ReservedCode::from_code(&self.code).and_then(|code| code.default_binding(self.return_type)) {
                Some(value) => Cow::Owned(value.to_string()),
                None => Cow::Borrowed(self.return_type.default_text_value()),
            }
        } else if !self.is_active && self.return_type == ReturnType::String {
            Cow::Owned(serde_json::Value::String(self.text.clone()).to_string())
        } else {
            Cow::Borrowed(&self.text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstruction {
    pub component_code: SmolStr,
    pub instruction: RunnableInstruction,
}

impl Instruction {
    pub fn code(&self) -> &str {
        match self {
            Instruction::SimpleState(state) => state.reserved_code.code(),
            Instruction::Skip(skip) => &skip.code,
            Instruction::Reference(reference) => &reference.code,
            Instruction::RandomGroups(_) => RANDOM_GROUP_CODE,
            Instruction::PriorityGroups(_) => PRIORITY_GROUPS_CODE,
            Instruction::ParentRelevance(_) => PARENT_RELEVANCE_CODE,
        }
    }

    pub fn errors(&self) -> &[InstructionError] {
        match self {
            Instruction::SimpleState(state) => &state.errors,
            Instruction::Skip(skip) => &skip.errors,
            Instruction::Reference(reference) => &reference.errors,
            Instruction::RandomGroups(groups) => &groups.errors,
            Instruction::PriorityGroups(groups) => &groups.errors,
            Instruction::ParentRelevance(relevance) => &relevance.errors,
        }
    }

    fn errors_mut(&mut self) -> &mut Vec<InstructionError> {
        match self {
            Instruction::SimpleState(state) => &mut state.errors,
            Instruction::Skip(skip) => &mut skip.errors,
            Instruction::Reference(reference) => &mut reference.errors,
            Instruction::RandomGroups(groups) => &mut groups.errors,
            Instruction::PriorityGroups(groups) => &mut groups.errors,
            Instruction::ParentRelevance(relevance) => &mut relevance.errors,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    pub fn push_error(&mut self, error: InstructionError) {
        let errors = self.errors_mut();
        if !errors.contains(&error) {
            errors.push(error);
        }
    }

    pub fn with_error(mut self, error: InstructionError) -> Self {
        self.push_error(error);
        self
    }

    pub fn clear_errors(&self) -> Self {
        let mut instruction = self.clone();
        instruction.errors_mut().clear();
        instruction
    }

    /// Slot computed by this instruction, for states only.
    pub fn reserved_code(&self) -> Option<ReservedCode> {
        match self {
            Instruction::SimpleState(state) => Some(state.reserved_code.clone()),
            Instruction::Skip(skip) => Some(skip.reserved_code()),
            _ => None,
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Instruction::SimpleState(_) | Instruction::Skip(_))
    }

    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Instruction::SimpleState(state) => Some(Cow::Borrowed(&state.text)),
            Instruction::Skip(skip) => Some(Cow::Borrowed(&skip.condition)),
            Instruction::Reference(reference) => Some(Cow::Owned(reference.text())),
            _ => None,
        }
    }

    pub fn return_type(&self) -> Option<ReturnType> {
        match self {
            Instruction::SimpleState(state) => Some(state.return_type),
            Instruction::Skip(_) => Some(ReturnType::Boolean),
            Instruction::Reference(_) => Some(ReturnType::Map),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Instruction::SimpleState(state) => state.is_active,
            Instruction::Skip(skip) => skip.is_active,
            Instruction::Reference(_) => true,
            _ => false,
        }
    }

    pub fn dependency(&self, component_code: &str) -> Option<Dependency> {
        self.reserved_code().map(|reserved_code| Dependency::new(component_code, reserved_code))
    }

    pub fn runnable(&self) -> Option<RunnableInstruction> {
        Some(RunnableInstruction {
            code: SmolStr::new(self.code()),
            text: self.text()?.into_owned(),
            return_type: self.return_type()?,
            is_active: self.is_active(),
        })
    }
}

impl From<SimpleState> for Instruction {
    fn from(state: SimpleState) -> Self {
        Instruction::SimpleState(state)
    }
}

impl From<SkipInstruction> for Instruction {
    fn from(skip: SkipInstruction) -> Self {
        Instruction::Skip(skip)
    }
}

impl From<Reference> for Instruction {
    fn from(reference: Reference) -> Self {
        Instruction::Reference(reference)
    }
}

impl Serialize for Instruction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("code", self.code())?;
        match self {
            Instruction::SimpleState(state) => {
                map.serialize_entry("text", &state.text)?;
                map.serialize_entry("returnType", &state.return_type)?;
                map.serialize_entry("isActive", &state.is_active)?;
            }
            Instruction::Skip(skip) => {
                map.serialize_entry("text", &skip.condition)?;
                map.serialize_entry("returnType", &ReturnType::Boolean)?;
                map.serialize_entry("isActive", &skip.is_active)?;
                map.serialize_entry("skipToComponent", &skip.skip_to_component)?;
                map.serialize_entry("condition", &skip.condition)?;
                map.serialize_entry("toEnd", &skip.to_end)?;
            }
            Instruction::Reference(reference) => {
                map.serialize_entry("references", &reference.references)?;
                map.serialize_entry("lang", &reference.lang)?;
            }
            Instruction::RandomGroups(groups) => map.serialize_entry("groups", &groups.groups)?,
            Instruction::PriorityGroups(groups) => map.serialize_entry("priorities", &groups.priorities)?,
            Instruction::ParentRelevance(relevance) => map.serialize_entry("children", &relevance.children)?,
        }
        if self.has_errors() {
            map.serialize_entry("errors", self.errors())?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstruction {
    code: String,
    text: Option<String>,
    return_type: Option<ReturnType>,
    is_active: Option<bool>,
    skip_to_component: Option<SmolStr>,
    condition: Option<String>,
    to_end: Option<bool>,
    references: Option<Vec<String>>,
    lang: Option<String>,
    groups: Option<Vec<RandomGroup>>,
    priorities: Option<Vec<PriorityGroup>>,
    children: Option<Vec<Vec<SmolStr>>>,
    #[serde(default)]
    errors: Vec<InstructionError>,
}

impl TryFrom<RawInstruction> for Instruction {
    type Error = EngineError;

    fn try_from(raw: RawInstruction) -> Result<Self> {
        let missing = |field: &str| EngineError::InvalidInstruction(format!("`{}` requires field `{field}`", raw.code));
        let instruction = match raw.code.as_str() {
            RANDOM_GROUP_CODE => Instruction::RandomGroups(RandomGroups {
                groups: raw.groups.ok_or_else(|| missing("groups"))?,
                errors: raw.errors,
            }),
            PRIORITY_GROUPS_CODE => Instruction::PriorityGroups(PriorityGroups {
                priorities: raw.priorities.ok_or_else(|| missing("priorities"))?,
                errors: raw.errors,
            }),
            PARENT_RELEVANCE_CODE => Instruction::ParentRelevance(ParentRelevance {
                children: raw.children.ok_or_else(|| missing("children"))?,
                errors: raw.errors,
            }),
            code if codes::is_reference_code(code) => {
                let mut reference = Reference::new(
                    code,
                    raw.references.ok_or_else(|| missing("references"))?,
                    raw.lang.unwrap_or_default(),
                )?;
                reference.errors = raw.errors;
                Instruction::Reference(reference)
            }
            code if codes::is_skip_code(code) => {
                let condition = raw.condition.or(raw.text).unwrap_or_else(|| "true".to_string());
                let mut skip = SkipInstruction::new(code, raw.skip_to_component.ok_or_else(|| missing("skipToComponent"))?)?
                    .with_condition(condition)
                    .with_to_end(raw.to_end.unwrap_or(false));
                skip.is_active = raw.is_active.unwrap_or(true);
                skip.errors = raw.errors;
                Instruction::Skip(skip)
            }
            code => {
                let reserved_code = ReservedCode::from_code(code)
                    .ok_or_else(|| EngineError::InvalidInstruction(format!("unknown instruction code `{code}`")))?;
                let mut state = SimpleState::new(raw.text.unwrap_or_default(), reserved_code);
                if let Some(return_type) = raw.return_type {
                    state = state.with_return_type(return_type)?;
                }
                if let Some(is_active) = raw.is_active {
                    state = state.with_active(is_active);
                }
                state.errors = raw.errors;
                Instruction::SimpleState(state)
            }
        };
        Ok(instruction)
    }
}
