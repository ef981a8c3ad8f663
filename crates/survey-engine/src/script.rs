//! Contract with the external script engine.
//!
//! The engine never parses or runs expression text itself. Both calls are batched: one
//! `validate` per validation pass and one `evaluate` per navigation step.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::Result;
use crate::model::{ComponentInstruction, InstructionError, ReturnType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptValidationInput {
    pub script: String,
    /// Value keys (`Q1.value`) the script may read.
    pub allowed_variables: Vec<String>,
}

/// Error reported by the script engine; offsets index the submitted script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptValidationError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl From<ScriptValidationError> for InstructionError {
    fn from(error: ScriptValidationError) -> Self {
        InstructionError::ScriptError {
            message: error.message,
            start: error.start,
            end: error.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    pub value: Value,
    pub return_type: ReturnType,
}

/// One batched evaluation request.
///
/// `sequence` holds the states in the order they must be computed; `format_instructions`
/// are the references, evaluated after every state. The result is a JSON object of
/// `{componentCode: {slotOrInstructionCode: value}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInput {
    pub values: IndexMap<String, TypedValue>,
    pub sequence: Vec<ComponentInstruction>,
    pub format_instructions: Vec<ComponentInstruction>,
    pub codes: Vec<SmolStr>,
}

pub trait ScriptEngine {
    /// Returns one error list per item, in submission order.
    fn validate(&self, items: &[ScriptValidationInput]) -> Result<Vec<Vec<ScriptValidationError>>>;

    fn evaluate(&self, input: &EvaluationInput) -> Result<Value>;
}

impl<T: ScriptEngine + ?Sized> ScriptEngine for &T {
    fn validate(&self, items: &[ScriptValidationInput]) -> Result<Vec<Vec<ScriptValidationError>>> {
        (**self).validate(items)
    }

    fn evaluate(&self, input: &EvaluationInput) -> Result<Value> {
        (**self).evaluate(input)
    }
}

impl<T: ScriptEngine + ?Sized> ScriptEngine for Box<T> {
    fn validate(&self, items: &[ScriptValidationInput]) -> Result<Vec<Vec<ScriptValidationError>>> {
        (**self).validate(items)
    }

    fn evaluate(&self, input: &EvaluationInput) -> Result<Value> {
        (**self).evaluate(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunnableInstruction;
    use serde_json::json;

    #[test]
    fn test_evaluation_input_wire_format() {
        let input = EvaluationInput {
            values: IndexMap::from_iter([(
                "Q1.value".to_string(),
                TypedValue {
                    value: json!("1"),
                    return_type: ReturnType::String,
                },
            )]),
            sequence: vec![ComponentInstruction {
                component_code: SmolStr::new("Q2"),
                instruction: RunnableInstruction {
                    code: SmolStr::new("relevance"),
                    text: "Q1.value == \"1\"".to_string(),
                    return_type: ReturnType::Boolean,
                    is_active: true,
                },
            }],
            format_instructions: Vec::new(),
            codes: vec![SmolStr::new("Q1"), SmolStr::new("Q2")],
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "values": {"Q1.value": {"value": "1", "returnType": "string"}},
                "sequence": [{
                    "componentCode": "Q2",
                    "instruction": {"code": "relevance", "text": "Q1.value == \"1\"", "returnType": "boolean", "isActive": true}
                }],
                "formatInstructions": [],
                "codes": ["Q1", "Q2"]
            })
        );
    }

    #[test]
    fn test_script_error_conversion() {
        let error = ScriptValidationError {
            message: "unexpected token".to_string(),
            start: 3,
            end: 4,
        };
        assert_eq!(
            InstructionError::from(error),
            InstructionError::ScriptError {
                message: "unexpected token".to_string(),
                start: 3,
                end: 4
            }
        );
    }
}
