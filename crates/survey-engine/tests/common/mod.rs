#![allow(dead_code)]

use std::cell::Cell;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value, json};
use survey_engine::Result;
use survey_engine::model::{Group, GroupType, Instruction, Question, ReservedCode, SimpleState, SkipInstruction, Survey};
use survey_engine::script::{EvaluationInput, ScriptEngine, ScriptValidationError, ScriptValidationInput};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("survey_engine=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Script engine understanding `true`, `false`, numbers, string literals, `Code.slot`
/// lookups, `!`, `==`, `!=` and flat `&&` / `||` chains.
#[derive(Default)]
pub struct FakeScriptEngine {
    errors: FxHashMap<String, Vec<ScriptValidationError>>,
    drop_results: bool,
    validate_calls: Cell<usize>,
}

impl FakeScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `message` for every submitted script equal to `script`.
    pub fn with_error(mut self, script: &str, message: &str) -> Self {
        self.errors.entry(script.to_string()).or_default().push(ScriptValidationError {
            message: message.to_string(),
            start: 0,
            end: script.len(),
        });
        self
    }

    /// Answers validation with one result less than requested.
    pub fn dropping_results(mut self) -> Self {
        self.drop_results = true;
        self
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.get()
    }
}

impl ScriptEngine for FakeScriptEngine {
    fn validate(&self, items: &[ScriptValidationInput]) -> Result<Vec<Vec<ScriptValidationError>>> {
        self.validate_calls.set(self.validate_calls.get() + 1);
        let mut results = items
            .iter()
            .map(|item| self.errors.get(&item.script).cloned().unwrap_or_default())
            .collect::<Vec<_>>();
        if self.drop_results {
            results.pop();
        }
        Ok(results)
    }

    fn evaluate(&self, input: &EvaluationInput) -> Result<Value> {
        let mut env = input
            .values
            .iter()
            .map(|(key, typed)| (key.clone(), typed.value.clone()))
            .collect::<IndexMap<_, _>>();
        let mut result = Map::new();
        for (key, value) in &env {
            if let Some((component, slot)) = key.split_once('.') {
                insert(&mut result, component, slot, value.clone());
            }
        }
        for item in &input.sequence {
            let value = eval(&item.instruction.script(), &env);
            env.insert(format!("{}.{}", item.component_code, item.instruction.code), value.clone());
            insert(&mut result, &item.component_code, &item.instruction.code, value);
        }
        for item in &input.format_instructions {
            let value = Value::String(item.instruction.text.clone());
            insert(&mut result, &item.component_code, &item.instruction.code, value);
        }
        Ok(Value::Object(result))
    }
}

fn insert(result: &mut Map<String, Value>, component: &str, slot: &str, value: Value) {
    if let Value::Object(slots) = result.entry(component.to_string()).or_insert_with(|| json!({})) {
        slots.insert(slot.to_string(), value);
    }
}

fn eval(script: &str, env: &IndexMap<String, Value>) -> Value {
    if script.contains("||") {
        return Value::Bool(script.split("||").any(|term| truthy(&eval(term, env))));
    }
    if script.contains("&&") {
        return Value::Bool(script.split("&&").all(|term| truthy(&eval(term, env))));
    }
    let term = script.trim();
    if let Some((left, right)) = term.split_once("!=") {
        return Value::Bool(eval(left, env) != eval(right, env));
    }
    if let Some((left, right)) = term.split_once("==") {
        return Value::Bool(eval(left, env) == eval(right, env));
    }
    if let Some(negated) = term.strip_prefix('!') {
        return Value::Bool(!truthy(&eval(negated, env)));
    }
    serde_json::from_str(term).unwrap_or_else(|_| env.get(term).cloned().unwrap_or(Value::Null))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(value) => *value,
        Value::Null => false,
        _ => true,
    }
}

pub fn state(text: &str, code: ReservedCode) -> Instruction {
    SimpleState::new(text, code).into()
}

pub fn skip(code: &str, target: &str, condition: &str) -> Instruction {
    SkipInstruction::new(code, target)
        .map(|skip| skip.with_condition(condition))
        .expect("valid skip code")
        .into()
}

/// G1 (Q1, Q2 shown when `Q1` is "yes"), G2 (Q3 skipping to the END group when it is
/// "stop"), G3 (Q4) and the END group G9.
pub fn questionnaire() -> Survey {
    Survey::new(
        Vec::new(),
        vec![
            Group::new("G1").with_questions(vec![
                Question::new("Q1").with_instructions(vec![state("", ReservedCode::Value)]),
                Question::new("Q2").with_instructions(vec![
                    state("", ReservedCode::Value),
                    state("Q1.value == \"yes\"", ReservedCode::ConditionalRelevance),
                ]),
            ]),
            Group::new("G2").with_questions(vec![Question::new("Q3").with_instructions(vec![
                state("", ReservedCode::Value),
                state("Q3.value != \"\"", ReservedCode::Validity),
                skip("skip_to_end", "G9", "Q3.value == \"stop\""),
            ])]),
            Group::new("G3").with_questions(vec![Question::new("Q4").with_instructions(vec![state("", ReservedCode::Value)])]),
            Group::new("G9").with_group_type(GroupType::End),
        ],
    )
}
