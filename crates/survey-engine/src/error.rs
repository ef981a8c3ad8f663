use miette::Diagnostic;
use thiserror::Error;

use crate::model::Dependency;

/// Result type for survey engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Fatal engine errors.
///
/// Authoring mistakes are never reported through this type; they are attached to the
/// offending components and instructions as [`crate::model::ComponentError`] and
/// [`crate::model::InstructionError`] values. An `EngineError` means the engine could not
/// produce an output at all.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("Survey has errors and cannot be navigated")]
    #[diagnostic(
        code(survey_engine::survey_has_errors),
        help("Run validation and fix the reported component and instruction errors")
    )]
    SurveyHasErrors,

    #[error("Script engine failure: {0}")]
    #[diagnostic(code(survey_engine::script_engine))]
    ScriptEngine(String),

    #[error("Dependency cycle between {}", format_dependencies(.0))]
    #[diagnostic(code(survey_engine::sequence_cycle))]
    SequenceCycle(Vec<Dependency>),

    #[error("Invalid evaluation result: {0}")]
    #[diagnostic(code(survey_engine::invalid_evaluation_result))]
    InvalidEvaluationResult(String),

    #[error("Invalid code `{code}` for {element}")]
    #[diagnostic(code(survey_engine::invalid_code))]
    InvalidCode { code: String, element: String },

    #[error("Invalid instruction: {0}")]
    #[diagnostic(code(survey_engine::invalid_instruction))]
    InvalidInstruction(String),

    #[error(transparent)]
    #[diagnostic(code(survey_engine::json))]
    Json(#[from] serde_json::Error),
}

fn format_dependencies(dependencies: &[Dependency]) -> String {
    dependencies.iter().map(|d| d.to_value_key()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservedCode;
    use rstest::rstest;

    #[rstest]
    #[case::survey_has_errors(EngineError::SurveyHasErrors, "Survey has errors and cannot be navigated")]
    #[case::cycle(
        EngineError::SequenceCycle(vec![
            Dependency::new("Q1", ReservedCode::Relevance),
            Dependency::new("Q2", ReservedCode::Value),
        ]),
        "Dependency cycle between Q1.relevance, Q2.value"
    )]
    #[case::invalid_code(
        EngineError::InvalidCode { code: "X1".to_string(), element: "GROUP".to_string() },
        "Invalid code `X1` for GROUP"
    )]
    fn test_display(#[case] error: EngineError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }
}
