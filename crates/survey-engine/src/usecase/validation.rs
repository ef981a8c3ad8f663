use serde::{Deserialize, Serialize};

use crate::dependency::{DependencyMapper, to_string_impact_map};
use crate::error::Result;
use crate::model::{ComponentInstruction, ComponentTree, ResponseField, StringImpactMap, Survey, SurveyComponent};
use crate::script::ScriptEngine;
use crate::sequence::ContextRunner;
use crate::validate::{Binder, ComponentIndex, SkipMap, ValidationOptions, response_schema};

/// Everything a host keeps from validating a survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutput {
    /// The survey annotated with every authoring error and the bound slots.
    pub survey: Survey,
    pub impact_map: StringImpactMap,
    pub schema: Vec<ResponseField>,
    /// Sequenced runtime states, for precompilation.
    pub script: Vec<ComponentInstruction>,
    pub component_indices: Vec<ComponentIndex>,
    pub skip_map: SkipMap,
}

impl ValidationOutput {
    pub fn dependency_mapper(&self) -> Result<DependencyMapper> {
        DependencyMapper::from_string_impact_map(&self.impact_map)
    }
}

pub struct ValidationUseCase<'a> {
    script_engine: &'a dyn ScriptEngine,
    survey: Survey,
    options: ValidationOptions,
}

impl<'a> ValidationUseCase<'a> {
    /// Fails when a component code does not match the pattern of its element type.
    pub fn new(script_engine: &'a dyn ScriptEngine, survey: Survey) -> Result<Self> {
        survey.check_codes()?;
        Ok(Self {
            script_engine,
            survey,
            options: ValidationOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<ValidationOutput> {
        let binding = Binder::new(self.script_engine)
            .with_options(self.options)
            .bind(&self.survey)?;

        let runtime = ComponentTree::from_survey(&binding.survey.sanitize());
        let script = ContextRunner::new(&runtime, &binding.dependency_mapper).runtime_script()?;
        let output = ValidationOutput {
            impact_map: to_string_impact_map(binding.dependency_mapper.impact_map()),
            schema: response_schema(&runtime),
            script,
            component_indices: binding.component_indices,
            skip_map: binding.skip_map,
            survey: binding.survey,
        };
        tracing::debug!(
            has_errors = output.survey.has_errors(),
            fields = output.schema.len(),
            states = output.script.len(),
            "survey validated"
        );
        Ok(output)
    }
}
