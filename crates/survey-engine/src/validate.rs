//! Binder/Validator: annotates a survey with authoring errors and binds derived slots.
//!
//! Each pass reads a flattened view of the current tree and records errors by pre-order
//! position; [`Annotations::apply`] rebuilds the tree with them before the next pass runs.
//! Authoring errors never abort validation; only a failing script engine does.
mod bind;
mod forward;
mod index;
mod instructions;
mod references;
mod schema;
mod skip;
mod structure;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::dependency::DependencyMapper;
use crate::error::{EngineError, Result};
use crate::model::{
    ComponentError, ComponentTree, Dependent, InstructionError, NodeEdit, Survey, SurveyComponent,
};
use crate::script::{ScriptEngine, ScriptValidationInput};

pub use index::{ComponentIndex, component_indices};
pub use schema::response_schema;
pub use skip::{SkipManifest, SkipMap, skip_map};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationOptions {
    /// Report `NO_END_GROUP` when the survey has no END group.
    pub require_end_group: bool,
}

#[derive(Debug, Clone)]
pub struct BindingOutput {
    /// Annotated survey including the bound slots.
    pub survey: Survey,
    /// Dependencies of the sanitized survey.
    pub dependency_mapper: DependencyMapper,
    pub component_indices: Vec<ComponentIndex>,
    pub skip_map: SkipMap,
}

pub struct Binder<'a> {
    script_engine: &'a dyn ScriptEngine,
    options: ValidationOptions,
}

impl<'a> Binder<'a> {
    pub fn new(script_engine: &'a dyn ScriptEngine) -> Self {
        Self {
            script_engine,
            options: ValidationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn bind(&self, survey: &Survey) -> Result<BindingOutput> {
        let survey = drop_duplicate_instructions(&survey.clear_errors());

        let survey = self.run_pass(&survey, "structure", |tree, annotations| {
            structure::check(tree, self.options, annotations)
        });
        let survey = self.run_pass(&survey, "instructions", instructions::check);
        let survey = bind::bind_reserved_slots(&survey);
        let survey = self.run_pass(&survey, "skip", |tree, annotations| {
            let indices = index::index_by_code(tree);
            skip::check(tree, &indices, annotations)
        });
        let survey = self.run_pass(&survey, "references", references::check);
        let runtime = ComponentTree::from_survey(&survey.sanitize());
        let mapper = DependencyMapper::new(runtime.components());
        let survey = self.run_pass(&survey, "forward", |tree, annotations| {
            forward::check(&runtime, &mapper, tree, annotations)
        });
        let survey = self.validate_scripts(&survey)?;

        let mut survey = survey;
        loop {
            let tree = ComponentTree::from_survey(&survey);
            let mut annotations = Annotations::default();
            references::check(&tree, &mut annotations);
            if annotations.is_empty() {
                break;
            }
            survey = annotations.apply(&survey);
        }

        let runtime = ComponentTree::from_survey(&survey.sanitize());
        let output = BindingOutput {
            dependency_mapper: DependencyMapper::new(runtime.components()),
            component_indices: component_indices(&runtime),
            skip_map: skip_map(&runtime),
            survey,
        };
        tracing::debug!(
            has_errors = output.survey.has_errors(),
            dependents = output.dependency_mapper.dependency_map().len(),
            "survey bound"
        );
        Ok(output)
    }

    fn run_pass(&self, survey: &Survey, name: &str, pass: impl FnOnce(&ComponentTree, &mut Annotations)) -> Survey {
        let tree = ComponentTree::from_survey(survey);
        let mut annotations = Annotations::default();
        pass(&tree, &mut annotations);
        tracing::trace!(pass = name, errors = annotations.len(), "validation pass finished");
        if annotations.is_empty() {
            survey.clone()
        } else {
            annotations.apply(survey)
        }
    }

    /// Submits every error-free computed instruction of the runtime survey in one batch.
    fn validate_scripts(&self, survey: &Survey) -> Result<Survey> {
        let tree = ComponentTree::from_survey(survey);
        let runtime = ComponentTree::from_survey(&survey.sanitize());
        let mapper = DependencyMapper::new(runtime.components());

        let mut targets = Vec::new();
        let mut items = Vec::new();
        for (position, component) in tree.iter().enumerate() {
            if is_excluded(&tree, &component.code) {
                continue;
            }
            for instruction in component.instruction_list.iter().filter(|i| !i.has_errors()) {
                let Some(runnable) = instruction.runnable() else {
                    continue;
                };
                let dependent = Dependent::new(component.code.clone(), instruction.code());
                let allowed_variables = mapper
                    .dependencies(&dependent)
                    .iter()
                    .filter(|dependency| dependency.reserved_code.is_accessible())
                    .map(|dependency| dependency.to_value_key())
                    .collect();
                items.push(ScriptValidationInput {
                    script: runnable.script().into_owned(),
                    allowed_variables,
                });
                targets.push((position, runnable.code));
            }
        }

        tracing::debug!(items = items.len(), "validating scripts");
        let results = self.script_engine.validate(&items)?;
        if results.len() != items.len() {
            return Err(EngineError::ScriptEngine(format!(
                "expected {} validation results, got {}",
                items.len(),
                results.len()
            )));
        }

        let mut annotations = Annotations::default();
        for ((position, code), errors) in targets.into_iter().zip(results) {
            for error in errors {
                annotations.instruction(position, &code, error.into());
            }
        }
        tracing::trace!(pass = "script", errors = annotations.len(), "validation pass finished");
        Ok(annotations.apply(survey))
    }
}

/// Errors keyed by pre-order component position.
#[derive(Debug, Default)]
pub(crate) struct Annotations {
    component_errors: FxHashMap<usize, Vec<ComponentError>>,
    instruction_errors: FxHashMap<(usize, SmolStr), Vec<InstructionError>>,
}

impl Annotations {
    pub(crate) fn component(&mut self, position: usize, error: ComponentError) {
        let errors = self.component_errors.entry(position).or_default();
        if !errors.contains(&error) {
            errors.push(error);
        }
    }

    pub(crate) fn instruction(&mut self, position: usize, code: &str, error: InstructionError) {
        let errors = self.instruction_errors.entry((position, SmolStr::new(code))).or_default();
        if !errors.contains(&error) {
            errors.push(error);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.component_errors.is_empty() && self.instruction_errors.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.component_errors.values().map(Vec::len).sum::<usize>()
            + self.instruction_errors.values().map(Vec::len).sum::<usize>()
    }

    pub(crate) fn apply(&self, survey: &Survey) -> Survey {
        let mut position = 0;
        survey.rewrite("", &mut |view| {
            let current = position;
            position += 1;
            let mut errors = view.errors.to_vec();
            for error in self.component_errors.get(&current).into_iter().flatten() {
                if !errors.contains(error) {
                    errors.push(*error);
                }
            }
            let instruction_list = view
                .instruction_list
                .iter()
                .map(|instruction| {
                    let key = (current, SmolStr::new(instruction.code()));
                    let mut instruction = instruction.clone();
                    for error in self.instruction_errors.get(&key).into_iter().flatten() {
                        instruction.push_error(error.clone());
                    }
                    instruction
                })
                .collect();
            NodeEdit {
                instruction_list: Some(instruction_list),
                errors: Some(errors),
                children: None,
            }
        })
    }
}

/// A component is excluded from the runtime survey when it or an ancestor carries a
/// component error.
pub(crate) fn is_excluded(tree: &ComponentTree, code: &str) -> bool {
    match tree.get(code) {
        Some(component) => {
            !component.errors.is_empty() || tree.parents(code).iter().any(|parent| !parent.errors.is_empty())
        }
        None => true,
    }
}

/// Keeps the first instruction of every code on each component.
fn drop_duplicate_instructions(survey: &Survey) -> Survey {
    survey.rewrite("", &mut |view| {
        let mut seen = FxHashSet::default();
        NodeEdit {
            instruction_list: Some(
                view.instruction_list
                    .iter()
                    .filter(|instruction| seen.insert(SmolStr::new(instruction.code())))
                    .cloned()
                    .collect(),
            ),
            ..NodeEdit::default()
        }
    })
}
