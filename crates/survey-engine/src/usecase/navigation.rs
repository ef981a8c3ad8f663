use indexmap::IndexMap;
use itertools::Itertools;
use rand::Rng;
use serde_json::Value;
use smol_str::SmolStr;

use crate::config::{DEFAULT_LANG, SurveyMode, SurveyNavigationData};
use crate::error::{EngineError, Result};
use crate::model::{
    Bindings, ColumnName, ComponentTree, Dependency, Dependent, ElementType, FormatBindings, NavigationDirection,
    NavigationIndex, NavigationInfo, NavigationMode, RandomOption, ReservedCode, SURVEY_CODE, SimpleState, Survey,
    SurveyComponent, ValueMap,
};
use crate::navigate::{
    Navigator, apply_priorities, components_in_navigation, is_valid, randomize, reduce, set_priorities, sort_by_order,
};
use crate::script::{EvaluationInput, ScriptEngine, TypedValue};
use crate::sequence::ContextRunner;

use super::ValidationOutput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Language bound to the survey `lang` slot, [`DEFAULT_LANG`] when unset.
    pub lang: Option<String>,
    pub navigation_mode: NavigationMode,
    pub skip_invalid: bool,
    pub survey_mode: SurveyMode,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self::from(SurveyNavigationData::default())
    }
}

impl From<SurveyNavigationData> for NavigationOptions {
    fn from(data: SurveyNavigationData) -> Self {
        Self {
            lang: None,
            navigation_mode: data.navigation_mode,
            skip_invalid: data.skip_invalid,
            survey_mode: SurveyMode::default(),
        }
    }
}

/// State carried from [`NavigationUseCase::prepare`] to [`NavigationUseCase::complete`].
#[derive(Debug, Clone)]
pub struct PreparedNavigation {
    /// The request for the script engine.
    pub input: EvaluationInput,
    survey: Survey,
    startup_bindings: Bindings,
}

#[derive(Debug, Clone)]
pub struct NavigationOutput {
    pub navigation_index: NavigationIndex,
    /// The runtime survey with children sorted and priorities applied.
    pub ordered_survey: Survey,
    /// The ordered survey restricted to the new index.
    pub reduced_survey: Survey,
    pub state_bindings: Bindings,
    pub format_bindings: FormatBindings,
    /// Response values the host must persist.
    pub to_save: Bindings,
}

impl NavigationOutput {
    /// `to_save` keyed by value key (`Q1.value`).
    pub fn to_save_values(&self) -> ValueMap {
        self.to_save
            .iter()
            .map(|(dependency, value)| (dependency.to_value_key(), value.clone()))
            .collect()
    }
}

/// One navigation step of one respondent.
///
/// The step needs a single script engine round-trip. [`navigate`](Self::navigate) does
/// it in one call; hosts running the engine elsewhere use [`prepare`](Self::prepare) and
/// [`complete`](Self::complete).
pub struct NavigationUseCase<'a> {
    validation: &'a ValidationOutput,
    info: NavigationInfo,
    values: Bindings,
    labels: IndexMap<SmolStr, String>,
    options: NavigationOptions,
}

impl<'a> NavigationUseCase<'a> {
    pub fn new(validation: &'a ValidationOutput, info: NavigationInfo) -> Self {
        Self {
            validation,
            info,
            values: Bindings::default(),
            labels: IndexMap::new(),
            options: NavigationOptions::default(),
        }
    }

    /// Previously saved values keyed by value key. Unknown keys are ignored.
    pub fn with_values(mut self, values: ValueMap) -> Self {
        self.values = values
            .into_iter()
            .filter_map(|(key, value)| match Dependency::from_value_key(&key) {
                Some(dependency) => Some((dependency, value)),
                None => {
                    tracing::warn!(key, "ignoring value with an invalid key");
                    None
                }
            })
            .collect();
        self
    }

    /// Labels by qualified code, used for ALPHA ordering and `label` slots.
    pub fn with_labels(mut self, labels: IndexMap<SmolStr, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_options(mut self, options: NavigationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn navigate<R: Rng + ?Sized>(&self, script_engine: &dyn ScriptEngine, rng: &mut R) -> Result<NavigationOutput> {
        let prepared = self.prepare(rng)?;
        let result = script_engine.evaluate(&prepared.input)?;
        self.complete(prepared, &result)
    }

    /// Builds the evaluation request for this step.
    pub fn prepare<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PreparedNavigation> {
        if self.validation.survey.has_errors() {
            return Err(EngineError::SurveyHasErrors);
        }
        let lang = self.options.lang.as_deref().unwrap_or(DEFAULT_LANG);
        let survey = self
            .validation
            .survey
            .sanitize()
            .replace_or_add_instruction(SimpleState::new(lang, ReservedCode::Lang).into())
            .replace_or_add_instruction(SimpleState::new(self.options.survey_mode.as_str(), ReservedCode::Mode).into());

        let label = |code: &str| self.label(code);
        let (startup_bindings, alpha_bindings) = match self.info.navigation_direction {
            NavigationDirection::Start => {
                let mut startup = randomize(
                    &survey,
                    &[RandomOption::Random, RandomOption::Flip, RandomOption::Alpha],
                    label,
                    rng,
                );
                startup.extend(set_priorities(&survey, rng));
                (startup, Bindings::default())
            }
            _ => (Bindings::default(), randomize(&survey, &[RandomOption::Alpha], label, rng)),
        };

        let mut bindings = self.values.clone();
        bindings.extend(startup_bindings.clone());
        bindings.extend(alpha_bindings);
        bindings.extend(
            self.labels
                .iter()
                .map(|(code, label)| (Dependency::new(code.clone(), ReservedCode::Label), Value::from(label.as_str()))),
        );
        bindings.insert(Dependency::new(SURVEY_CODE, ReservedCode::Lang), Value::from(lang));
        bindings.insert(
            Dependency::new(SURVEY_CODE, ReservedCode::Mode),
            Value::from(self.options.survey_mode.as_str()),
        );
        for code in components_in_navigation(&survey, &all_in_one(&survey)) {
            bindings.insert(Dependency::new(code, ReservedCode::InCurrentNavigation), Value::Bool(true));
        }

        let tree = ComponentTree::from_survey(&survey);
        let mapper = self.validation.dependency_mapper()?;
        let runner = ContextRunner::new(&tree, &mapper);
        let sequence = runner.runtime_script()?;
        let format_instructions = runner.format_instructions();

        let values = bindings
            .into_iter()
            .filter_map(|(dependency, value)| {
                let return_type = runner.state(&dependency)?.return_type()?;
                Some((dependency.to_value_key(), TypedValue { value, return_type }))
            })
            .collect::<IndexMap<_, _>>();
        let codes = values
            .keys()
            .filter_map(|key| Dependency::from_value_key(key).map(|dependency| dependency.component_code))
            .chain(sequence.iter().map(|item| item.component_code.clone()))
            .chain(format_instructions.iter().map(|item| item.component_code.clone()))
            .unique()
            .collect::<Vec<_>>();

        tracing::debug!(
            direction = self.info.navigation_direction.name(),
            values = values.len(),
            sequence = sequence.len(),
            references = format_instructions.len(),
            "navigation prepared"
        );
        Ok(PreparedNavigation {
            input: EvaluationInput {
                values,
                sequence,
                format_instructions,
                codes,
            },
            survey,
            startup_bindings,
        })
    }

    /// Applies the script engine result and computes the new index.
    pub fn complete(&self, prepared: PreparedNavigation, result: &Value) -> Result<NavigationOutput> {
        let (mut state_bindings, format_bindings) = split_result(result)?;

        let mut ordering = prepared.startup_bindings.clone();
        ordering.extend(state_bindings.iter().map(|(key, value)| (key.clone(), value.clone())));
        let survey = apply_priorities(&sort_by_order(&prepared.survey, &ordering), &ordering);

        let current = self
            .info
            .navigation_index
            .clone()
            .unwrap_or_else(|| all_in_one(&survey));
        let current_valid = is_valid(&state_bindings, &components_in_navigation(&survey, &current));
        let navigation_index = Navigator::new(&survey, &state_bindings, self.options.navigation_mode)
            .with_skip_map(&self.validation.skip_map)
            .with_skip_invalid(self.options.skip_invalid)
            .navigate(&self.info, current_valid);

        let shown = components_in_navigation(&survey, &navigation_index);
        let extra = navigation_bindings(&survey, &shown, &navigation_index, &state_bindings);
        state_bindings.extend(extra);
        let to_save = self.to_save(&ordering);

        tracing::debug!(
            index = %navigation_index,
            show_error = navigation_index.show_error(),
            saved = to_save.len(),
            "navigation completed"
        );
        Ok(NavigationOutput {
            reduced_survey: reduce(&survey, &navigation_index),
            ordered_survey: survey,
            navigation_index,
            state_bindings,
            format_bindings,
            to_save,
        })
    }

    /// Schema fields supplied by the caller, plus the drawn orders and priorities on start.
    fn to_save(&self, bindings: &Bindings) -> Bindings {
        let start = self.info.navigation_direction == NavigationDirection::Start;
        self.validation
            .schema
            .iter()
            .map(|field| (field.column_name, field.to_dependency()))
            .filter(|(column_name, dependency)| {
                (start && matches!(column_name, ColumnName::Order | ColumnName::Priority))
                    || self.values.contains_key(dependency)
            })
            .filter_map(|(_, dependency)| {
                let value = bindings.get(&dependency)?.clone();
                Some((dependency, value))
            })
            .collect()
    }

    fn label(&self, code: &str) -> Option<String> {
        self.labels.get(code).cloned().or_else(|| {
            self.values
                .get(&Dependency::new(code, ReservedCode::Label))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }
}

fn all_in_one(survey: &Survey) -> NavigationIndex {
    NavigationIndex::groups(
        survey
            .groups
            .iter()
            .filter(|group| !group.is_end())
            .map(|group| group.code.clone())
            .collect(),
    )
}

/// `in_current_navigation` for every component, `show_errors` for the shown ones and the
/// survey `validity` of the new index.
fn navigation_bindings(survey: &Survey, shown: &[SmolStr], index: &NavigationIndex, state: &Bindings) -> Bindings {
    let mut bindings = Bindings::default();
    for component in survey.flatten() {
        if component.element_type == ElementType::Survey {
            continue;
        }
        let in_navigation = shown.contains(&component.code);
        if in_navigation {
            bindings.insert(
                Dependency::new(component.code.clone(), ReservedCode::ShowErrors),
                Value::Bool(index.show_error()),
            );
        }
        bindings.insert(
            Dependency::new(component.code, ReservedCode::InCurrentNavigation),
            Value::Bool(in_navigation),
        );
    }
    bindings.insert(
        Dependency::new(SURVEY_CODE, ReservedCode::Validity),
        Value::Bool(is_valid(state, shown)),
    );
    bindings
}

/// Splits `{component: {slot: value}}` into slot bindings and reference bindings.
fn split_result(result: &Value) -> Result<(Bindings, FormatBindings)> {
    let components = result
        .as_object()
        .ok_or_else(|| EngineError::InvalidEvaluationResult("expected an object of components".to_string()))?;
    let mut state_bindings = Bindings::default();
    let mut format_bindings = FormatBindings::default();
    for (component, slots) in components {
        let slots = slots.as_object().ok_or_else(|| {
            EngineError::InvalidEvaluationResult(format!("expected an object of values for `{component}`"))
        })?;
        for (key, value) in slots {
            match ReservedCode::from_code(key) {
                Some(reserved_code) => {
                    state_bindings.insert(Dependency::new(component.as_str(), reserved_code), value.clone());
                }
                None => {
                    format_bindings.insert(Dependent::new(component.as_str(), key.as_str()), value.clone());
                }
            }
        }
    }
    Ok((state_bindings, format_bindings))
}
