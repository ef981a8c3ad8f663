//! Navigator: computes the next position of a respondent from the bound relevance,
//! validity and skip slots.
//!
//! Units are the non-END groups (group by group) or their questions (question by
//! question). END groups are never scanned; leaving the last unit lands on `End` of the
//! last group.
mod order;
mod reduce;

use serde_json::Value;
use smol_str::SmolStr;

use crate::model::{
    Bindings, Dependency, NavigationDirection, NavigationIndex, NavigationInfo, NavigationMode, ReservedCode, Survey,
};
use crate::validate::{SkipManifest, SkipMap};

pub use order::{apply_priorities, randomize, set_priorities, sort_by_order};
pub use reduce::{components_in_navigation, reduce};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Unit {
    group: SmolStr,
    question: Option<SmolStr>,
}

impl Unit {
    fn index(&self) -> NavigationIndex {
        match &self.question {
            Some(question) => NavigationIndex::question(question.clone()),
            None => NavigationIndex::group(self.group.clone()),
        }
    }
}

pub struct Navigator<'a> {
    survey: &'a Survey,
    bindings: &'a Bindings,
    skip_map: Option<&'a SkipMap>,
    mode: NavigationMode,
    skip_invalid: bool,
}

impl<'a> Navigator<'a> {
    pub fn new(survey: &'a Survey, bindings: &'a Bindings, mode: NavigationMode) -> Self {
        Self {
            survey,
            bindings,
            skip_map: None,
            mode,
            skip_invalid: false,
        }
    }

    pub fn with_skip_map(mut self, skip_map: &'a SkipMap) -> Self {
        self.skip_map = Some(skip_map);
        self
    }

    pub fn with_skip_invalid(mut self, skip_invalid: bool) -> Self {
        self.skip_invalid = skip_invalid;
        self
    }

    /// Computes the new index. `current_valid` tells whether every component shown at the
    /// current index passed validation.
    pub fn navigate(&self, info: &NavigationInfo, current_valid: bool) -> NavigationIndex {
        let current = info.navigation_index.as_ref();
        let index = match (&info.navigation_direction, current) {
            (NavigationDirection::Jump(target), _) => target.with_show_error(false),
            (NavigationDirection::Start, _) | (_, None) => self.first(),
            (NavigationDirection::Resume | NavigationDirection::ChangeLanguage, Some(current)) => current.clone(),
            (NavigationDirection::Previous, Some(current)) => self.previous(current),
            (NavigationDirection::Next, Some(current)) => {
                if !current_valid && !self.skip_invalid && !current.is_end() {
                    current.with_show_error(true)
                } else {
                    self.next(current)
                }
            }
        };
        tracing::debug!(
            direction = info.navigation_direction.name(),
            from = current.map(ToString::to_string),
            to = %index,
            "navigated"
        );
        index
    }

    fn first(&self) -> NavigationIndex {
        match self.mode {
            NavigationMode::AllInOne => NavigationIndex::groups(
                self.survey
                    .groups
                    .iter()
                    .filter(|group| !group.is_end())
                    .map(|group| group.code.clone())
                    .collect(),
            ),
            _ => self.scan_forward(&self.units(), 0),
        }
    }

    fn next(&self, current: &NavigationIndex) -> NavigationIndex {
        if self.mode == NavigationMode::AllInOne || current.is_end() {
            return match current {
                NavigationIndex::End { .. } => current.clone(),
                _ => self.end(),
            };
        }
        let units = self.units();
        if let Some(index) = self.skip(&units, current) {
            return index;
        }
        match self.span(&units, current) {
            Some((_, last)) => self.scan_forward(&units, last + 1),
            None => self.first(),
        }
    }

    fn previous(&self, current: &NavigationIndex) -> NavigationIndex {
        if self.mode == NavigationMode::AllInOne {
            return self.first();
        }
        let units = self.units();
        let before = match current {
            NavigationIndex::End { .. } => Some(units.len()),
            _ => self.span(&units, current).map(|(first, _)| first),
        };
        before
            .and_then(|before| units[..before].iter().rev().find(|unit| self.is_unit_relevant(unit)))
            .map(Unit::index)
            .unwrap_or_else(|| self.first())
    }

    fn end(&self) -> NavigationIndex {
        NavigationIndex::end(
            self.survey
                .last_group()
                .map(|group| group.code.clone())
                .unwrap_or_default(),
        )
    }

    fn units(&self) -> Vec<Unit> {
        let groups = self.survey.groups.iter().filter(|group| !group.is_end());
        match self.mode {
            NavigationMode::QuestionByQuestion => groups
                .flat_map(|group| {
                    group.questions.iter().map(|question| Unit {
                        group: group.code.clone(),
                        question: Some(question.code.clone()),
                    })
                })
                .collect(),
            _ => groups
                .map(|group| Unit {
                    group: group.code.clone(),
                    question: None,
                })
                .collect(),
        }
    }

    /// First and last unit covered by `index`.
    fn span(&self, units: &[Unit], index: &NavigationIndex) -> Option<(usize, usize)> {
        let matches = |unit: &Unit| match index {
            NavigationIndex::Group { group_id, .. } => unit.group == *group_id,
            NavigationIndex::Question { question_id, .. } => match &unit.question {
                Some(question) => question == question_id,
                None => self
                    .survey
                    .question(question_id)
                    .is_some_and(|(group, _)| group.code == unit.group),
            },
            NavigationIndex::Groups { .. } | NavigationIndex::End { .. } => false,
        };
        let first = units.iter().position(matches)?;
        let last = units.iter().rposition(matches)?;
        Some((first, last))
    }

    fn scan_forward(&self, units: &[Unit], from: usize) -> NavigationIndex {
        units
            .iter()
            .skip(from)
            .find(|unit| self.is_unit_relevant(unit))
            .map(Unit::index)
            .unwrap_or_else(|| self.end())
    }

    /// The target of the first triggered skip leaving `current`.
    fn skip(&self, units: &[Unit], current: &NavigationIndex) -> Option<NavigationIndex> {
        let skip_map = self.skip_map?;
        let (group, question) = match current {
            NavigationIndex::Group { group_id, .. } => (group_id.clone(), None),
            NavigationIndex::Question { question_id, .. } => {
                let (group, _) = self.survey.question(question_id)?;
                (group.code.clone(), Some(question_id.clone()))
            }
            _ => return None,
        };
        let manifests = skip_map.get(&group)?;
        let leaves_group = match &question {
            Some(question) => self.is_last_relevant_question(units, &group, question),
            None => true,
        };
        let manifest = manifests
            .iter()
            .filter(|manifest| match &question {
                None => true,
                Some(question) => manifest.component == *question || (leaves_group && manifest.component == group),
            })
            .find(|manifest| self.is_triggered(manifest))?;

        tracing::debug!(
            component = %manifest.component,
            code = %manifest.code,
            target = %manifest.skip_to_component,
            "skip triggered"
        );
        let target = &manifest.skip_to_component;
        if manifest.to_end || self.survey.group(target).is_some_and(|group| group.is_end()) {
            return Some(NavigationIndex::end(target.clone()));
        }
        let start = units.iter().position(|unit| {
            unit.question.as_ref() == Some(target)
                || (unit.group == *target)
                || (unit.question.is_none()
                    && self
                        .survey
                        .question(target)
                        .is_some_and(|(group, _)| group.code == unit.group))
        })?;
        Some(self.scan_forward(units, start))
    }

    fn is_last_relevant_question(&self, units: &[Unit], group: &str, question: &str) -> bool {
        units
            .iter()
            .skip_while(|unit| unit.question.as_deref() != Some(question))
            .skip(1)
            .take_while(|unit| unit.group.as_str() == group)
            .all(|unit| !self.is_unit_relevant(unit))
    }

    fn is_triggered(&self, manifest: &SkipManifest) -> bool {
        let condition = Dependency::new(manifest.component.clone(), ReservedCode::Skip(manifest.code.clone()));
        self.bindings.get(&condition) == Some(&Value::Bool(true)) && self.is_component_relevant(&manifest.component)
    }

    fn is_unit_relevant(&self, unit: &Unit) -> bool {
        self.is_relevant(&unit.group) && unit.question.as_ref().is_none_or(|question| self.is_relevant(question))
    }

    fn is_component_relevant(&self, code: &str) -> bool {
        match self.survey.question(code) {
            Some((group, _)) => self.is_relevant(&group.code) && self.is_relevant(code),
            None => self.is_relevant(code),
        }
    }

    /// A component is relevant unless one of its relevance slots is bound to `false`.
    pub fn is_relevant(&self, code: &str) -> bool {
        is_relevant(self.bindings, code)
    }
}

pub fn is_relevant(bindings: &Bindings, code: &str) -> bool {
    [ReservedCode::Relevance, ReservedCode::ConditionalRelevance]
        .into_iter()
        .all(|reserved_code| bindings.get(&Dependency::new(code, reserved_code)) != Some(&Value::Bool(false)))
}

/// True when no relevant component among `codes` is bound `validity = false`.
pub fn is_valid(bindings: &Bindings, codes: &[SmolStr]) -> bool {
    codes.iter().all(|code| {
        !is_relevant(bindings, code)
            || bindings.get(&Dependency::new(code.clone(), ReservedCode::Validity)) != Some(&Value::Bool(false))
    })
}
