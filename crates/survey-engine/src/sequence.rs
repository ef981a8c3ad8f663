//! Sequencer: orders slot recomputation so that every state runs after the slots it reads.
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::dependency::DependencyMapper;
use crate::error::{EngineError, Result};
use crate::model::{ComponentInstruction, ComponentTree, Dependency, DependencyMap, Instruction, ReservedCode};

/// Reorders `candidates` so that each key follows its direct dependencies among the candidates.
///
/// Keys are scanned left to right; a key with a dependency placed later is moved to just
/// after its last such dependency and the scan resumes at the same position. Keys already
/// in a valid order are never moved. Only edges between two candidates are honoured: a
/// path that passes through a key missing from `candidates` does not constrain the order.
pub fn sequence(dependency_map: &DependencyMap, candidates: &[Dependency]) -> Result<Vec<Dependency>> {
    let mut order = candidates.iter().unique().cloned().collect::<Vec<_>>();
    let members = order.iter().cloned().collect::<FxHashSet<_>>();
    let edges = order
        .iter()
        .map(|key| {
            let dependencies = dependency_map
                .get(&key.to_dependent())
                .map(|dependencies| {
                    dependencies
                        .iter()
                        .filter(|dependency| members.contains(*dependency))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            (key.clone(), dependencies)
        })
        .collect::<FxHashMap<_, _>>();

    if let Some(cycle) = find_cycle(&order, &edges) {
        tracing::warn!(cycle = ?cycle, "dependency cycle in evaluation sequence");
        return Err(EngineError::SequenceCycle(cycle));
    }

    let mut index = 0;
    while index < order.len() {
        let last_dependency = edges
            .get(&order[index])
            .into_iter()
            .flatten()
            .filter_map(|dependency| order.iter().position(|key| key == dependency))
            .max();
        match last_dependency {
            Some(position) if position > index => {
                let key = order.remove(index);
                order.insert(position, key);
            }
            _ => index += 1,
        }
    }

    tracing::trace!(keys = order.len(), "sequence computed");
    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycle(order: &[Dependency], edges: &FxHashMap<Dependency, Vec<Dependency>>) -> Option<Vec<Dependency>> {
    fn visit<'a>(
        key: &'a Dependency,
        edges: &'a FxHashMap<Dependency, Vec<Dependency>>,
        marks: &mut FxHashMap<&'a Dependency, Mark>,
        path: &mut Vec<&'a Dependency>,
    ) -> Option<Vec<Dependency>> {
        match marks.get(key) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|item| *item == key).unwrap_or_default();
                return Some(path[start..].iter().map(|item| (*item).clone()).collect());
            }
            None => {}
        }
        marks.insert(key, Mark::Visiting);
        path.push(key);
        for dependency in edges.get(key).into_iter().flatten() {
            if let Some(cycle) = visit(dependency, edges, marks, path) {
                return Some(cycle);
            }
        }
        path.pop();
        marks.insert(key, Mark::Done);
        None
    }

    let mut marks = FxHashMap::default();
    let mut path = Vec::new();
    order.iter().find_map(|key| visit(key, edges, &mut marks, &mut path))
}

/// Runtime view of a sanitized survey: which states to recompute and in which order.
pub struct ContextRunner<'a> {
    tree: &'a ComponentTree,
    dependency_map: &'a DependencyMap,
}

impl<'a> ContextRunner<'a> {
    pub fn new(tree: &'a ComponentTree, mapper: &'a DependencyMapper) -> Self {
        Self {
            tree,
            dependency_map: mapper.dependency_map(),
        }
    }

    /// The state instruction computing `dependency`.
    pub fn state(&self, dependency: &Dependency) -> Option<&'a Instruction> {
        self.tree
            .get(&dependency.component_code)?
            .instruction(dependency.reserved_code.code())
            .filter(|instruction| instruction.is_state())
    }

    /// Every active state in document order, sequenced.
    pub fn refresh_sequence(&self) -> Result<Vec<Dependency>> {
        let candidates = self
            .tree
            .iter()
            .flat_map(|component| {
                component
                    .instruction_list
                    .iter()
                    .filter(|instruction| instruction.is_state() && instruction.is_active())
                    .filter_map(|instruction| instruction.dependency(&component.code))
            })
            .collect::<Vec<_>>();
        sequence(self.dependency_map, &candidates)
    }

    /// The sequenced active states as runnable instructions.
    pub fn runtime_script(&self) -> Result<Vec<ComponentInstruction>> {
        Ok(self
            .refresh_sequence()?
            .into_iter()
            .filter_map(|dependency| {
                Some(ComponentInstruction {
                    instruction: self.state(&dependency)?.runnable()?,
                    component_code: dependency.component_code,
                })
            })
            .collect())
    }

    /// Reference instructions, evaluated after every state.
    pub fn format_instructions(&self) -> Vec<ComponentInstruction> {
        self.tree
            .iter()
            .flat_map(|component| {
                component
                    .instruction_list
                    .iter()
                    .filter(|instruction| matches!(instruction, Instruction::Reference(_)))
                    .filter_map(|instruction| {
                        Some(ComponentInstruction {
                            component_code: component.code.clone(),
                            instruction: instruction.runnable()?,
                        })
                    })
            })
            .collect()
    }

    /// Slots the navigator reads: relevance, validity and skip conditions.
    pub fn navigation_dependencies(&self) -> FxHashSet<Dependency> {
        self.tree
            .iter()
            .flat_map(|component| {
                component
                    .instruction_list
                    .iter()
                    .filter_map(|instruction| instruction.dependency(&component.code))
            })
            .filter(|dependency| {
                matches!(
                    dependency.reserved_code,
                    ReservedCode::Relevance
                        | ReservedCode::ConditionalRelevance
                        | ReservedCode::Validity
                        | ReservedCode::Skip(_)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::to_dependency_map;
    use crate::model::{Dependent, Group, ImpactMap, Question, Reference, SimpleState, Survey};
    use rstest::{fixture, rstest};

    fn cr(code: &str) -> Dependency {
        Dependency::new(code, ReservedCode::ConditionalRelevance)
    }

    fn keys(codes: &[&str]) -> Vec<Dependency> {
        codes.iter().map(|code| cr(code)).collect()
    }

    #[fixture]
    fn dependency_map() -> DependencyMap {
        let dependents = |codes: &[&str]| {
            codes
                .iter()
                .map(|code| Dependent::new(*code, "conditional_relevance"))
                .collect::<Vec<_>>()
        };
        let impact_map = ImpactMap::from_iter([
            (cr("Q1"), dependents(&["Q2", "Q3"])),
            (cr("Q2"), dependents(&["Q5"])),
            (cr("Q3"), dependents(&["Q2", "Q4"])),
            (cr("Q4"), dependents(&["Q5"])),
            (cr("Q5"), dependents(&["Q6"])),
            (cr("Q6"), dependents(&["Q12"])),
        ]);
        to_dependency_map(&impact_map)
    }

    #[rstest]
    #[case::full(
        &["Q12", "Q11", "Q6", "Q1", "Q4", "Q3", "Q5", "Q2"],
        &["Q11", "Q1", "Q3", "Q4", "Q2", "Q5", "Q6", "Q12"]
    )]
    #[case::partial(
        &["Q12", "Q11", "Q6", "Q1", "Q4", "Q2"],
        &["Q11", "Q6", "Q12", "Q1", "Q4", "Q2"]
    )]
    #[case::already_ordered(
        &["Q1", "Q3", "Q2", "Q4", "Q5"],
        &["Q1", "Q3", "Q2", "Q4", "Q5"]
    )]
    #[case::duplicates(&["Q2", "Q1", "Q2"], &["Q1", "Q2"])]
    #[case::path_through_missing_key(&["Q6", "Q2"], &["Q6", "Q2"])]
    fn test_sequence(dependency_map: DependencyMap, #[case] input: &[&str], #[case] expected: &[&str]) {
        assert_eq!(sequence(&dependency_map, &keys(input)).unwrap(), keys(expected));
    }

    #[test]
    fn test_sequence_cycle() {
        let dependency_map = DependencyMap::from_iter([
            (Dependent::new("Q1", "conditional_relevance"), keys(&["Q2"])),
            (Dependent::new("Q2", "conditional_relevance"), keys(&["Q1"])),
        ]);
        let result = sequence(&dependency_map, &keys(&["Q1", "Q2", "Q3"]));
        assert!(matches!(result, Err(EngineError::SequenceCycle(cycle)) if cycle == keys(&["Q1", "Q2"])));
    }

    #[test]
    fn test_context_runner() {
        let survey = Survey::new(
            Vec::new(),
            vec![Group::new("G1").with_questions(vec![
                Question::new("Q1").with_instructions(vec![
                    SimpleState::new("Q2.value > 1", ReservedCode::ConditionalRelevance).into(),
                    SimpleState::new("", ReservedCode::Value).into(),
                ]),
                Question::new("Q2").with_instructions(vec![
                    SimpleState::new("", ReservedCode::Value).into(),
                    SimpleState::new("Q2.value != ''", ReservedCode::Validity).into(),
                    Reference::new("reference_label", vec!["Q1.label".to_string()], "en")
                        .unwrap()
                        .into(),
                ]),
            ])],
        );
        let tree = ComponentTree::from_survey(&survey);
        let mapper = DependencyMapper::new(tree.components());
        let runner = ContextRunner::new(&tree, &mapper);

        assert_eq!(
            runner.refresh_sequence().unwrap(),
            vec![
                Dependency::new("Q1", ReservedCode::ConditionalRelevance),
                Dependency::new("Q2", ReservedCode::Validity),
            ]
        );
        let script = runner.runtime_script().unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script[0].instruction.text, "Q2.value > 1");
        assert_eq!(runner.format_instructions().len(), 1);
        assert_eq!(runner.format_instructions()[0].component_code, "Q2");

        let navigation = runner.navigation_dependencies();
        assert!(navigation.contains(&Dependency::new("Q2", ReservedCode::Validity)));
        assert!(!navigation.contains(&Dependency::new("Q2", ReservedCode::Value)));
    }
}
