use rustc_hash::{FxHashMap, FxHashSet};

use super::Annotations;
use crate::dependency::DependencyMapper;
use crate::model::{ComponentTree, Dependency, Dependent, Instruction, InstructionError, ReservedCode};

/// Flags dependencies on later components and dependencies closing a cycle.
///
/// Edges are accepted one at a time in document order, slots derived from children
/// first, so the instruction reported for a cycle is the one whose edge closes it.
pub(crate) fn check(
    runtime: &ComponentTree,
    mapper: &DependencyMapper,
    tree: &ComponentTree,
    annotations: &mut Annotations,
) {
    let mut graph: FxHashMap<Dependency, Vec<Dependency>> = FxHashMap::default();

    for component in runtime.iter() {
        let Some(position) = tree.position(&component.code) else {
            continue;
        };
        let mut instructions = component.instruction_list.iter().collect::<Vec<_>>();
        instructions.sort_by_key(|instruction| !is_derived(instruction));

        for instruction in instructions {
            let dependent = Dependent::new(component.code.clone(), instruction.code());
            let node = instruction.dependency(&component.code);
            for dependency in mapper.dependencies(&dependent) {
                let rejected = is_forward(runtime, &component.code, &dependency.component_code)
                    || node.as_ref().is_some_and(|node| reaches(&graph, dependency, node));
                if rejected {
                    annotations.instruction(
                        position,
                        instruction.code(),
                        InstructionError::ForwardDependency(dependency.clone()),
                    );
                } else if let Some(node) = &node {
                    graph.entry(node.clone()).or_default().push(dependency.clone());
                }
            }
        }
    }
}

fn is_derived(instruction: &Instruction) -> bool {
    matches!(
        instruction.reserved_code(),
        Some(ReservedCode::ChildrenRelevance | ReservedCode::Relevance)
    )
}

/// A later component may only be read when it is a descendant of the reader.
fn is_forward(runtime: &ComponentTree, dependent: &str, dependency: &str) -> bool {
    match (runtime.position(dependent), runtime.position(dependency)) {
        (Some(dependent_position), Some(dependency_position)) => {
            dependency_position > dependent_position && !runtime.is_descendant(dependency, dependent)
        }
        _ => false,
    }
}

fn reaches(graph: &FxHashMap<Dependency, Vec<Dependency>>, from: &Dependency, target: &Dependency) -> bool {
    let mut stack = vec![from];
    let mut visited = FxHashSet::default();
    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(next) = graph.get(current) {
            stack.extend(next.iter());
        }
    }
    false
}
