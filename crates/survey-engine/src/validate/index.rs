use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::model::{ChildlessComponent, ComponentTree, Instruction, ReservedCode};

/// Position range of a component among its siblings.
///
/// A child of a random group may be shown anywhere in the span of its group, so its
/// `min_index`..=`max_index` covers every position the group occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIndex {
    pub code: SmolStr,
    pub parent_code: Option<SmolStr>,
    pub children: Vec<SmolStr>,
    pub min_index: usize,
    pub max_index: usize,
    pub prioritised_siblings: Vec<SmolStr>,
    pub dependencies: Vec<ReservedCode>,
}

pub fn component_indices(tree: &ComponentTree) -> Vec<ComponentIndex> {
    tree.iter()
        .map(|component| {
            let parent = component.parent_code.as_deref().and_then(|code| tree.get(code));
            let (min_index, max_index) = parent.map(|parent| index_range(parent, &component.code)).unwrap_or((0, 0));
            ComponentIndex {
                code: component.code.clone(),
                parent_code: component.parent_code.clone(),
                children: component.children.clone(),
                min_index,
                max_index,
                prioritised_siblings: parent
                    .map(|parent| prioritised_siblings(parent, &component.code))
                    .unwrap_or_default(),
                dependencies: component
                    .instruction_list
                    .iter()
                    .filter(|instruction| !instruction.has_errors())
                    .filter_map(Instruction::reserved_code)
                    .filter(ReservedCode::is_accessible)
                    .collect(),
            }
        })
        .collect()
}

pub(crate) fn index_by_code(tree: &ComponentTree) -> FxHashMap<SmolStr, ComponentIndex> {
    component_indices(tree)
        .into_iter()
        .map(|index| (index.code.clone(), index))
        .collect()
}

fn index_range(parent: &ChildlessComponent, code: &str) -> (usize, usize) {
    let Some(own) = parent.children.iter().position(|child| child == code) else {
        return (0, 0);
    };
    random_members(parent)
        .into_iter()
        .find(|members| members.contains(&own))
        .map(|members| {
            let min = members.iter().copied().min().unwrap_or(own);
            let max = members.iter().copied().max().unwrap_or(own);
            (min, max)
        })
        .unwrap_or((own, own))
}

/// Child positions of every valid random group of `parent`.
fn random_members(parent: &ChildlessComponent) -> Vec<Vec<usize>> {
    parent
        .instruction_list
        .iter()
        .filter(|instruction| !instruction.has_errors())
        .filter_map(|instruction| match instruction {
            Instruction::RandomGroups(random) => Some(random),
            _ => None,
        })
        .flat_map(|random| random.groups.iter())
        .map(|group| {
            group
                .codes
                .iter()
                .filter_map(|code| parent.child_local_codes.iter().position(|child| child == code))
                .collect()
        })
        .collect()
}

fn prioritised_siblings(parent: &ChildlessComponent, code: &str) -> Vec<SmolStr> {
    parent
        .instruction_list
        .iter()
        .filter(|instruction| !instruction.has_errors())
        .filter_map(|instruction| match instruction {
            Instruction::PriorityGroups(groups) => Some(groups),
            _ => None,
        })
        .flat_map(|groups| groups.priorities.iter())
        .map(|group| {
            group
                .weights
                .iter()
                .filter_map(|weight| parent.child_code(&weight.code).cloned())
                .collect::<Vec<_>>()
        })
        .find(|members| members.iter().any(|member| member == code))
        .map(|members| members.into_iter().filter(|member| member != code).collect())
        .unwrap_or_default()
}
