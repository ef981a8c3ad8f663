use itertools::Itertools;
use smol_str::SmolStr;

use super::Annotations;
use crate::model::{ChildlessComponent, ComponentTree, ElementType, Instruction, InstructionError};

/// Membership checks for random groups, priority groups and parent relevance.
pub(crate) fn check(tree: &ComponentTree, annotations: &mut Annotations) {
    for (position, component) in tree.iter().enumerate() {
        let excluded = excluded_items(tree, component);
        for instruction in &component.instruction_list {
            let errors = match instruction {
                Instruction::RandomGroups(random) => {
                    let codes = random.groups.iter().flat_map(|group| group.codes.iter()).collect::<Vec<_>>();
                    membership_errors(
                        component,
                        &codes,
                        &excluded,
                        InstructionError::DuplicateRandomGroupItems,
                        InstructionError::RandomGroupItemNotChild,
                        InstructionError::InvalidRandomItem,
                    )
                }
                Instruction::PriorityGroups(priority) => {
                    let codes = priority
                        .priorities
                        .iter()
                        .flat_map(|group| group.weights.iter().map(|weight| &weight.code))
                        .collect::<Vec<_>>();
                    let mut errors = membership_errors(
                        component,
                        &codes,
                        &excluded,
                        InstructionError::DuplicatePriorityGroupItems,
                        InstructionError::PriorityGroupItemNotChild,
                        InstructionError::InvalidPriorityItem,
                    );
                    if priority.priorities.iter().any(|group| !group.is_limit_valid()) {
                        errors.push(InstructionError::PriorityLimitMismatch);
                    }
                    errors
                }
                Instruction::ParentRelevance(relevance) => {
                    let not_children = relevance
                        .children
                        .iter()
                        .flatten()
                        .filter(|code| component.child_code(code).is_none())
                        .unique()
                        .cloned()
                        .collect::<Vec<_>>();
                    if not_children.is_empty() {
                        Vec::new()
                    } else {
                        vec![InstructionError::InvalidChildReferences(not_children)]
                    }
                }
                _ => Vec::new(),
            };
            for error in errors {
                annotations.instruction(position, instruction.code(), error);
            }
        }
    }
}

/// The first group and END groups keep their place, so survey level groups cannot
/// take part in shuffling or selection.
fn excluded_items(tree: &ComponentTree, component: &ChildlessComponent) -> Vec<SmolStr> {
    if component.element_type != ElementType::Survey {
        return Vec::new();
    }
    component
        .children
        .iter()
        .enumerate()
        .filter(|(index, code)| *index == 0 || tree.get(code).is_some_and(ChildlessComponent::is_end_group))
        .filter_map(|(index, _)| component.child_local_codes.get(index).cloned())
        .collect()
}

fn membership_errors(
    component: &ChildlessComponent,
    codes: &[&SmolStr],
    excluded: &[SmolStr],
    duplicate: fn(Vec<SmolStr>) -> InstructionError,
    not_child: fn(Vec<SmolStr>) -> InstructionError,
    invalid_item: fn(Vec<SmolStr>) -> InstructionError,
) -> Vec<InstructionError> {
    let duplicates = codes
        .iter()
        .duplicates()
        .map(|code| (*code).clone())
        .collect::<Vec<_>>();
    let not_children = codes
        .iter()
        .filter(|code| component.child_code(code).is_none())
        .unique()
        .map(|code| (*code).clone())
        .collect::<Vec<_>>();
    let invalid_items = codes
        .iter()
        .filter(|code| excluded.iter().any(|item| item == **code))
        .unique()
        .map(|code| (*code).clone())
        .collect::<Vec<_>>();

    [(duplicates, duplicate), (not_children, not_child), (invalid_items, invalid_item)]
        .into_iter()
        .filter(|(items, _)| !items.is_empty())
        .map(|(items, constructor)| constructor(items))
        .collect()
}
