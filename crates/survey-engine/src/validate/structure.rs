use rustc_hash::FxHashSet;

use super::{Annotations, ValidationOptions};
use crate::model::{ComponentError, ComponentTree, ElementType, Instruction, InstructionError, ReservedCode};

/// Duplicate codes, empty parents and END group placement.
pub(crate) fn check(tree: &ComponentTree, options: ValidationOptions, annotations: &mut Annotations) {
    let mut seen = FxHashSet::default();
    for (position, component) in tree.iter().enumerate() {
        if !seen.insert(component.code.clone()) {
            annotations.component(position, ComponentError::DuplicateCode);
        }

        let is_empty = component.children.is_empty();
        match component.element_type {
            ElementType::Survey if is_empty => annotations.component(position, ComponentError::EmptyParent),
            ElementType::Group if is_empty && !component.is_end_group() => {
                annotations.component(position, ComponentError::EmptyParent)
            }
            _ => {}
        }
    }

    check_end_groups(tree, options, annotations);
}

fn check_end_groups(tree: &ComponentTree, options: ValidationOptions, annotations: &mut Annotations) {
    let Some(survey) = tree.components().first() else {
        return;
    };
    let last_group = survey.children.last();
    let mut has_end_group = false;

    for code in &survey.children {
        let Some(group) = tree.get(code) else {
            continue;
        };
        if !group.is_end_group() {
            continue;
        }
        has_end_group = true;
        let Some(position) = tree.position(code) else {
            continue;
        };
        if Some(code) != last_group {
            annotations.component(position, ComponentError::MisplacedEndGroup);
        }
        for instruction in group.instruction_list.iter().filter(|i| i.is_state()) {
            annotations.instruction(position, instruction.code(), InstructionError::InvalidInstructionInEndGroup);
        }

        for (position, component) in tree.iter().enumerate() {
            if !tree.is_descendant(&component.code, code) {
                continue;
            }
            for instruction in component.instruction_list.iter().filter(|i| !allowed_in_end_group(i)) {
                annotations.instruction(position, instruction.code(), InstructionError::InvalidInstructionInEndGroup);
            }
        }
    }

    if options.require_end_group && !has_end_group {
        annotations.component(0, ComponentError::NoEndGroup);
    }
}

/// Inside an END group only values, validity checks and passive slots may be scripted.
fn allowed_in_end_group(instruction: &Instruction) -> bool {
    if !instruction.is_state() || !instruction.is_active() {
        return true;
    }
    matches!(
        instruction.reserved_code(),
        Some(ReservedCode::Value | ReservedCode::Validity)
    )
}
