use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Annotations, ComponentIndex, is_excluded};
use crate::model::{ChildlessComponent, ComponentTree, ElementType, Instruction, InstructionError, SkipInstruction};

/// A valid skip instruction, as consumed by the navigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipManifest {
    pub component: SmolStr,
    pub code: SmolStr,
    pub skip_to_component: SmolStr,
    pub to_end: bool,
}

/// Group code to the skips declared on the group and its questions, in document order.
pub type SkipMap = IndexMap<SmolStr, Vec<SkipManifest>>;

pub(crate) fn check(tree: &ComponentTree, indices: &FxHashMap<SmolStr, ComponentIndex>, annotations: &mut Annotations) {
    for (position, component) in tree.iter().enumerate() {
        for skip in skips(component) {
            if let Some(error) = skip_error(tree, indices, component, skip) {
                annotations.instruction(position, &skip.code, error);
            }
        }
    }
}

fn skips(component: &ChildlessComponent) -> impl Iterator<Item = &SkipInstruction> {
    component
        .instruction_list
        .iter()
        .filter(|instruction| !instruction.has_errors())
        .filter_map(|instruction| match instruction {
            Instruction::Skip(skip) => Some(skip),
            _ => None,
        })
}

fn skip_error(
    tree: &ComponentTree,
    indices: &FxHashMap<SmolStr, ComponentIndex>,
    source: &ChildlessComponent,
    skip: &SkipInstruction,
) -> Option<InstructionError> {
    let invalid = || Some(InstructionError::InvalidSkipReference(skip.skip_to_component.clone()));

    if !matches!(source.element_type, ElementType::Group | ElementType::Question) {
        return invalid();
    }
    let Some(target) = tree.get(&skip.skip_to_component) else {
        return invalid();
    };
    match target.element_type {
        ElementType::Group => {}
        ElementType::Question if !skip.to_end => {}
        _ => return invalid(),
    }
    if skip.to_end && target.is_end_group() {
        return Some(InstructionError::SkipToEndOfEndGroup);
    }
    if is_excluded(tree, &target.code)
        || target.code == source.code
        || tree.is_descendant(&source.code, &target.code)
        || tree.is_descendant(&target.code, &source.code)
    {
        return invalid();
    }

    let branches = tree.common_parent(&source.code, &target.code).and_then(|parent| {
        Some((
            tree.child_on_path(&source.code, &parent.code)?,
            tree.child_on_path(&target.code, &parent.code)?,
        ))
    });
    let Some((source_branch, target_branch)) = branches else {
        return invalid();
    };
    match (indices.get(&source_branch.code), indices.get(&target_branch.code)) {
        (Some(source_index), Some(target_index)) if source_index.max_index < target_index.min_index => None,
        _ => invalid(),
    }
}

/// Skip map over a sanitized survey.
pub fn skip_map(tree: &ComponentTree) -> SkipMap {
    let mut map = SkipMap::default();
    for component in tree.iter() {
        let group = match component.element_type {
            ElementType::Group => Some(component.code.clone()),
            ElementType::Question => component.parent_code.clone(),
            _ => None,
        };
        let Some(group) = group else {
            continue;
        };
        for skip in skips(component) {
            map.entry(group.clone()).or_default().push(SkipManifest {
                component: component.code.clone(),
                code: skip.code.clone(),
                skip_to_component: skip.skip_to_component.clone(),
                to_end: skip.to_end,
            });
        }
    }
    map
}
