use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use serde_json::Value;
use smol_str::{SmolStr, format_smolstr};

use crate::model::{
    Bindings, ChildlessComponent, ComponentTree, Dependency, ElementType, Instruction, NodeEdit, NodeView,
    PriorityGroup, RandomGroup, RandomOption, ReservedCode, Survey, SurveyComponent,
};

/// Draws an `order` for every child of the random groups using one of `options`.
///
/// A group keeps the sibling positions it occupies; only their assignment to members
/// changes. ALPHA groups are ordered by `label`; unlabeled children follow in their
/// original order.
pub fn randomize<R: Rng + ?Sized>(
    survey: &Survey,
    options: &[RandomOption],
    label: impl Fn(&str) -> Option<String>,
    rng: &mut R,
) -> Bindings {
    let tree = ComponentTree::from_survey(survey);
    let mut bindings = Bindings::default();
    for component in tree.iter() {
        for group in random_groups(component).filter(|group| options.contains(&group.random_option)) {
            let members = members(component, group.codes.iter());
            let mut positions = members.iter().map(|(position, _)| *position).collect::<Vec<_>>();
            let mut codes = members.into_iter().map(|(_, code)| code).collect::<Vec<_>>();
            match group.random_option {
                RandomOption::Random => positions.shuffle(rng),
                RandomOption::Flip => {
                    if rng.gen_bool(0.5) {
                        positions.reverse();
                    }
                }
                RandomOption::Alpha => {
                    codes.sort_by_cached_key(|code| match label(code.as_str()) {
                        Some(label) => (false, label),
                        None => (true, String::new()),
                    });
                }
            }
            for (code, position) in codes.into_iter().zip(positions) {
                bindings.insert(Dependency::new(code, ReservedCode::Order), Value::from(position));
            }
        }
    }
    tracing::trace!(orders = bindings.len(), ?options, "random groups ordered");
    bindings
}

/// Draws a `priority` rank for every child of the priority groups.
///
/// Ranks come from a weighted draw without replacement, so a heavier child tends to get
/// a lower rank. Children are drawn uniformly when the weights cannot form a distribution.
pub fn set_priorities<R: Rng + ?Sized>(survey: &Survey, rng: &mut R) -> Bindings {
    let tree = ComponentTree::from_survey(survey);
    let mut bindings = Bindings::default();
    for component in tree.iter() {
        for group in priority_groups(component) {
            let mut remaining = group
                .weights
                .iter()
                .filter_map(|weight| Some((component.child_code(&weight.code)?.clone(), weight.weight)))
                .collect::<Vec<_>>();
            let mut rank = 0;
            while !remaining.is_empty() {
                let drawn = match WeightedIndex::new(remaining.iter().map(|(_, weight)| *weight)) {
                    Ok(distribution) => distribution.sample(rng),
                    Err(_) => rng.gen_range(0..remaining.len()),
                };
                let (code, _) = remaining.remove(drawn);
                bindings.insert(Dependency::new(code, ReservedCode::Priority), Value::from(rank));
                rank += 1;
            }
        }
    }
    bindings
}

/// Sorts every child list by the bound `order`; unbound children keep their position as key.
pub fn sort_by_order(survey: &Survey, bindings: &Bindings) -> Survey {
    survey.rewrite("", &mut |view| {
        let mut indices = (0..view.children.len()).collect::<Vec<_>>();
        indices.sort_by_key(|index| {
            bound_int(bindings, &view.children[*index], ReservedCode::Order).unwrap_or(*index as i64)
        });
        NodeEdit {
            children: Some(indices),
            ..NodeEdit::default()
        }
    })
}

/// Drops the children of priority groups ranked above the group limit.
pub fn apply_priorities(survey: &Survey, bindings: &Bindings) -> Survey {
    survey.rewrite("", &mut |view| {
        let hidden = view
            .instruction_list
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::PriorityGroups(groups) => Some(groups),
                _ => None,
            })
            .flat_map(|groups| groups.priorities.iter())
            .flat_map(|group| hidden_members(view, group, bindings))
            .collect::<Vec<_>>();
        if hidden.is_empty() {
            return NodeEdit::default();
        }
        NodeEdit {
            children: Some(
                (0..view.children.len())
                    .filter(|index| !hidden.contains(&view.children[*index]))
                    .collect(),
            ),
            ..NodeEdit::default()
        }
    })
}

fn hidden_members(parent: &NodeView<'_>, group: &PriorityGroup, bindings: &Bindings) -> Vec<SmolStr> {
    group
        .weights
        .iter()
        .map(|weight| match parent.element_type {
            ElementType::Survey | ElementType::Group => weight.code.clone(),
            ElementType::Question | ElementType::Answer => format_smolstr!("{}{}", parent.code, weight.code),
        })
        .filter(|code| bound_int(bindings, code, ReservedCode::Priority).is_some_and(|rank| rank > group.limit))
        .collect()
}

fn bound_int(bindings: &Bindings, code: &str, reserved_code: ReservedCode) -> Option<i64> {
    bindings.get(&Dependency::new(code, reserved_code)).and_then(Value::as_i64)
}

fn random_groups(component: &ChildlessComponent) -> impl Iterator<Item = &RandomGroup> {
    component
        .instruction_list
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::RandomGroups(random) => Some(random.groups.iter()),
            _ => None,
        })
        .flatten()
}

fn priority_groups(component: &ChildlessComponent) -> impl Iterator<Item = &PriorityGroup> {
    component
        .instruction_list
        .iter()
        .filter_map(|instruction| match instruction {
            Instruction::PriorityGroups(groups) => Some(groups.priorities.iter()),
            _ => None,
        })
        .flatten()
}

/// Sibling position and qualified code of each listed child, in sibling order.
fn members<'a>(component: &ChildlessComponent, codes: impl Iterator<Item = &'a SmolStr>) -> Vec<(usize, SmolStr)> {
    let mut members = codes
        .filter_map(|code| {
            let position = component.child_local_codes.iter().position(|child| child == code)?;
            Some((position, component.children.get(position)?.clone()))
        })
        .collect::<Vec<_>>();
    members.sort_by_key(|(position, _)| *position);
    members
}
