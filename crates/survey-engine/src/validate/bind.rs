use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::model::{
    ChildlessComponent, ComponentTree, ElementType, Instruction, NodeEdit, ReservedCode, SimpleState, Survey,
    SurveyComponent,
};

/// Attaches derived slots to the survey. Authored instructions are never replaced.
pub(crate) fn bind_reserved_slots(survey: &Survey) -> Survey {
    let tree = ComponentTree::from_survey(survey);
    let label_targets = label_targets(&tree);
    let (order_targets, priority_targets) = group_targets(&tree);

    let mut with_relevance = FxHashSet::default();
    let mut additions: FxHashMap<usize, Vec<Instruction>> = FxHashMap::default();

    for (position, component) in tree.iter().enumerate() {
        let mut added = Vec::new();
        let has = |code: &ReservedCode| component.instruction(code.code()).is_some();

        let mut has_children_relevance = has_valid(component, &ReservedCode::ChildrenRelevance);
        if !has(&ReservedCode::ChildrenRelevance)
            && let Some(text) = children_relevance_text(&tree, component)
        {
            added.push(active_state(text, ReservedCode::ChildrenRelevance));
            has_children_relevance = true;
        }

        if has(&ReservedCode::Relevance) {
            if has_valid(component, &ReservedCode::Relevance) {
                with_relevance.insert(component.code.clone());
            }
        } else if component.element_type != ElementType::Survey {
            let parent = component
                .parent_code
                .as_ref()
                .filter(|parent| with_relevance.contains(*parent))
                .map(|parent| format!("{parent}.relevance"));
            let conditional = has_valid(component, &ReservedCode::ConditionalRelevance)
                .then(|| format!("{}.{}", component.code, ReservedCode::ConditionalRelevance));
            let children = has_children_relevance.then(|| format!("{}.{}", component.code, ReservedCode::ChildrenRelevance));
            let terms = [parent, conditional, children].into_iter().flatten().collect::<Vec<_>>();
            if !terms.is_empty() {
                added.push(active_state(terms.join(" && "), ReservedCode::Relevance));
                with_relevance.insert(component.code.clone());
            }
        }

        let passive = [
            (label_targets.contains(&component.code), ReservedCode::Label),
            (order_targets.contains(&component.code), ReservedCode::Order),
            (priority_targets.contains(&component.code), ReservedCode::Priority),
            (component.element_type == ElementType::Survey, ReservedCode::Lang),
            (component.element_type == ElementType::Survey, ReservedCode::Mode),
        ];
        for (wanted, code) in passive {
            if wanted && !has(&code) {
                added.push(SimpleState::new("", code).into());
            }
        }

        if !added.is_empty() {
            additions.insert(position, added);
        }
    }

    tracing::trace!(components = additions.len(), "reserved slots bound");
    let mut position = 0;
    survey.rewrite("", &mut |view| {
        let current = position;
        position += 1;
        match additions.remove(&current) {
            Some(added) => NodeEdit {
                instruction_list: Some(view.instruction_list.iter().cloned().chain(added).collect()),
                ..NodeEdit::default()
            },
            None => NodeEdit::default(),
        }
    })
}

fn active_state(text: String, code: ReservedCode) -> Instruction {
    SimpleState::new(text, code).with_active(true).into()
}

fn has_valid(component: &ChildlessComponent, code: &ReservedCode) -> bool {
    component
        .instruction(code.code())
        .is_some_and(|instruction| !instruction.has_errors())
}

/// AND over child groups of the OR of the children's conditional relevance. A child
/// without conditional relevance makes its whole group true.
fn children_relevance_text(tree: &ComponentTree, component: &ChildlessComponent) -> Option<String> {
    let relevance = component.instruction_list.iter().find_map(|instruction| match instruction {
        Instruction::ParentRelevance(relevance) if !instruction.has_errors() => Some(relevance),
        _ => None,
    })?;
    let groups = relevance
        .children
        .iter()
        .filter_map(|group| {
            let terms = group
                .iter()
                .unique()
                .map(|code| {
                    let child = component.child_code(code).and_then(|code| tree.get(code))?;
                    has_valid(child, &ReservedCode::ConditionalRelevance)
                        .then(|| format!("{}.{}", child.code, ReservedCode::ConditionalRelevance))
                })
                .collect::<Option<Vec<_>>>()?;
            match terms.len() {
                0 => None,
                1 => terms.into_iter().next(),
                _ => Some(format!("({})", terms.join(" || "))),
            }
        })
        .collect::<Vec<_>>();
    (!groups.is_empty()).then(|| groups.join(" && "))
}

fn label_targets(tree: &ComponentTree) -> FxHashSet<SmolStr> {
    tree.iter()
        .flat_map(|component| component.instruction_list.iter())
        .filter_map(|instruction| match instruction {
            Instruction::Reference(reference) if !instruction.has_errors() => Some(reference),
            _ => None,
        })
        .flat_map(|reference| reference.references.iter())
        .filter_map(|reference| reference.split_once('.'))
        .filter(|(code, slot)| *slot == ReservedCode::Label.code() && tree.get(code).is_some())
        .map(|(code, _)| SmolStr::new(code))
        .collect()
}

/// Qualified codes of children taking part in random and priority groups.
fn group_targets(tree: &ComponentTree) -> (FxHashSet<SmolStr>, FxHashSet<SmolStr>) {
    let mut order = FxHashSet::default();
    let mut priority = FxHashSet::default();
    for component in tree.iter() {
        for instruction in component.instruction_list.iter().filter(|i| !i.has_errors()) {
            match instruction {
                Instruction::RandomGroups(random) => order.extend(
                    random
                        .groups
                        .iter()
                        .flat_map(|group| group.codes.iter())
                        .filter_map(|code| component.child_code(code).cloned()),
                ),
                Instruction::PriorityGroups(groups) => priority.extend(
                    groups
                        .priorities
                        .iter()
                        .flat_map(|group| group.weights.iter())
                        .filter_map(|weight| component.child_code(&weight.code).cloned()),
                ),
                _ => {}
            }
        }
    }
    (order, priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, Group, ParentRelevance, Question, RandomGroup, RandomGroups, RandomOption, Reference};
    use rstest::rstest;

    fn cr(text: &str) -> Instruction {
        SimpleState::new(text, ReservedCode::ConditionalRelevance).into()
    }

    fn text_of(tree: &ComponentTree, code: &str, slot: ReservedCode) -> Option<String> {
        tree.get(code)
            .and_then(|component| component.instruction(slot.code()))
            .and_then(|instruction| instruction.text().map(|text| text.into_owned()))
    }

    fn parent_relevance(children: Vec<Vec<&str>>) -> Instruction {
        Instruction::ParentRelevance(ParentRelevance {
            children: children
                .into_iter()
                .map(|group| group.into_iter().map(SmolStr::new).collect())
                .collect(),
            errors: Vec::new(),
        })
    }

    #[rstest]
    #[case::single_group(
        vec![vec!["A1", "A2"]],
        Some("(Q1A1.conditional_relevance || Q1A2.conditional_relevance)")
    )]
    #[case::two_groups(
        vec![vec!["A1"], vec!["A2", "A4"]],
        Some("Q1A1.conditional_relevance && (Q1A2.conditional_relevance || Q1A4.conditional_relevance)")
    )]
    #[case::trivially_true_group(vec![vec!["A1", "A3"], vec!["A2"]], Some("Q1A2.conditional_relevance"))]
    #[case::trivially_true(vec![vec!["A3"]], None)]
    fn test_children_relevance(#[case] children: Vec<Vec<&str>>, #[case] expected: Option<&str>) {
        let survey = Survey::new(
            Vec::new(),
            vec![Group::new("G1").with_questions(vec![
                Question::new("Q1")
                    .with_instructions(vec![parent_relevance(children)])
                    .with_answers(vec![
                        Answer::new("A1").with_instructions(vec![cr("true")]),
                        Answer::new("A2").with_instructions(vec![cr("false")]),
                        Answer::new("A3"),
                        Answer::new("A4").with_instructions(vec![cr("true")]),
                    ]),
            ])],
        );
        let tree = ComponentTree::from_survey(&bind_reserved_slots(&survey));
        assert_eq!(text_of(&tree, "Q1", ReservedCode::ChildrenRelevance).as_deref(), expected);
    }

    #[test]
    fn test_relevance_cascades() {
        let survey = Survey::new(
            Vec::new(),
            vec![Group::new("G1").with_instructions(vec![cr("true")]).with_questions(vec![
                Question::new("Q1").with_answers(vec![Answer::new("A1").with_instructions(vec![cr("Q2.value == 1")])]),
                Question::new("Q2")
                    .with_instructions(vec![SimpleState::new("G1.relevance && false", ReservedCode::Relevance).into()]),
            ])],
        );
        let tree = ComponentTree::from_survey(&bind_reserved_slots(&survey));

        assert_eq!(text_of(&tree, "G1", ReservedCode::Relevance).as_deref(), Some("G1.conditional_relevance"));
        assert_eq!(text_of(&tree, "Q1", ReservedCode::Relevance).as_deref(), Some("G1.relevance"));
        assert_eq!(
            text_of(&tree, "Q1A1", ReservedCode::Relevance).as_deref(),
            Some("Q1.relevance && Q1A1.conditional_relevance")
        );
        // authored relevance is kept as is
        assert_eq!(text_of(&tree, "Q2", ReservedCode::Relevance).as_deref(), Some("G1.relevance && false"));
        assert!(text_of(&tree, "Survey", ReservedCode::Relevance).is_none());
    }

    #[test]
    fn test_passive_slots() {
        let survey = Survey::new(
            vec![Instruction::RandomGroups(RandomGroups {
                groups: vec![RandomGroup::new(vec![SmolStr::new("G2"), SmolStr::new("G3")], RandomOption::Random)],
                errors: Vec::new(),
            })],
            ["G1", "G2", "G3"]
                .into_iter()
                .map(|code| Group::new(code).with_questions(vec![Question::new(format!("Q{code}"))]))
                .collect(),
        );
        let mut survey = survey;
        survey.groups[0].questions[0].instruction_list =
            vec![Reference::new("reference_label", vec!["G2.label".to_string(), "G9.label".to_string()], "en").unwrap().into()];
        let tree = ComponentTree::from_survey(&bind_reserved_slots(&survey));

        assert!(text_of(&tree, "G2", ReservedCode::Order).is_some());
        assert!(text_of(&tree, "G3", ReservedCode::Order).is_some());
        assert!(text_of(&tree, "G1", ReservedCode::Order).is_none());
        assert_eq!(text_of(&tree, "G2", ReservedCode::Label).as_deref(), Some(""));
        assert!(text_of(&tree, "Survey", ReservedCode::Lang).is_some());
        assert!(text_of(&tree, "Survey", ReservedCode::Mode).is_some());
        let label = tree.get("G2").and_then(|c| c.instruction("label")).map(Instruction::is_active);
        assert_eq!(label, Some(false));
    }
}
