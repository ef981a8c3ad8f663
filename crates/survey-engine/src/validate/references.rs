use super::{Annotations, is_excluded};
use crate::model::{ComponentTree, Instruction, InstructionError, ReservedCode};

/// Flags references to missing slots and to slots that cannot be computed because their
/// instruction or component is broken. Running it again after new errors propagates the
/// breakage to the next layer of dependents.
pub(crate) fn check(tree: &ComponentTree, annotations: &mut Annotations) {
    let broken = broken_keys(tree);

    for (position, component) in tree.iter().enumerate() {
        if is_excluded(tree, &component.code) {
            continue;
        }
        for instruction in component.instruction_list.iter().filter(|i| !i.has_errors()) {
            match instruction {
                Instruction::Reference(reference) => {
                    for target in &reference.references {
                        if let Some(invalid_component) = resolve(tree, target) {
                            annotations.instruction(
                                position,
                                instruction.code(),
                                InstructionError::InvalidReference {
                                    reference: target.clone(),
                                    invalid_component,
                                },
                            );
                        }
                    }
                }
                Instruction::SimpleState(_) | Instruction::Skip(_) if instruction.is_active() => {
                    let Some(text) = instruction.text() else {
                        continue;
                    };
                    for key in broken.iter().filter(|key| text.contains(key.as_str())) {
                        annotations.instruction(
                            position,
                            instruction.code(),
                            InstructionError::InvalidReference {
                                reference: key.clone(),
                                invalid_component: true,
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

/// Value keys of states that will not exist at runtime.
fn broken_keys(tree: &ComponentTree) -> Vec<String> {
    tree.iter()
        .flat_map(|component| {
            let excluded = is_excluded(tree, &component.code);
            component
                .instruction_list
                .iter()
                .filter(move |instruction| excluded || instruction.has_errors())
                .filter_map(|instruction| instruction.dependency(&component.code))
                .map(|dependency| dependency.to_value_key())
        })
        .collect()
}

/// `None` when the reference resolves; otherwise whether the component itself is the problem.
fn resolve(tree: &ComponentTree, reference: &str) -> Option<bool> {
    let Some((code, slot)) = reference.split_once('.') else {
        return Some(true);
    };
    if tree.get(code).is_none() || is_excluded(tree, code) {
        return Some(true);
    }
    let Some(reserved_code) = ReservedCode::from_code(slot).filter(ReservedCode::is_accessible) else {
        return Some(false);
    };
    match tree.get(code).and_then(|component| component.instruction(reserved_code.code())) {
        Some(instruction) if instruction.has_errors() => Some(true),
        Some(_) => None,
        None => Some(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComponentError, Dependency, Group, Question, Reference, SimpleState, Survey};
    use crate::validate::bind::bind_reserved_slots;
    use rstest::rstest;

    fn reference(target: &str) -> Instruction {
        Reference::new("reference_label", vec![target.to_string()], "en").unwrap().into()
    }

    fn survey(instruction: Instruction) -> Survey {
        let mut survey = Survey::new(
            Vec::new(),
            vec![
                Group::new("G1").with_questions(vec![Question::new("Q1").with_instructions(vec![
                    SimpleState::new("", ReservedCode::Value).into(),
                    Instruction::from(SimpleState::new("Q9.value", ReservedCode::Validity))
                        .with_error(InstructionError::ForwardDependency(Dependency::new("Q9", ReservedCode::Value))),
                ])]),
                Group::new("G2").with_questions(vec![Question::new("Q2").with_instructions(vec![instruction])]),
                Group::new("G3"),
            ],
        );
        survey.groups[2].errors.push(ComponentError::EmptyParent);
        bind_reserved_slots(&survey)
    }

    fn errors(instruction: Instruction) -> Vec<InstructionError> {
        let survey = survey(instruction);
        let tree = ComponentTree::from_survey(&survey);
        let mut annotations = Annotations::default();
        check(&tree, &mut annotations);
        annotations.apply(&survey).groups[1].questions[0].instruction_list[0].errors().to_vec()
    }

    fn invalid(reference: &str, invalid_component: bool) -> Vec<InstructionError> {
        vec![InstructionError::InvalidReference {
            reference: reference.to_string(),
            invalid_component,
        }]
    }

    #[rstest]
    #[case::label("Q1.label", vec![])]
    #[case::value("Q1.value", vec![])]
    #[case::unknown_slot("G1.kabaka", invalid("G1.kabaka", false))]
    #[case::missing_slot("G1.value", invalid("G1.value", false))]
    #[case::broken_component("G3.label", invalid("G3.label", true))]
    #[case::missing_component("Q1Afirst_name.label", invalid("Q1Afirst_name.label", true))]
    #[case::broken_slot("Q1.validity", invalid("Q1.validity", true))]
    fn test_reference_resolution(#[case] target: &str, #[case] expected: Vec<InstructionError>) {
        assert_eq!(errors(reference(target)), expected);
    }

    #[rstest]
    #[case::healthy("Q1.value == 1", vec![])]
    #[case::broken_slot("Q1.validity && true", invalid("Q1.validity", true))]
    fn test_state_references(#[case] text: &str, #[case] expected: Vec<InstructionError>) {
        let state = SimpleState::new(text, ReservedCode::ConditionalRelevance).into();
        assert_eq!(errors(state), expected);
    }
}
