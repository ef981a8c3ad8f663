use itertools::Itertools;

use crate::model::{
    ColumnName, ComponentTree, DataType, ElementType, Instruction, RandomOption, ReservedCode, ResponseField,
};

/// Persisted response fields of a sanitized survey.
pub fn response_schema(tree: &ComponentTree) -> Vec<ResponseField> {
    let mut fields = Vec::new();
    for component in tree.iter() {
        if matches!(component.element_type, ElementType::Question | ElementType::Answer)
            && let Some(return_type) = component
                .instruction(ReservedCode::Value.code())
                .filter(|instruction| !instruction.has_errors())
                .and_then(Instruction::return_type)
        {
            fields.push(ResponseField::new(
                component.code.clone(),
                ColumnName::Value,
                return_type.to_data_type(),
            ));
        }

        for instruction in component.instruction_list.iter().filter(|i| !i.has_errors()) {
            match instruction {
                Instruction::RandomGroups(random) => fields.extend(
                    random
                        .groups
                        .iter()
                        .filter(|group| matches!(group.random_option, RandomOption::Random | RandomOption::Flip))
                        .flat_map(|group| group.codes.iter())
                        .filter_map(|code| component.child_code(code))
                        .map(|code| ResponseField::new(code.clone(), ColumnName::Order, DataType::Int)),
                ),
                Instruction::PriorityGroups(priority) => fields.extend(
                    priority
                        .priorities
                        .iter()
                        .flat_map(|group| group.weights.iter())
                        .filter_map(|weight| component.child_code(&weight.code))
                        .map(|code| ResponseField::new(code.clone(), ColumnName::Priority, DataType::Int)),
                ),
                _ => {}
            }
        }
    }
    fields.into_iter().unique().collect()
}
