use smol_str::SmolStr;

use crate::model::{ElementType, Group, NavigationIndex, Survey, SurveyComponent};

/// The survey restricted to what `index` shows.
pub fn reduce(survey: &Survey, index: &NavigationIndex) -> Survey {
    let groups = match index {
        NavigationIndex::Groups { group_ids, .. } => survey
            .groups
            .iter()
            .filter(|group| group_ids.contains(&group.code))
            .cloned()
            .collect(),
        NavigationIndex::Group { group_id, .. } | NavigationIndex::End { group_id } => {
            survey.group(group_id).cloned().into_iter().collect()
        }
        NavigationIndex::Question { question_id, .. } => survey
            .question(question_id)
            .map(|(group, question)| group.with_children(vec![question.clone()]))
            .into_iter()
            .collect::<Vec<Group>>(),
    };
    survey.with_children(groups)
}

/// Qualified codes of every group, question and answer shown at `index`.
pub fn components_in_navigation(survey: &Survey, index: &NavigationIndex) -> Vec<SmolStr> {
    reduce(survey, index)
        .flatten()
        .into_iter()
        .filter(|component| component.element_type != ElementType::Survey)
        .map(|component| component.code)
        .collect()
}
