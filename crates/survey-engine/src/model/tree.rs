use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::{ChildlessComponent, Survey};

/// Flattened survey with code lookups.
///
/// Components keep their pre-order position, which is the document order used by
/// forward dependency detection and by the navigator.
#[derive(Debug, Clone, Default)]
pub struct ComponentTree {
    components: Vec<ChildlessComponent>,
    positions: FxHashMap<SmolStr, usize>,
}

impl ComponentTree {
    pub fn new(components: Vec<ChildlessComponent>) -> Self {
        let mut positions = FxHashMap::default();
        for (position, component) in components.iter().enumerate() {
            positions.entry(component.code.clone()).or_insert(position);
        }
        Self { components, positions }
    }

    pub fn from_survey(survey: &Survey) -> Self {
        Self::new(survey.flatten())
    }

    pub fn components(&self) -> &[ChildlessComponent] {
        &self.components
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildlessComponent> {
        self.components.iter()
    }

    pub fn get(&self, code: &str) -> Option<&ChildlessComponent> {
        self.position(code).and_then(|position| self.components.get(position))
    }

    /// Pre-order position of the first component with this code.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.positions.get(code).copied()
    }

    pub fn parent(&self, code: &str) -> Option<&ChildlessComponent> {
        self.get(code)
            .and_then(|component| component.parent_code.as_deref())
            .and_then(|parent| self.get(parent))
    }

    /// Ancestors of `code`, nearest first.
    pub fn parents(&self, code: &str) -> Vec<&ChildlessComponent> {
        let mut parents = Vec::new();
        let mut current = self.parent(code);
        while let Some(parent) = current {
            if parents.len() > self.components.len() {
                break;
            }
            parents.push(parent);
            current = self.parent(&parent.code);
        }
        parents
    }

    pub fn is_descendant(&self, code: &str, ancestor: &str) -> bool {
        self.parents(code).iter().any(|parent| parent.code == ancestor)
    }

    /// Nearest component that is a strict ancestor of both codes.
    pub fn common_parent(&self, first: &str, second: &str) -> Option<&ChildlessComponent> {
        let second_parents = self.parents(second);
        self.parents(first)
            .into_iter()
            .find(|parent| second_parents.iter().any(|other| other.code == parent.code))
    }

    /// The ancestor-or-self of `code` that is a direct child of `parent`.
    pub fn child_on_path(&self, code: &str, parent: &str) -> Option<&ChildlessComponent> {
        let mut current = self.get(code)?;
        loop {
            match current.parent_code.as_deref() {
                Some(parent_code) if parent_code == parent => return Some(current),
                Some(parent_code) => current = self.get(parent_code)?,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, Group, Question};
    use rstest::{fixture, rstest};

    #[fixture]
    fn tree() -> ComponentTree {
        ComponentTree::from_survey(&Survey::new(
            Vec::new(),
            vec![
                Group::new("G1").with_questions(vec![
                    Question::new("Q1").with_answers(vec![Answer::new("A1"), Answer::new("A2")]),
                    Question::new("Q2").with_answers(vec![Answer::new("A1")]),
                ]),
                Group::new("G2").with_questions(vec![Question::new("Q3")]),
            ],
        ))
    }

    #[rstest]
    fn test_parents(tree: ComponentTree) {
        let parents = tree.parents("Q1A2").into_iter().map(|c| c.code.as_str()).collect::<Vec<_>>();
        assert_eq!(parents, vec!["Q1", "G1", "Survey"]);
        assert!(tree.parents("Survey").is_empty());
    }

    #[rstest]
    #[case::answer_and_question("Q1A1", "Q2", Some("G1"))]
    #[case::sibling_answers("Q1A1", "Q1A2", Some("Q1"))]
    #[case::across_groups("Q1", "Q3", Some("Survey"))]
    #[case::ancestor("Q1A1", "G1", Some("Survey"))]
    #[case::missing("Q1A1", "Q9", None)]
    fn test_common_parent(tree: ComponentTree, #[case] first: &str, #[case] second: &str, #[case] expected: Option<&str>) {
        assert_eq!(tree.common_parent(first, second).map(|c| c.code.as_str()), expected);
    }

    #[rstest]
    fn test_child_on_path(tree: ComponentTree) {
        assert_eq!(tree.child_on_path("Q2A1", "Survey").map(|c| c.code.as_str()), Some("G1"));
        assert_eq!(tree.child_on_path("Q2A1", "G1").map(|c| c.code.as_str()), Some("Q2"));
        assert!(tree.child_on_path("Q2A1", "G2").is_none());
        assert!(tree.is_descendant("Q2A1", "G1"));
        assert!(!tree.is_descendant("Q2A1", "G2"));
    }
}
