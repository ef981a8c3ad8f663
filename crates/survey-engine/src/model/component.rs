use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

use super::{Instruction, codes};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Survey,
    Group,
    Question,
    Answer,
}

impl ElementType {
    /// Survey, group and question codes are unique survey wide; answer codes only among siblings.
    pub fn has_unique_code(&self) -> bool {
        !matches!(self, ElementType::Answer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Survey => "SURVEY",
            ElementType::Group => "GROUP",
            ElementType::Question => "QUESTION",
            ElementType::Answer => "ANSWER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupType {
    #[default]
    Group,
    End,
}

/// Structural error attached to a component. A component carrying one is excluded from
/// the sanitized survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentError {
    DuplicateCode,
    EmptyParent,
    MisplacedEndGroup,
    NoEndGroup,
}

/// Read-only view of a node handed to [`SurveyComponent::rewrite`].
#[derive(Debug)]
pub struct NodeView<'a> {
    pub code: SmolStr,
    pub element_type: ElementType,
    pub group_type: Option<GroupType>,
    pub instruction_list: &'a [Instruction],
    pub errors: &'a [ComponentError],
    pub children: Vec<SmolStr>,
}

/// Replacement parts for a node. `None` keeps the current value; `children` lists the
/// indices of the children to keep, in their new order.
#[derive(Debug, Default)]
pub struct NodeEdit {
    pub instruction_list: Option<Vec<Instruction>>,
    pub errors: Option<Vec<ComponentError>>,
    pub children: Option<Vec<usize>>,
}

/// Flat, child-free copy of a component with its qualified code.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildlessComponent {
    pub code: SmolStr,
    pub local_code: SmolStr,
    pub parent_code: Option<SmolStr>,
    pub element_type: ElementType,
    pub group_type: Option<GroupType>,
    pub instruction_list: Vec<Instruction>,
    pub errors: Vec<ComponentError>,
    pub children: Vec<SmolStr>,
    pub child_local_codes: Vec<SmolStr>,
}

impl ChildlessComponent {
    /// Qualified code of the child with the given local code.
    pub fn child_code(&self, local_code: &str) -> Option<&SmolStr> {
        self.child_local_codes
            .iter()
            .position(|code| code == local_code)
            .and_then(|index| self.children.get(index))
    }

    pub fn instruction(&self, code: &str) -> Option<&Instruction> {
        self.instruction_list.iter().find(|instruction| instruction.code() == code)
    }

    pub fn is_end_group(&self) -> bool {
        self.group_type == Some(GroupType::End)
    }
}

/// Shared interface of survey, group, question and answer nodes.
pub trait SurveyComponent: Clone + Sized {
    type Child: SurveyComponent;
    const ELEMENT_TYPE: ElementType;

    fn code(&self) -> &str;
    fn instruction_list(&self) -> &[Instruction];
    fn errors(&self) -> &[ComponentError];
    fn children(&self) -> &[Self::Child];
    fn with_parts(&self, instruction_list: Vec<Instruction>, children: Vec<Self::Child>, errors: Vec<ComponentError>) -> Self;

    fn group_type(&self) -> Option<GroupType> {
        None
    }

    fn with_children(&self, children: Vec<Self::Child>) -> Self {
        self.with_parts(self.instruction_list().to_vec(), children, self.errors().to_vec())
    }

    fn with_errors(&self, errors: Vec<ComponentError>) -> Self {
        self.with_parts(self.instruction_list().to_vec(), self.children().to_vec(), errors)
    }

    fn unique_code(&self, parent_code: &str) -> SmolStr {
        if Self::ELEMENT_TYPE.has_unique_code() {
            SmolStr::new(self.code())
        } else {
            format_smolstr!("{parent_code}{}", self.code())
        }
    }

    /// True when this node or anything below it carries an error.
    fn has_errors(&self) -> bool {
        !self.errors().is_empty()
            || self.instruction_list().iter().any(Instruction::has_errors)
            || self.children().iter().any(SurveyComponent::has_errors)
    }

    /// Rebuilds the subtree in pre-order, letting `f` replace the parts of every node.
    fn rewrite(&self, parent_code: &str, f: &mut dyn FnMut(&NodeView<'_>) -> NodeEdit) -> Self {
        let code = self.unique_code(parent_code);
        let view = NodeView {
            children: self.children().iter().map(|child| child.unique_code(&code)).collect(),
            code: code.clone(),
            element_type: Self::ELEMENT_TYPE,
            group_type: self.group_type(),
            instruction_list: self.instruction_list(),
            errors: self.errors(),
        };
        let edit = f(&view);
        let indices = edit.children.unwrap_or_else(|| (0..self.children().len()).collect());
        let mut children = Vec::with_capacity(indices.len());
        for index in indices {
            if let Some(child) = self.children().get(index) {
                children.push(child.rewrite(&code, &mut *f));
            }
        }
        self.with_parts(
            edit.instruction_list.unwrap_or_else(|| self.instruction_list().to_vec()),
            children,
            edit.errors.unwrap_or_else(|| self.errors().to_vec()),
        )
    }

    fn clear_errors(&self) -> Self {
        self.rewrite("", &mut |view| NodeEdit {
            instruction_list: Some(view.instruction_list.iter().map(Instruction::clear_errors).collect()),
            errors: Some(Vec::new()),
            children: None,
        })
    }

    /// Drops erroneous instructions and every component carrying a component error.
    fn sanitize(&self) -> Self {
        self.rewrite("", &mut |view| NodeEdit {
            instruction_list: Some(
                view.instruction_list
                    .iter()
                    .filter(|instruction| !instruction.has_errors())
                    .cloned()
                    .collect(),
            ),
            errors: None,
            children: None,
        })
        .drop_erroneous_children()
    }

    fn drop_erroneous_children(&self) -> Self {
        self.with_children(
            self.children()
                .iter()
                .filter(|child| child.errors().is_empty())
                .map(SurveyComponent::drop_erroneous_children)
                .collect(),
        )
    }

    fn flatten_into(&self, parent_code: Option<&SmolStr>, out: &mut Vec<ChildlessComponent>) {
        let code = self.unique_code(parent_code.map(SmolStr::as_str).unwrap_or_default());
        out.push(ChildlessComponent {
            children: self.children().iter().map(|child| child.unique_code(&code)).collect(),
            child_local_codes: self.children().iter().map(|child| SmolStr::new(child.code())).collect(),
            code: code.clone(),
            local_code: SmolStr::new(self.code()),
            parent_code: parent_code.cloned(),
            element_type: Self::ELEMENT_TYPE,
            group_type: self.group_type(),
            instruction_list: self.instruction_list().to_vec(),
            errors: self.errors().to_vec(),
        });
        for child in self.children() {
            child.flatten_into(Some(&code), out);
        }
    }

    fn check_codes(&self) -> Result<()> {
        if !codes::is_valid_component_code(Self::ELEMENT_TYPE, self.code()) {
            return Err(EngineError::InvalidCode {
                code: self.code().to_string(),
                element: Self::ELEMENT_TYPE.as_str().to_string(),
            });
        }
        self.children().iter().try_for_each(SurveyComponent::check_codes)
    }
}

fn survey_code() -> SmolStr {
    SmolStr::new_static(codes::SURVEY_CODE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    #[serde(default = "survey_code", skip_deserializing)]
    code: SmolStr,
    #[serde(default)]
    pub instruction_list: Vec<Instruction>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub errors: Vec<ComponentError>,
}

impl Default for Survey {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl Survey {
    pub fn new(instruction_list: Vec<Instruction>, groups: Vec<Group>) -> Self {
        Self {
            code: survey_code(),
            instruction_list,
            groups,
            errors: Vec::new(),
        }
    }

    /// Every component in pre-order, survey first.
    pub fn flatten(&self) -> Vec<ChildlessComponent> {
        let mut components = Vec::new();
        self.flatten_into(None, &mut components);
        components
    }

    pub fn group(&self, code: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.code == code)
    }

    /// The question with the given code and the group holding it.
    pub fn question(&self, code: &str) -> Option<(&Group, &Question)> {
        self.groups
            .iter()
            .find_map(|group| group.questions.iter().find(|q| q.code == code).map(|q| (group, q)))
    }

    pub fn last_group(&self) -> Option<&Group> {
        self.groups.last()
    }

    /// Copy with the survey level instruction of the same code replaced, or appended.
    pub fn replace_or_add_instruction(&self, instruction: Instruction) -> Survey {
        let mut instruction_list = self
            .instruction_list
            .iter()
            .filter(|existing| existing.code() != instruction.code())
            .cloned()
            .collect::<Vec<_>>();
        match self
            .instruction_list
            .iter()
            .position(|existing| existing.code() == instruction.code())
        {
            Some(position) => instruction_list.insert(position, instruction),
            None => instruction_list.push(instruction),
        }
        self.with_parts(instruction_list, self.groups.clone(), self.errors.clone())
    }
}

impl SurveyComponent for Survey {
    type Child = Group;
    const ELEMENT_TYPE: ElementType = ElementType::Survey;

    fn code(&self) -> &str {
        &self.code
    }

    fn instruction_list(&self) -> &[Instruction] {
        &self.instruction_list
    }

    fn errors(&self) -> &[ComponentError] {
        &self.errors
    }

    fn children(&self) -> &[Group] {
        &self.groups
    }

    fn with_parts(&self, instruction_list: Vec<Instruction>, children: Vec<Group>, errors: Vec<ComponentError>) -> Self {
        Self {
            code: self.code.clone(),
            instruction_list,
            groups: children,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub code: SmolStr,
    #[serde(default)]
    pub instruction_list: Vec<Instruction>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub group_type: GroupType,
    #[serde(default)]
    pub errors: Vec<ComponentError>,
}

impl Group {
    pub fn new(code: impl Into<SmolStr>) -> Self {
        Self {
            code: code.into(),
            instruction_list: Vec::new(),
            questions: Vec::new(),
            group_type: GroupType::Group,
            errors: Vec::new(),
        }
    }

    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self
    }

    pub fn with_instructions(mut self, instruction_list: Vec<Instruction>) -> Self {
        self.instruction_list = instruction_list;
        self
    }

    pub fn with_group_type(mut self, group_type: GroupType) -> Self {
        self.group_type = group_type;
        self
    }

    pub fn is_end(&self) -> bool {
        self.group_type == GroupType::End
    }
}

impl SurveyComponent for Group {
    type Child = Question;
    const ELEMENT_TYPE: ElementType = ElementType::Group;

    fn code(&self) -> &str {
        &self.code
    }

    fn instruction_list(&self) -> &[Instruction] {
        &self.instruction_list
    }

    fn errors(&self) -> &[ComponentError] {
        &self.errors
    }

    fn children(&self) -> &[Question] {
        &self.questions
    }

    fn group_type(&self) -> Option<GroupType> {
        Some(self.group_type)
    }

    fn with_parts(&self, instruction_list: Vec<Instruction>, children: Vec<Question>, errors: Vec<ComponentError>) -> Self {
        Self {
            code: self.code.clone(),
            instruction_list,
            questions: children,
            group_type: self.group_type,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub code: SmolStr,
    #[serde(default)]
    pub instruction_list: Vec<Instruction>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub errors: Vec<ComponentError>,
}

impl Question {
    pub fn new(code: impl Into<SmolStr>) -> Self {
        Self {
            code: code.into(),
            instruction_list: Vec::new(),
            answers: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_answers(mut self, answers: Vec<Answer>) -> Self {
        self.answers = answers;
        self
    }

    pub fn with_instructions(mut self, instruction_list: Vec<Instruction>) -> Self {
        self.instruction_list = instruction_list;
        self
    }
}

impl SurveyComponent for Question {
    type Child = Answer;
    const ELEMENT_TYPE: ElementType = ElementType::Question;

    fn code(&self) -> &str {
        &self.code
    }

    fn instruction_list(&self) -> &[Instruction] {
        &self.instruction_list
    }

    fn errors(&self) -> &[ComponentError] {
        &self.errors
    }

    fn children(&self) -> &[Answer] {
        &self.answers
    }

    fn with_parts(&self, instruction_list: Vec<Instruction>, children: Vec<Answer>, errors: Vec<ComponentError>) -> Self {
        Self {
            code: self.code.clone(),
            instruction_list,
            answers: children,
            errors,
        }
    }
}

/// Answer option; answers may nest further answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub code: SmolStr,
    #[serde(default)]
    pub instruction_list: Vec<Instruction>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub errors: Vec<ComponentError>,
}

impl Answer {
    pub fn new(code: impl Into<SmolStr>) -> Self {
        Self {
            code: code.into(),
            instruction_list: Vec::new(),
            answers: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_answers(mut self, answers: Vec<Answer>) -> Self {
        self.answers = answers;
        self
    }

    pub fn with_instructions(mut self, instruction_list: Vec<Instruction>) -> Self {
        self.instruction_list = instruction_list;
        self
    }
}

impl SurveyComponent for Answer {
    type Child = Answer;
    const ELEMENT_TYPE: ElementType = ElementType::Answer;

    fn code(&self) -> &str {
        &self.code
    }

    fn instruction_list(&self) -> &[Instruction] {
        &self.instruction_list
    }

    fn errors(&self) -> &[ComponentError] {
        &self.errors
    }

    fn children(&self) -> &[Answer] {
        &self.answers
    }

    fn with_parts(&self, instruction_list: Vec<Instruction>, children: Vec<Answer>, errors: Vec<ComponentError>) -> Self {
        Self {
            code: self.code.clone(),
            instruction_list,
            answers: children,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstructionError, ReservedCode, SimpleState};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn survey() -> Survey {
        Survey::new(
            Vec::new(),
            vec![
                Group::new("G1").with_questions(vec![
                    Question::new("Q1").with_answers(vec![Answer::new("A1"), Answer::new("A2")]),
                    Question::new("Q2"),
                ]),
                Group::new("G2").with_group_type(GroupType::End),
            ],
        )
    }

    #[rstest]
    fn test_flatten_qualifies_answer_codes(survey: Survey) {
        let codes = survey.flatten().into_iter().map(|c| c.code).collect::<Vec<_>>();
        assert_eq!(codes, vec!["Survey", "G1", "Q1", "Q1A1", "Q1A2", "Q2", "G2"]);
    }

    #[rstest]
    fn test_flatten_links_parents(survey: Survey) {
        let components = survey.flatten();
        let answer = components.iter().find(|c| c.code == "Q1A2").unwrap();
        assert_eq!(answer.parent_code.as_deref(), Some("Q1"));
        assert_eq!(answer.local_code, "A2");
        let question = components.iter().find(|c| c.code == "Q1").unwrap();
        assert_eq!(question.child_code("A1").map(SmolStr::as_str), Some("Q1A1"));
    }

    #[rstest]
    fn test_rewrite_reorders_children(survey: Survey) {
        let rewritten = survey.rewrite("", &mut |view| NodeEdit {
            children: (view.code == "Q1").then(|| vec![1, 0]),
            ..NodeEdit::default()
        });
        let answers = &rewritten.groups[0].questions[0].answers;
        assert_eq!(answers.iter().map(|a| a.code.as_str()).collect::<Vec<_>>(), vec!["A2", "A1"]);
    }

    #[rstest]
    fn test_replace_or_add_instruction(survey: Survey) {
        let survey = survey.with_parts(
            vec![
                SimpleState::new("en", ReservedCode::Lang).into(),
                SimpleState::new("online", ReservedCode::Mode).into(),
            ],
            survey.groups.clone(),
            Vec::new(),
        );
        let replaced = survey.replace_or_add_instruction(SimpleState::new("de", ReservedCode::Lang).into());
        let texts = replaced
            .instruction_list
            .iter()
            .map(|instruction| (instruction.code().to_string(), instruction.text().map(|text| text.into_owned())))
            .collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec![
                ("lang".to_string(), Some("de".to_string())),
                ("mode".to_string(), Some("online".to_string())),
            ]
        );
        assert_eq!(survey.instruction_list[0].text().as_deref(), Some("en"));

        let added = survey.replace_or_add_instruction(SimpleState::new("true", ReservedCode::Validity).into());
        assert_eq!(added.instruction_list.len(), 3);
        assert_eq!(added.instruction_list[2].code(), "validity");
    }

    #[rstest]
    fn test_with_children_keeps_errors(survey: Survey) {
        let group = survey.groups[0].with_errors(vec![ComponentError::EmptyParent]);
        let replaced = group.with_children(vec![Question::new("Q9")]);
        assert_eq!(replaced.errors, vec![ComponentError::EmptyParent]);
        assert_eq!(replaced.questions.len(), 1);
        assert_eq!(replaced.questions[0].code, "Q9");
        assert!(survey.groups[0].errors.is_empty());
    }

    #[rstest]
    fn test_sanitize_drops_errors(survey: Survey) {
        let mut survey = survey;
        survey.groups[0].questions[1].errors.push(ComponentError::DuplicateCode);
        survey.groups[0].questions[0].instruction_list = vec![
            Instruction::from(SimpleState::new("true", ReservedCode::Relevance)).with_error(InstructionError::SkipToEndOfEndGroup),
            Instruction::from(SimpleState::new("", ReservedCode::Value)),
        ];
        assert!(survey.has_errors());

        let sanitized = survey.sanitize();
        assert!(!sanitized.has_errors());
        assert_eq!(sanitized.groups[0].questions.len(), 1);
        assert_eq!(sanitized.groups[0].questions[0].instruction_list.len(), 1);
        assert!(!survey.clear_errors().has_errors());
    }

    #[rstest]
    #[case::valid(Survey::new(Vec::new(), vec![Group::new("G1").with_questions(vec![Question::new("Q1")])]), true)]
    #[case::bad_group(Survey::new(Vec::new(), vec![Group::new("Q1")]), false)]
    #[case::bad_answer(
        Survey::new(Vec::new(), vec![Group::new("G1").with_questions(vec![Question::new("Q1").with_answers(vec![Answer::new("A-1")])])]),
        false
    )]
    fn test_check_codes(#[case] survey: Survey, #[case] expected: bool) {
        assert_eq!(survey.check_codes().is_ok(), expected);
    }

    #[test]
    fn test_deserialize_survey() {
        let survey: Survey = serde_json::from_value(json!({
            "code": "Ignored",
            "groups": [{
                "code": "G1",
                "groupType": "END",
                "questions": [{"code": "Q2", "instructionList": [], "answers": [], "errors": []}]
            }]
        }))
        .unwrap();
        assert_eq!(survey.code(), "Survey");
        assert!(survey.groups[0].is_end());
        assert_eq!(survey.question("Q2").map(|(g, _)| g.code.as_str()), Some("G1"));
    }
}
