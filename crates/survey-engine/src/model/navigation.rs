use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use smol_str::SmolStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigationMode {
    AllInOne,
    #[default]
    GroupByGroup,
    QuestionByQuestion,
}

impl FromStr for NavigationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL_IN_ONE" => Ok(NavigationMode::AllInOne),
            "GROUP_BY_GROUP" => Ok(NavigationMode::GroupByGroup),
            "QUESTION_BY_QUESTION" => Ok(NavigationMode::QuestionByQuestion),
            _ => Err(EngineError::InvalidInstruction(format!("unknown navigation mode `{s}`"))),
        }
    }
}

/// Position of a respondent in the survey.
///
/// `show_error` asks the host to display validation errors of the current page and is
/// never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawNavigationIndex")]
pub enum NavigationIndex {
    Groups { group_ids: Vec<SmolStr>, show_error: bool },
    Group { group_id: SmolStr, show_error: bool },
    Question { question_id: SmolStr, show_error: bool },
    End { group_id: SmolStr },
}

impl NavigationIndex {
    pub fn groups(group_ids: Vec<SmolStr>) -> Self {
        NavigationIndex::Groups {
            group_ids,
            show_error: false,
        }
    }

    pub fn group(group_id: impl Into<SmolStr>) -> Self {
        NavigationIndex::Group {
            group_id: group_id.into(),
            show_error: false,
        }
    }

    pub fn question(question_id: impl Into<SmolStr>) -> Self {
        NavigationIndex::Question {
            question_id: question_id.into(),
            show_error: false,
        }
    }

    pub fn end(group_id: impl Into<SmolStr>) -> Self {
        NavigationIndex::End {
            group_id: group_id.into(),
        }
    }

    pub fn show_error(&self) -> bool {
        match self {
            NavigationIndex::Groups { show_error, .. }
            | NavigationIndex::Group { show_error, .. }
            | NavigationIndex::Question { show_error, .. } => *show_error,
            NavigationIndex::End { .. } => false,
        }
    }

    /// Copy with the error flag set; `End` never carries it.
    pub fn with_show_error(&self, value: bool) -> Self {
        let mut index = self.clone();
        match &mut index {
            NavigationIndex::Groups { show_error, .. }
            | NavigationIndex::Group { show_error, .. }
            | NavigationIndex::Question { show_error, .. } => *show_error = value,
            NavigationIndex::End { .. } => {}
        }
        index
    }

    pub fn is_end(&self) -> bool {
        matches!(self, NavigationIndex::End { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            NavigationIndex::Groups { .. } => "groups",
            NavigationIndex::Group { .. } => "group",
            NavigationIndex::Question { .. } => "question",
            NavigationIndex::End { .. } => "end",
        }
    }
}

impl fmt::Display for NavigationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationIndex::Groups { group_ids, .. } => write!(f, "groups({})", group_ids.join(", ")),
            NavigationIndex::Group { group_id, .. } => write!(f, "group({group_id})"),
            NavigationIndex::Question { question_id, .. } => write!(f, "question({question_id})"),
            NavigationIndex::End { group_id } => write!(f, "end({group_id})"),
        }
    }
}

impl Serialize for NavigationIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            NavigationIndex::Groups { group_ids, .. } => map.serialize_entry("groupIds", group_ids)?,
            NavigationIndex::Group { group_id, .. } | NavigationIndex::End { group_id } => {
                map.serialize_entry("groupId", group_id)?
            }
            NavigationIndex::Question { question_id, .. } => map.serialize_entry("questionId", question_id)?,
        }
        map.serialize_entry("name", self.name())?;
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNavigationIndex {
    name: String,
    group_ids: Option<Vec<SmolStr>>,
    group_id: Option<SmolStr>,
    question_id: Option<SmolStr>,
}

impl TryFrom<RawNavigationIndex> for NavigationIndex {
    type Error = String;

    fn try_from(raw: RawNavigationIndex) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("navigation index `{}` requires `{field}`", raw.name);
        match raw.name.as_str() {
            "groups" => Ok(NavigationIndex::groups(raw.group_ids.ok_or_else(|| missing("groupIds"))?)),
            "group" => Ok(NavigationIndex::group(raw.group_id.ok_or_else(|| missing("groupId"))?)),
            "question" => Ok(NavigationIndex::question(raw.question_id.ok_or_else(|| missing("questionId"))?)),
            "end" => Ok(NavigationIndex::end(raw.group_id.ok_or_else(|| missing("groupId"))?)),
            name => Err(format!("unknown navigation index `{name}`")),
        }
    }
}

/// Movement intent of a navigation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawNavigationDirection")]
pub enum NavigationDirection {
    Start,
    Previous,
    Next,
    Resume,
    ChangeLanguage,
    Jump(NavigationIndex),
}

impl NavigationDirection {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationDirection::Start => "START",
            NavigationDirection::Previous => "PREV",
            NavigationDirection::Next => "NEXT",
            NavigationDirection::Resume => "RESUME",
            NavigationDirection::ChangeLanguage => "CHANGE_LANGE",
            NavigationDirection::Jump(_) => "JUMP",
        }
    }
}

impl Serialize for NavigationDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", self.name())?;
        if let NavigationDirection::Jump(index) = self {
            map.serialize_entry("navigationIndex", index)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNavigationDirection {
    name: String,
    navigation_index: Option<NavigationIndex>,
}

impl TryFrom<RawNavigationDirection> for NavigationDirection {
    type Error = String;

    fn try_from(raw: RawNavigationDirection) -> Result<Self, Self::Error> {
        match raw.name.as_str() {
            "START" => Ok(NavigationDirection::Start),
            "PREV" | "PREVIOUS" => Ok(NavigationDirection::Previous),
            "NEXT" => Ok(NavigationDirection::Next),
            "RESUME" => Ok(NavigationDirection::Resume),
            "CHANGE_LANGE" | "CHANGE_LANGUAGE" => Ok(NavigationDirection::ChangeLanguage),
            "JUMP" => raw
                .navigation_index
                .map(NavigationDirection::Jump)
                .ok_or_else(|| "JUMP requires `navigationIndex`".to_string()),
            name => Err(format!("unknown navigation direction `{name}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationInfo {
    pub navigation_direction: NavigationDirection,
    #[serde(default)]
    pub navigation_index: Option<NavigationIndex>,
}

impl NavigationInfo {
    pub fn new(navigation_direction: NavigationDirection, navigation_index: Option<NavigationIndex>) -> Self {
        Self {
            navigation_direction,
            navigation_index,
        }
    }

    pub fn start() -> Self {
        Self::new(NavigationDirection::Start, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::group(NavigationIndex::group("G1"), r#"{"groupId":"G1","name":"group"}"#)]
    #[case::groups(
        NavigationIndex::groups(vec![SmolStr::new("G1"), SmolStr::new("G2")]),
        r#"{"groupIds":["G1","G2"],"name":"groups"}"#
    )]
    #[case::question(NavigationIndex::question("Q1"), r#"{"questionId":"Q1","name":"question"}"#)]
    #[case::end(NavigationIndex::end("G9"), r#"{"groupId":"G9","name":"end"}"#)]
    fn test_navigation_index_wire_format(#[case] index: NavigationIndex, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&index).unwrap(), expected);
        assert_eq!(serde_json::from_str::<NavigationIndex>(expected).unwrap(), index);
    }

    #[test]
    fn test_show_error_is_not_serialized() {
        let index = NavigationIndex::group("G1").with_show_error(true);
        assert!(index.show_error());
        assert_eq!(serde_json::to_string(&index).unwrap(), r#"{"groupId":"G1","name":"group"}"#);
        assert!(!NavigationIndex::end("G1").with_show_error(true).show_error());
    }

    #[rstest]
    #[case::start(NavigationDirection::Start, r#"{"name":"START"}"#)]
    #[case::resume(NavigationDirection::Resume, r#"{"name":"RESUME"}"#)]
    #[case::next(NavigationDirection::Next, r#"{"name":"NEXT"}"#)]
    #[case::previous(NavigationDirection::Previous, r#"{"name":"PREV"}"#)]
    #[case::change_language(NavigationDirection::ChangeLanguage, r#"{"name":"CHANGE_LANGE"}"#)]
    #[case::jump(
        NavigationDirection::Jump(NavigationIndex::question("Q3")),
        r#"{"name":"JUMP","navigationIndex":{"questionId":"Q3","name":"question"}}"#
    )]
    #[case::jump_to_groups(
        NavigationDirection::Jump(NavigationIndex::groups(vec![SmolStr::new("G1"), SmolStr::new("G2")])),
        r#"{"name":"JUMP","navigationIndex":{"groupIds":["G1","G2"],"name":"groups"}}"#
    )]
    #[case::jump_to_end(
        NavigationDirection::Jump(NavigationIndex::end("G9")),
        r#"{"name":"JUMP","navigationIndex":{"groupId":"G9","name":"end"}}"#
    )]
    fn test_navigation_direction_wire_format(#[case] direction: NavigationDirection, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&direction).unwrap(), expected);
        assert_eq!(serde_json::from_str::<NavigationDirection>(expected).unwrap(), direction);
    }

    #[rstest]
    #[case::jump_without_index(r#"{"name":"JUMP"}"#)]
    #[case::unknown(r#"{"name":"SIDEWAYS"}"#)]
    fn test_navigation_direction_invalid(#[case] input: &str) {
        assert!(serde_json::from_str::<NavigationDirection>(input).is_err());
    }

    #[rstest]
    #[case::lowercase("all_in_one", NavigationMode::AllInOne)]
    #[case::uppercase("QUESTION_BY_QUESTION", NavigationMode::QuestionByQuestion)]
    fn test_navigation_mode_from_str(#[case] input: &str, #[case] expected: NavigationMode) {
        assert_eq!(input.parse::<NavigationMode>().ok(), Some(expected));
    }
}
