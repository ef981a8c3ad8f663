use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use smol_str::SmolStr;

use super::{ReturnType, codes};

/// Named slot on a component.
///
/// Every fixed slot has a default return type, a default activeness (whether it is computed
/// from script) and an accessibility flag telling whether other scripts may read it.
/// `Skip` slots carry their full `skip_to_*` code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReservedCode {
    Value,
    Lang,
    Mode,
    Order,
    Priority,
    Relevance,
    ConditionalRelevance,
    ChildrenRelevance,
    Validity,
    Meta,
    Label,
    InCurrentNavigation,
    ShowErrors,
    Skip(SmolStr),
}

impl ReservedCode {
    pub fn code(&self) -> &str {
        match self {
            ReservedCode::Value => "value",
            ReservedCode::Lang => "lang",
            ReservedCode::Mode => "mode",
            ReservedCode::Order => "order",
            ReservedCode::Priority => "priority",
            ReservedCode::Relevance => "relevance",
            ReservedCode::ConditionalRelevance => "conditional_relevance",
            ReservedCode::ChildrenRelevance => "children_relevance",
            ReservedCode::Validity => "validity",
            ReservedCode::Meta => "meta",
            ReservedCode::Label => "label",
            ReservedCode::InCurrentNavigation => "in_current_navigation",
            ReservedCode::ShowErrors => "show_errors",
            ReservedCode::Skip(code) => code.as_str(),
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let reserved = match code {
            "value" => ReservedCode::Value,
            "lang" => ReservedCode::Lang,
            "mode" => ReservedCode::Mode,
            "order" => ReservedCode::Order,
            "priority" => ReservedCode::Priority,
            "relevance" => ReservedCode::Relevance,
            "conditional_relevance" => ReservedCode::ConditionalRelevance,
            "children_relevance" => ReservedCode::ChildrenRelevance,
            "validity" => ReservedCode::Validity,
            "meta" => ReservedCode::Meta,
            "label" => ReservedCode::Label,
            "in_current_navigation" => ReservedCode::InCurrentNavigation,
            "show_errors" => ReservedCode::ShowErrors,
            code if codes::is_skip_code(code) => ReservedCode::Skip(SmolStr::new(code)),
            _ => return None,
        };
        Some(reserved)
    }

    pub fn is_reserved_code(code: &str) -> bool {
        Self::from_code(code).is_some()
    }

    pub fn default_return_type(&self) -> ReturnType {
        match self {
            ReservedCode::Value | ReservedCode::Lang | ReservedCode::Mode | ReservedCode::Label => ReturnType::String,
            ReservedCode::Order | ReservedCode::Priority => ReturnType::Int,
            ReservedCode::Meta => ReturnType::Map,
            ReservedCode::Relevance
            | ReservedCode::ConditionalRelevance
            | ReservedCode::ChildrenRelevance
            | ReservedCode::Validity
            | ReservedCode::InCurrentNavigation
            | ReservedCode::ShowErrors
            | ReservedCode::Skip(_) => ReturnType::Boolean,
        }
    }

    pub fn default_is_active(&self) -> bool {
        matches!(
            self,
            ReservedCode::Relevance
                | ReservedCode::ConditionalRelevance
                | ReservedCode::ChildrenRelevance
                | ReservedCode::Validity
                | ReservedCode::Skip(_)
        )
    }

    /// Whether scripts of other instructions may read this slot.
    pub fn is_accessible(&self) -> bool {
        !matches!(self, ReservedCode::Skip(_))
    }

    /// Only `value` may be declared with a return type other than its default.
    pub fn accepts_return_type(&self, return_type: ReturnType) -> bool {
        matches!(self, ReservedCode::Value) || self.default_return_type() == return_type
    }

    /// Value a slot takes when nothing has been bound to it.
    pub fn default_binding(&self, return_type: ReturnType) -> Option<Value> {
        match self {
            ReservedCode::Relevance
            | ReservedCode::ConditionalRelevance
            | ReservedCode::ChildrenRelevance
            | ReservedCode::Validity => Some(Value::Bool(true)),
            ReservedCode::Value => None,
            _ => Some(return_type.default_value()),
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ReservedCode::Skip(_))
    }
}

impl fmt::Display for ReservedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ReservedCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for ReservedCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        ReservedCode::from_code(&code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown reserved code `{code}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::value("value", Some(ReservedCode::Value))]
    #[case::children_relevance("children_relevance", Some(ReservedCode::ChildrenRelevance))]
    #[case::skip("skip_to_q4", Some(ReservedCode::Skip(SmolStr::new("skip_to_q4"))))]
    #[case::unknown("kabaka", None)]
    #[case::reference("reference_label", None)]
    fn test_from_code(#[case] code: &str, #[case] expected: Option<ReservedCode>) {
        assert_eq!(ReservedCode::from_code(code), expected);
    }

    #[rstest]
    #[case::value_any_type(ReservedCode::Value, ReturnType::List, true)]
    #[case::relevance_boolean(ReservedCode::Relevance, ReturnType::Boolean, true)]
    #[case::relevance_string(ReservedCode::Relevance, ReturnType::String, false)]
    #[case::order_int(ReservedCode::Order, ReturnType::Int, true)]
    fn test_accepts_return_type(#[case] code: ReservedCode, #[case] return_type: ReturnType, #[case] expected: bool) {
        assert_eq!(code.accepts_return_type(return_type), expected);
    }

    #[rstest]
    #[case::relevance(ReservedCode::Relevance, Some(Value::Bool(true)))]
    #[case::validity(ReservedCode::Validity, Some(Value::Bool(true)))]
    #[case::value(ReservedCode::Value, None)]
    #[case::order(ReservedCode::Order, Some(Value::from(0)))]
    fn test_default_binding(#[case] code: ReservedCode, #[case] expected: Option<Value>) {
        let return_type = code.default_return_type();
        assert_eq!(code.default_binding(return_type), expected);
    }

    #[test]
    fn test_skip_is_not_accessible() {
        let skip = ReservedCode::Skip(SmolStr::new("skip_to_g3"));
        assert!(!skip.is_accessible());
        assert!(skip.default_is_active());
        assert!(ReservedCode::Label.is_accessible());
    }
}
