use std::sync::LazyLock;

use regex_lite::Regex;

use super::ElementType;

/// Code of the survey root.
pub const SURVEY_CODE: &str = "Survey";

static SURVEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^Survey$"));
static GROUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^G[a-zA-Z0-9_]+$"));
static QUESTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^Q[a-zA-Z0-9_]+$"));
static ANSWER_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^[a-zA-Z0-9_]+$"));
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^reference_[a-zA-Z0-9_]+$"));
static SKIP_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^skip_to_[a-zA-Z0-9_]+$"));

fn compile(pattern: &str) -> Regex {
    // Patterns are literals above.
    Regex::new(pattern).unwrap()
}

pub fn is_valid_component_code(element_type: ElementType, code: &str) -> bool {
    match element_type {
        ElementType::Survey => SURVEY_PATTERN.is_match(code),
        ElementType::Group => GROUP_PATTERN.is_match(code),
        ElementType::Question => QUESTION_PATTERN.is_match(code),
        ElementType::Answer => ANSWER_PATTERN.is_match(code),
    }
}

pub fn is_reference_code(code: &str) -> bool {
    REFERENCE_PATTERN.is_match(code)
}

pub fn is_skip_code(code: &str) -> bool {
    SKIP_PATTERN.is_match(code)
}
