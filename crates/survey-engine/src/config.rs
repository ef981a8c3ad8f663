//! Survey level settings read from the survey definition JSON.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::{SmolStr, format_smolstr};

use crate::error::EngineError;
use crate::model::NavigationMode;

pub const DEFAULT_LANG: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyNavigationData {
    pub navigation_mode: NavigationMode,
    pub allow_previous: bool,
    pub skip_invalid: bool,
    pub allow_incomplete: bool,
    pub allow_jump: bool,
}

impl Default for SurveyNavigationData {
    fn default() -> Self {
        Self {
            navigation_mode: NavigationMode::GroupByGroup,
            allow_previous: true,
            skip_invalid: true,
            allow_incomplete: true,
            allow_jump: true,
        }
    }
}

impl SurveyNavigationData {
    /// Reads the settings from the survey root object. Missing or malformed entries keep
    /// their defaults.
    pub fn from_survey_json(survey: &Value) -> Self {
        let mut data = Self::default();

        if let Some(mode) = survey.get("navigationMode").and_then(Value::as_str) {
            match mode.parse::<NavigationMode>() {
                Ok(mode) => data.navigation_mode = mode,
                Err(_) => tracing::warn!(mode, "unknown navigation mode, using GROUP_BY_GROUP"),
            }
        }

        let flag = |key: &str, default: bool| survey.get(key).and_then(Value::as_bool).unwrap_or(default);
        data.allow_previous = flag("allowPrevious", data.allow_previous);
        data.skip_invalid = flag("skipInvalid", data.skip_invalid);
        data.allow_incomplete = flag("allowIncomplete", data.allow_incomplete);
        data.allow_jump = flag("allowJump", data.allow_jump);
        data
    }
}

/// Whether the respondent is connected; bound to the survey `mode` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyMode {
    #[default]
    Online,
    Offline,
}

impl SurveyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyMode::Online => "online",
            SurveyMode::Offline => "offline",
        }
    }
}

impl fmt::Display for SurveyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "online" => Ok(SurveyMode::Online),
            "offline" => Ok(SurveyMode::Offline),
            _ => Err(EngineError::InvalidInstruction(format!("unknown survey mode `{s}`"))),
        }
    }
}

/// `defaultLang.code` of the survey, or [`DEFAULT_LANG`].
pub fn default_lang(survey: &Value) -> &str {
    survey
        .pointer("/defaultLang/code")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LANG)
}

/// Labels of every group, question and answer keyed by qualified code, taken from
/// `content.<lang>.label` with the default language as fallback.
pub fn labels(survey: &Value, lang: &str) -> IndexMap<SmolStr, String> {
    let default_lang = default_lang(survey);
    let mut labels = IndexMap::new();
    for group in children(survey, "groups") {
        collect_labels(group, "groups", None, lang, default_lang, &mut labels);
    }
    labels
}

fn collect_labels(
    component: &Value,
    key: &str,
    parent_code: Option<&str>,
    lang: &str,
    default_lang: &str,
    labels: &mut IndexMap<SmolStr, String>,
) {
    let Some(code) = component.get("code").and_then(Value::as_str) else {
        return;
    };
    let code = match (key, parent_code) {
        ("answers", Some(parent)) => format_smolstr!("{parent}{code}"),
        _ => SmolStr::new(code),
    };
    let label = [lang, default_lang]
        .into_iter()
        .find_map(|lang| component.get("content")?.get(lang)?.get("label")?.as_str());
    if let Some(label) = label {
        labels.insert(code.clone(), label.to_string());
    }
    let child_key = match key {
        "groups" => "questions",
        _ => "answers",
    };
    for child in children(component, child_key) {
        collect_labels(child, child_key, Some(&code), lang, default_lang, labels);
    }
}

fn children<'a>(component: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    component.get(key).and_then(Value::as_array).into_iter().flatten()
}
