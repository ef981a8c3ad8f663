use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::EngineError;

/// Declared result type of a scripted slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnType {
    Boolean,
    #[default]
    String,
    Int,
    Double,
    List,
    Map,
    Date,
    File,
}

/// Storage type of a response field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Boolean,
    String,
    Int,
    Double,
    List,
    Map,
    Date,
    File,
}

impl ReturnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnType::Boolean => "boolean",
            ReturnType::String => "string",
            ReturnType::Int => "int",
            ReturnType::Double => "double",
            ReturnType::List => "list",
            ReturnType::Map => "map",
            ReturnType::Date => "date",
            ReturnType::File => "file",
        }
    }

    /// Script text used when an instruction of this type has no authored text.
    pub fn default_text_value(&self) -> &'static str {
        match self {
            ReturnType::Boolean => "false",
            ReturnType::String => "\"\"",
            ReturnType::Int => "0",
            ReturnType::Double => "0.0",
            ReturnType::List => "[]",
            ReturnType::Map => "{}",
            ReturnType::Date => "\"1970-01-01 00:00:00\"",
            ReturnType::File => r#"{"filename":"","stored_filename":"","size":0}"#,
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            ReturnType::Boolean => Value::Bool(false),
            ReturnType::String => Value::String(String::new()),
            ReturnType::Date => Value::String("1970-01-01 00:00:00".to_string()),
            ReturnType::File => serde_json::json!({"filename": "", "stored_filename": "", "size": 0}),
            ReturnType::Int => Value::from(0),
            ReturnType::Double => Value::from(0.0),
            ReturnType::List => Value::Array(Vec::new()),
            ReturnType::Map => Value::Object(serde_json::Map::new()),
        }
    }

    pub fn to_data_type(&self) -> DataType {
        match self {
            ReturnType::Boolean => DataType::Boolean,
            ReturnType::String => DataType::String,
            ReturnType::Int => DataType::Int,
            ReturnType::Double => DataType::Double,
            ReturnType::List => DataType::List,
            ReturnType::Map => DataType::Map,
            ReturnType::Date => DataType::Date,
            ReturnType::File => DataType::File,
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boolean" => Ok(ReturnType::Boolean),
            "string" => Ok(ReturnType::String),
            "int" => Ok(ReturnType::Int),
            "double" => Ok(ReturnType::Double),
            "list" => Ok(ReturnType::List),
            "map" => Ok(ReturnType::Map),
            "date" => Ok(ReturnType::Date),
            "file" => Ok(ReturnType::File),
            _ => Err(EngineError::InvalidInstruction(format!("unknown return type `{s}`"))),
        }
    }
}

impl Serialize for ReturnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReturnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::lowercase("boolean", ReturnType::Boolean)]
    #[case::uppercase("BOOLEAN", ReturnType::Boolean)]
    #[case::mixed("Double", ReturnType::Double)]
    #[case::map("map", ReturnType::Map)]
    fn test_from_str(#[case] input: &str, #[case] expected: ReturnType) {
        assert_eq!(input.parse::<ReturnType>().ok(), Some(expected));
    }

    #[test]
    fn test_from_str_unknown() {
        assert!("number".parse::<ReturnType>().is_err());
    }

    #[rstest]
    #[case::boolean(ReturnType::Boolean, "false")]
    #[case::string(ReturnType::String, "\"\"")]
    #[case::list(ReturnType::List, "[]")]
    #[case::date(ReturnType::Date, "\"1970-01-01 00:00:00\"")]
    fn test_default_text_value(#[case] return_type: ReturnType, #[case] expected: &str) {
        assert_eq!(return_type.default_text_value(), expected);
    }
}
