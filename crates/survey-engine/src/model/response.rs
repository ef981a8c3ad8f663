use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{DataType, Dependency, ReservedCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnName {
    Value,
    Order,
    Priority,
}

impl ColumnName {
    pub fn reserved_code(&self) -> ReservedCode {
        match self {
            ColumnName::Value => ReservedCode::Value,
            ColumnName::Order => ReservedCode::Order,
            ColumnName::Priority => ReservedCode::Priority,
        }
    }
}

/// One persisted slot of a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseField {
    pub component_code: SmolStr,
    pub column_name: ColumnName,
    pub data_type: DataType,
}

impl ResponseField {
    pub fn new(component_code: impl Into<SmolStr>, column_name: ColumnName, data_type: DataType) -> Self {
        Self {
            component_code: component_code.into(),
            column_name,
            data_type,
        }
    }

    pub fn to_dependency(&self) -> Dependency {
        Dependency::new(self.component_code.clone(), self.column_name.reserved_code())
    }
}
