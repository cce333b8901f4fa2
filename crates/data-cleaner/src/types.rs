//! Core data types shared across the engine.
//!
//! [`ColumnType`] is the semantic classification carried alongside a table,
//! and [`ActionDescription`] is the declarative record consumed by the
//! transformer action library.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Column Types
// =============================================================================

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Category,
    CategoryHighCardinality,
    Datetime,
    Email,
    List,
    Number,
    NumberWithDecimals,
    PhoneNumber,
    Text,
    TrueOrFalse,
    ZipCode,
}

impl ColumnType {
    /// Every variant, in declaration order.
    pub const ALL: [ColumnType; 11] = [
        ColumnType::Category,
        ColumnType::CategoryHighCardinality,
        ColumnType::Datetime,
        ColumnType::Email,
        ColumnType::List,
        ColumnType::Number,
        ColumnType::NumberWithDecimals,
        ColumnType::PhoneNumber,
        ColumnType::Text,
        ColumnType::TrueOrFalse,
        ColumnType::ZipCode,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::CategoryHighCardinality => "category_high_cardinality",
            Self::Datetime => "datetime",
            Self::Email => "email",
            Self::List => "list",
            Self::Number => "number",
            Self::NumberWithDecimals => "number_with_decimals",
            Self::PhoneNumber => "phone_number",
            Self::Text => "text",
            Self::TrueOrFalse => "true_or_false",
            Self::ZipCode => "zip_code",
        }
    }

    /// `number` or `number_with_decimals`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::NumberWithDecimals)
    }

    /// Types whose values are free-form or categorical strings.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            Self::Category
                | Self::CategoryHighCardinality
                | Self::Email
                | Self::PhoneNumber
                | Self::Text
                | Self::ZipCode
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown column type '{}'", s))
    }
}

/// Column name to semantic type. Lookups are by key; order is irrelevant.
pub type ColumnTypes = HashMap<String, ColumnType>;

// =============================================================================
// Action Descriptions
// =============================================================================

/// Operator named by an action description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // Aggregations
    Average,
    Count,
    CountDistinct,
    First,
    Last,
    Max,
    Median,
    Min,
    Sum,

    // Column actions
    #[serde(alias = "add")]
    AddColumn,
    CleanColumnName,
    Diff,
    FixSyntaxErrors,
    Impute,
    Normalize,
    Reformat,
    #[serde(alias = "remove")]
    RemoveColumn,
    Select,
    ShiftDown,
    ShiftUp,
    Standardize,

    // Row actions
    DropDuplicate,
    Filter,
    Limit,
    RemoveOutliers,
    Sort,

    Custom,
}

impl ActionType {
    /// The wire name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::First => "first",
            Self::Last => "last",
            Self::Max => "max",
            Self::Median => "median",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::AddColumn => "add_column",
            Self::CleanColumnName => "clean_column_name",
            Self::Diff => "diff",
            Self::FixSyntaxErrors => "fix_syntax_errors",
            Self::Impute => "impute",
            Self::Normalize => "normalize",
            Self::Reformat => "reformat",
            Self::RemoveColumn => "remove_column",
            Self::Select => "select",
            Self::ShiftDown => "shift_down",
            Self::ShiftUp => "shift_up",
            Self::Standardize => "standardize",
            Self::DropDuplicate => "drop_duplicate",
            Self::Filter => "filter",
            Self::Limit => "limit",
            Self::RemoveOutliers => "remove_outliers",
            Self::Sort => "sort",
            Self::Custom => "custom",
        }
    }

    /// Whether this action reduces a column into a broadcast aggregate.
    pub fn is_aggregation(&self) -> bool {
        matches!(
            self,
            Self::Average
                | Self::Count
                | Self::CountDistinct
                | Self::First
                | Self::Last
                | Self::Max
                | Self::Median
                | Self::Min
                | Self::Sum
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an action operates on columns or rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    #[default]
    Column,
    Row,
}

/// A column referenced by an action variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub uuid: String,
    pub column_type: ColumnType,
}

/// Declared metadata for one action argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionVariable {
    pub feature: Feature,
    #[serde(rename = "type", default = "ActionVariable::default_kind")]
    pub kind: String,
}

impl ActionVariable {
    fn default_kind() -> String {
        "feature".to_string()
    }
}

/// A column produced by an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub uuid: String,
    pub column_type: ColumnType,
}

/// A declarative, data-only transformation step.
///
/// Built once by the caller and consumed read-only by
/// [`ActionExecutor`](crate::actions::ActionExecutor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescription {
    pub action_type: ActionType,
    #[serde(default)]
    pub action_arguments: Vec<String>,
    #[serde(default)]
    pub action_options: Map<String, Value>,
    #[serde(default)]
    pub action_variables: HashMap<String, ActionVariable>,
    #[serde(default)]
    pub outputs: Vec<OutputColumn>,
    #[serde(default)]
    pub action_code: Option<String>,
    #[serde(default)]
    pub axis: Axis,
}

impl ActionDescription {
    /// Start a description with no arguments or options.
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            action_arguments: Vec::new(),
            action_options: Map::new(),
            action_variables: HashMap::new(),
            outputs: Vec::new(),
            action_code: None,
            axis: Axis::default(),
        }
    }

    /// Set the argument columns.
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action_arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Add one option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.action_options.insert(key.into(), value.into());
        self
    }

    /// Declare an argument's column type.
    pub fn with_variable(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        let column = column.into();
        self.action_variables.insert(
            column.clone(),
            ActionVariable {
                feature: Feature {
                    uuid: column,
                    column_type,
                },
                kind: ActionVariable::default_kind(),
            },
        );
        self
    }

    /// Add an output column.
    pub fn with_output(mut self, uuid: impl Into<String>, column_type: ColumnType) -> Self {
        self.outputs.push(OutputColumn {
            uuid: uuid.into(),
            column_type,
        });
        self
    }

    /// Set the action code (a filter query or a custom script).
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.action_code = Some(code.into());
        self
    }

    /// Set the axis.
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    /// Declared type of an argument column, if any.
    pub fn variable_type(&self, column: &str) -> Option<ColumnType> {
        self.action_variables
            .get(column)
            .map(|v| v.feature.column_type)
            .or_else(|| {
                self.action_variables
                    .values()
                    .find(|v| v.feature.uuid == column)
                    .map(|v| v.feature.column_type)
            })
    }

    /// The action code, if present and non-blank.
    pub fn code(&self) -> Option<&str> {
        self.action_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_type_wire_names() {
        for column_type in ColumnType::ALL {
            let json = serde_json::to_string(&column_type).unwrap();
            assert_eq!(json, format!("\"{}\"", column_type.as_str()));
            assert_eq!(column_type.as_str().parse::<ColumnType>().unwrap(), column_type);
        }
    }

    #[test]
    fn test_action_description_from_json() {
        let json = r#"{
            "action_type": "impute",
            "action_arguments": ["age"],
            "action_options": {"strategy": "average"},
            "action_variables": {
                "age": {"feature": {"uuid": "age", "column_type": "number"}, "type": "feature"}
            },
            "outputs": [],
            "axis": "column"
        }"#;
        let action: ActionDescription = serde_json::from_str(json).unwrap();

        assert_eq!(action.action_type, ActionType::Impute);
        assert_eq!(action.action_arguments, vec!["age".to_string()]);
        assert_eq!(action.variable_type("age"), Some(ColumnType::Number));
        assert_eq!(action.code(), None);
    }

    #[test]
    fn test_action_type_aliases() {
        let remove: ActionType = serde_json::from_str("\"remove\"").unwrap();
        let add: ActionType = serde_json::from_str("\"add\"").unwrap();
        assert_eq!(remove, ActionType::RemoveColumn);
        assert_eq!(add, ActionType::AddColumn);
    }

    #[test]
    fn test_blank_action_code_is_none() {
        let action = ActionDescription::new(ActionType::Filter).with_code("   ");
        assert_eq!(action.code(), None);
    }
}
