//! Transformer action library.
//!
//! [`ActionExecutor`] interprets [`ActionDescription`]s against a table:
//! - Broadcast aggregations, optionally grouped, windowed and filtered
//! - Column actions (impute, reformat, scaling, shifts, UDF columns, ...)
//! - Row actions (filter, de-duplication, sorting, outlier removal, ...)
//! - `custom` actions through a registered [`CustomActionExecutor`]
//!
//! Every action takes the table by value and returns the transformed table.

mod aggregate;
mod column;
mod custom;
pub mod options;
mod reformat;
mod row;

pub use column::clean_column_name;
pub use custom::{
    CustomActionExecutor, PYTHON_ENV, PythonScriptExecutor, TIMEOUT_ENV, Transformer,
    TransformerChain,
};
pub use options::ActionOptions;
pub use reformat::ReformatKind;

use crate::config::CleanerConfig;
use crate::error::{CleanerError, Result};
use crate::imputers::{ImputeOptions, Imputer};
use crate::profiler::infer_column_type;
use crate::types::{ActionDescription, ActionType, ColumnType, ColumnTypes};
use crate::utils::column_series;
use column::Scaling;
use polars::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the first output column.
pub(crate) fn output_name(action: &ActionDescription) -> Result<String> {
    action
        .outputs
        .first()
        .map(|o| o.uuid.clone())
        .ok_or_else(|| CleanerError::missing_option(action.action_type.as_str(), "outputs"))
}

/// Applies action descriptions to tables.
#[derive(Clone, Default)]
pub struct ActionExecutor {
    config: CleanerConfig,
    custom: Option<Arc<dyn CustomActionExecutor>>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.config)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl ActionExecutor {
    pub fn new(config: CleanerConfig) -> Self {
        Self {
            config,
            custom: None,
        }
    }

    /// Register the executor used for `custom` actions.
    pub fn with_custom_executor(mut self, executor: Arc<dyn CustomActionExecutor>) -> Self {
        self.custom = Some(executor);
        self
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Apply one action.
    ///
    /// `column_types` supplies argument types not declared in the action's
    /// variables; anything still unknown is inferred from the data.
    pub fn apply(
        &self,
        df: DataFrame,
        action: &ActionDescription,
        column_types: &ColumnTypes,
    ) -> Result<DataFrame> {
        let arguments = &action.action_arguments;
        debug!(
            "Applying {} to {:?} ({} rows)",
            action.action_type,
            arguments,
            df.height()
        );

        match action.action_type {
            t if t.is_aggregation() => aggregate::aggregate(df, action),
            ActionType::AddColumn => column::add_column(df, action, column_types),
            ActionType::CleanColumnName => Ok(column::clean_column_names(df, arguments)?.0),
            ActionType::Diff => column::diff(df, action),
            ActionType::FixSyntaxErrors => {
                let typed = arguments
                    .iter()
                    .map(|c| Ok((c.clone(), self.resolve_type(&df, action, column_types, c)?)))
                    .collect::<Result<Vec<_>>>()?;
                column::fix_syntax_errors(df, &typed)
            }
            ActionType::Impute => {
                let options: ImputeOptions = ActionOptions::of(action).deserialize()?;
                let mut types = column_types.clone();
                for column in arguments {
                    if let Some(declared) = action.variable_type(column) {
                        types.insert(column.clone(), declared);
                    }
                }
                Imputer::from_config(&self.config).impute(df, arguments, &types, &options)
            }
            ActionType::Normalize => column::scale(df, action, Scaling::MinMax),
            ActionType::Standardize => column::scale(df, action, Scaling::ZScore),
            ActionType::Reformat => reformat::reformat(df, action),
            ActionType::RemoveColumn => column::remove_columns(df, arguments),
            ActionType::Select => column::select(df, arguments),
            ActionType::ShiftDown => column::shift_down(df, action),
            ActionType::ShiftUp => column::shift_up(df, action),
            ActionType::DropDuplicate => row::drop_duplicate(df, action),
            ActionType::Filter => row::filter(df, action),
            ActionType::Limit => row::limit(df, action),
            ActionType::Sort => row::sort(df, action),
            ActionType::RemoveOutliers => {
                let mut numeric = Vec::new();
                for column in arguments {
                    if self.resolve_type(&df, action, column_types, column)?.is_numeric() {
                        numeric.push(column.clone());
                    }
                }
                row::remove_outliers(df, action, &numeric, &self.config)
            }
            ActionType::Custom => {
                let executor = self
                    .custom
                    .as_ref()
                    .ok_or(CleanerError::CustomActionUnavailable)?;
                executor.execute(df, action.code().unwrap_or_default())
            }
            other => Err(CleanerError::Internal(format!(
                "no handler for action '{}'",
                other
            ))),
        }
    }

    /// Apply one action and bring `column_types` in line with the result:
    /// outputs take their declared types, renamed columns keep theirs and
    /// dropped columns are forgotten.
    pub fn apply_tracked(
        &self,
        df: DataFrame,
        action: &ActionDescription,
        column_types: &mut ColumnTypes,
    ) -> Result<DataFrame> {
        let df = if action.action_type == ActionType::CleanColumnName {
            let (df, renames) = column::clean_column_names(df, &action.action_arguments)?;
            let mut renamed = ColumnTypes::new();
            for (old, new) in &renames {
                if let Some(column_type) = column_types.remove(old) {
                    renamed.insert(new.clone(), column_type);
                }
            }
            column_types.extend(renamed);
            df
        } else {
            self.apply(df, action, column_types)?
        };

        for output in &action.outputs {
            if df.column(&output.uuid).is_ok() {
                column_types.insert(output.uuid.clone(), output.column_type);
            }
        }
        column_types.retain(|name, _| df.column(name).is_ok());
        Ok(df)
    }

    /// Apply actions in order, keeping `column_types` current.
    pub fn apply_all(
        &self,
        df: DataFrame,
        actions: &[ActionDescription],
        column_types: &mut ColumnTypes,
    ) -> Result<DataFrame> {
        let mut df = df;
        for (i, action) in actions.iter().enumerate() {
            df = self
                .apply_tracked(df, action, column_types)
                .map_err(|e| e.with_context(format!("action {} ({})", i + 1, action.action_type)))?;
        }
        info!(
            "Applied {} actions; result has {} rows and {} columns",
            actions.len(),
            df.height(),
            df.width()
        );
        Ok(df)
    }

    fn resolve_type(
        &self,
        df: &DataFrame,
        action: &ActionDescription,
        column_types: &ColumnTypes,
        column: &str,
    ) -> Result<ColumnType> {
        if let Some(declared) = action
            .variable_type(column)
            .or_else(|| column_types.get(column).copied())
        {
            return Ok(declared);
        }
        infer_column_type(&column_series(df, column)?, &self.config)
    }
}

static_assertions::assert_impl_all!(ActionExecutor: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> DataFrame {
        df!(
            "Store Name" => &[Some("a"), Some("a"), Some("b"), None],
            "amount" => &[Some(10i64), None, Some(5), Some(7)],
        )
        .unwrap()
    }

    #[test]
    fn test_impute_through_executor() {
        let action = ActionDescription::new(ActionType::Impute)
            .with_arguments(["amount"])
            .with_option("strategy", "median");
        let result = ActionExecutor::default()
            .apply(sample(), &action, &ColumnTypes::new())
            .unwrap();
        let values: Vec<Option<i64>> = result.column("amount").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(10), Some(7), Some(5), Some(7)]);
    }

    #[test]
    fn test_custom_requires_executor() {
        let action = ActionDescription::new(ActionType::Custom).with_code("noop");
        let result = ActionExecutor::default().apply(sample(), &action, &ColumnTypes::new());
        assert!(matches!(result, Err(CleanerError::CustomActionUnavailable)));

        let chain = TransformerChain::new().register("noop", Ok);
        let executor = ActionExecutor::default().with_custom_executor(Arc::new(chain));
        assert_eq!(executor.apply(sample(), &action, &ColumnTypes::new()).unwrap().height(), 4);
    }

    #[test]
    fn test_apply_all_tracks_column_types() {
        let actions = vec![
            ActionDescription::new(ActionType::CleanColumnName),
            ActionDescription::new(ActionType::Sum)
                .with_arguments(["amount"])
                .with_option("groupby_columns", json!(["store_name"]))
                .with_output("total", ColumnType::Number),
            ActionDescription::new(ActionType::RemoveColumn).with_arguments(["amount"]),
        ];
        let mut types = ColumnTypes::from([
            ("Store Name".to_string(), ColumnType::Category),
            ("amount".to_string(), ColumnType::Number),
        ]);

        let result = ActionExecutor::default()
            .apply_all(sample(), &actions, &mut types)
            .unwrap();

        assert_eq!(result.get_column_names(), vec!["store_name", "total"]);
        assert_eq!(
            types,
            ColumnTypes::from([
                ("store_name".to_string(), ColumnType::Category),
                ("total".to_string(), ColumnType::Number),
            ])
        );
        let totals: Vec<Option<i64>> = result.column("total").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(totals, vec![Some(10), Some(10), Some(5), None]);
    }

    #[test]
    fn test_errors_carry_action_context() {
        let actions = vec![ActionDescription::new(ActionType::Select).with_arguments(["missing"])];
        let err = ActionExecutor::default()
            .apply_all(sample(), &actions, &mut ColumnTypes::new())
            .unwrap_err();
        assert!(err.to_string().contains("action 1 (select)"));
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_remove_outliers_skips_non_numeric_arguments() {
        let action = ActionDescription::new(ActionType::RemoveOutliers)
            .with_arguments(["Store Name"]);
        let result = ActionExecutor::default()
            .apply(sample(), &action, &ColumnTypes::new())
            .unwrap();
        assert_eq!(result.height(), 4);
    }
}
