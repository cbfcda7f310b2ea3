//! ## Feature Selection Transformers
//!
//! This module provides [`drop_columns`] and its pipeline wrapper [`ColumnDropper`], which remove
//! the columns the model does not use. Dropping is stateless and strict: naming a column that
//! is not in the frame is an `UnknownColumn` error, never silently ignored.

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::impl_transformer;
use crate::transformers::validate_columns;
use datafusion::dataframe::DataFrame;
use datafusion::logical_expr::{col, Expr};
use serde::{Deserialize, Serialize};

/// Removes the specified columns from the DataFrame, keeping the order of the others.
///
/// # Errors
///
/// * `UnknownColumn` if any of `columns` is absent.
/// * `InvalidConfig` if nothing would be left.
pub fn drop_columns(df: DataFrame, columns: &[String]) -> BikeshareResult<DataFrame> {
    validate_columns(&df, columns)?;
    let available_exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .filter_map(|field| {
            if !columns.contains(field.name()) {
                Some(col(field.name()))
            } else {
                None
            }
        })
        .collect();

    if available_exprs.is_empty() {
        return Err(BikeshareError::InvalidConfig(
            "Dropping these columns would result in an empty DataFrame.".to_string(),
        ));
    }
    tracing::debug!(dropped = ?columns, "dropping columns");
    df.select(available_exprs).map_err(BikeshareError::from)
}

/// Pipeline stage wrapping [`drop_columns`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDropper {
    pub columns: Vec<String>,
}

impl ColumnDropper {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Nothing is learned; the columns are only checked for existence.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        validate_columns(df, &self.columns)
    }

    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        drop_columns(df, &self.columns)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(ColumnDropper);
