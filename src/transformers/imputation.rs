//! ## Transformers for imputing missing values
//!
//! This module provides the two imputers of the bike-share pipeline:
//!
//! - **WeekdayImputer**: Fills a missing weekday label with the three-letter day name derived
//!   from the row's date.
//! - **WeathersitImputer**: Fills a missing weather situation with the most frequent category
//!   seen at fit time.
//!
//! Both treat null and the empty string as missing. Each transformer returns a new DataFrame;
//! rows are never dropped or reordered.
//! Errors are returned as `BikeshareError` and results are wrapped in `BikeshareResult`.

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::impl_transformer;
use crate::transformers::{column_type, is_string_type, validate_columns};
use datafusion::arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion_expr::expr::Case as DFCase;
use datafusion_expr::{cast, col, lit, not, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_functions::datetime::to_char;
use serde::{Deserialize, Serialize};

/// Predicate matching rows whose value in `name` is missing: null, or the empty string for
/// string columns.
fn is_missing(df: &DataFrame, name: &str) -> BikeshareResult<Expr> {
    let missing = col(name).is_null();
    if is_string_type(&column_type(df, name)?) {
        Ok(missing.or(col(name).eq(lit(""))))
    } else {
        Ok(missing)
    }
}

/// Constructs `CASE WHEN <name is missing> THEN fill ELSE <name> END`.
fn fill_missing_expr(missing: Expr, name: &str, fill: Expr) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(missing), Box::new(fill))],
        else_expr: Some(Box::new(col(name))),
    })
}

/// Replaces the target column by its filled version, keeping every other column as-is.
/// The fill value is cast to the column's type so the column keeps its type.
fn apply_imputation(df: DataFrame, target_col: &str, fill: Expr) -> BikeshareResult<DataFrame> {
    let missing = is_missing(&df, target_col)?;
    let fill = cast(fill, column_type(&df, target_col)?);
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if name == target_col {
                fill_missing_expr(missing.clone(), name, fill.clone()).alias(name)
            } else {
                col(name)
            }
        })
        .collect();
    df.select(exprs).map_err(BikeshareError::from)
}

/// Validates that a column exists and is of a datetime type (Timestamp, Date32, or Date64).
fn validate_datetime_column(df: &DataFrame, col_name: &str) -> BikeshareResult<()> {
    let field = df.schema().field_with_name(None, col_name).map_err(|_| {
        BikeshareError::UnknownColumn(format!("Column '{}' not found in DataFrame", col_name))
    })?;
    match field.data_type() {
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => Ok(()),
        dt => Err(BikeshareError::InvalidData(format!(
            "Column '{}' must be a datetime type (Timestamp, Date32, or Date64), but found {:?}",
            col_name, dt
        ))),
    }
}

/// Imputes missing weekday labels from a date column.
///
/// The set of rows to fill is recomputed on every `transform` call from the frame being
/// transformed; `fit` only validates the columns and records how many rows were missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekdayImputer {
    pub weekday_column: String,
    pub date_column: String,
    /// Number of rows with a missing weekday in the frame seen by the last `fit`.
    pub missing_at_fit: Option<usize>,
}

impl WeekdayImputer {
    /// Create a new imputer filling `weekday_column` from `date_column`.
    pub fn new(weekday_column: impl Into<String>, date_column: impl Into<String>) -> Self {
        Self {
            weekday_column: weekday_column.into(),
            date_column: date_column.into(),
            missing_at_fit: None,
        }
    }

    /// Create the imputer from a `[weekday, date]` pair of column names.
    pub fn from_variables(variables: &[String]) -> BikeshareResult<Self> {
        match variables {
            [weekday, date] => Ok(Self::new(weekday.clone(), date.clone())),
            _ => Err(BikeshareError::InvalidConfig(format!(
                "WeekdayImputer expects exactly two columns [weekday, date], got {:?}",
                variables
            ))),
        }
    }

    fn target_columns(&self) -> Vec<String> {
        vec![self.weekday_column.clone(), self.date_column.clone()]
    }

    /// Validates both columns and counts the rows with a missing weekday.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        validate_columns(df, &self.target_columns())?;
        validate_datetime_column(df, &self.date_column)?;
        let missing = df
            .clone()
            .filter(is_missing(df, &self.weekday_column)?)?
            .count()
            .await?;
        tracing::debug!(column = %self.weekday_column, missing, "weekday imputer fitted");
        self.missing_at_fit = Some(missing);
        Ok(())
    }

    /// Returns a new DataFrame where missing weekdays hold the abbreviated day name of the row's date.
    ///
    /// Fails with `MissingDependency` if a row to impute has no date.
    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        validate_columns(&df, &self.target_columns())?;
        validate_datetime_column(&df, &self.date_column)?;
        let unresolvable = df
            .clone()
            .filter(
                is_missing(&df, &self.weekday_column)?.and(col(&self.date_column).is_null()),
            )?
            .count()
            .await?;
        if unresolvable > 0 {
            return Err(BikeshareError::MissingDependency {
                column: self.weekday_column.clone(),
                dependency: self.date_column.clone(),
                rows: unresolvable,
            });
        }
        let day_name = to_char().call(vec![col(&self.date_column), lit("%a")]);
        let imputed = apply_imputation(df, &self.weekday_column, day_name)?;
        tracing::debug!(column = %self.weekday_column, "weekday imputed");
        Ok(imputed)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// Imputes missing weather situations with the mode of the training data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeathersitImputer {
    pub column: String,
    /// Most frequent value seen at fit time.
    pub fill_value: Option<String>,
}

impl WeathersitImputer {
    /// Create a new imputer for the given column.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            fill_value: None,
        }
    }

    /// Computes the mode via grouping and counting. Missing values do not take part, and ties
    /// go to the smallest value (lexicographic for labels, numeric for codes).
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        validate_columns(df, std::slice::from_ref(&self.column))?;
        let grouped = df
            .clone()
            .filter(not(is_missing(df, &self.column)?))?
            .aggregate(
                vec![col(&self.column)],
                vec![count(col(&self.column)).alias("cnt")],
            )?
            .sort(vec![
                col("cnt").sort(false, false),
                col(&self.column).sort(true, false),
            ])?
            .limit(0, Some(1))?;
        let batches = grouped.collect().await?;
        let batch = batches
            .iter()
            .find(|batch| batch.num_rows() > 0)
            .ok_or_else(|| {
                BikeshareError::InvalidData(format!(
                    "Column '{}' has no non-missing values to compute a mode from",
                    self.column
                ))
            })?;
        let mode = match ScalarValue::try_from_array(batch.column(0), 0)? {
            ScalarValue::Utf8(Some(v))
            | ScalarValue::LargeUtf8(Some(v))
            | ScalarValue::Utf8View(Some(v)) => v,
            other if !other.is_null() => other.to_string(),
            _ => {
                return Err(BikeshareError::InvalidData(format!(
                    "Failed to compute mode for column {}",
                    self.column
                )))
            }
        };
        tracing::debug!(column = %self.column, mode = %mode, "weathersit imputer fitted");
        self.fill_value = Some(mode);
        Ok(())
    }

    /// Returns a new DataFrame where null and empty values are replaced with the fitted mode.
    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        let fill_value = self.fill_value.as_ref().ok_or_else(|| {
            BikeshareError::NotFitted(format!("WeathersitImputer on '{}'", self.column))
        })?;
        validate_columns(&df, std::slice::from_ref(&self.column))?;
        let imputed = apply_imputation(df, &self.column, lit(fill_value.clone()))?;
        tracing::debug!(column = %self.column, "weathersit imputed");
        Ok(imputed)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(WeekdayImputer);
impl_transformer!(WeathersitImputer);
