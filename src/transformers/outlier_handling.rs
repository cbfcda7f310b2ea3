//! ## Transformers for handling outliers
//!
//! This module provides the [`OutlierHandler`], a winsorizer: every value of a configured numeric
//! column is clipped to the `[lower, upper]` bounds learned at fit time. Values are capped, never
//! removed, so the row count is unchanged.
//!
//! The bounds are the values at two configurable quantiles of the training column, computed
//! exactly with linear interpolation between order statistics (see [`quantile`]).
//! Errors are returned as `BikeshareError` and results are wrapped in `BikeshareResult`.

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::impl_transformer;
use crate::transformers::{collect_f64_values, validate_columns};
use datafusion::arrow::datatypes::DataType;
use datafusion::logical_expr::{col, lit, Case as DFCase, Expr};
use datafusion::prelude::*;
use datafusion_functions::math::expr_fn::isnan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Returns the `q`-th quantile of an ascending slice, interpolating linearly between the two
/// closest order statistics. Returns `None` for an empty slice.
///
/// # Example
///
/// ```rust
/// use bikeshare_model::transformers::outlier_handling::quantile;
///
/// let sorted = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(quantile(&sorted, 0.5), Some(2.5));
/// assert_eq!(quantile(&sorted, 0.25), Some(1.75));
/// ```
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let fraction = position - below as f64;
    if below == above {
        return Some(sorted[below]);
    }
    Some(sorted[below] + (sorted[above] - sorted[below]) * fraction)
}

/// Helper function to build the clipping expression:
/// `CASE WHEN col > upper THEN upper WHEN col < lower THEN lower ELSE col END`
///
/// Float columns get a leading `WHEN isnan(col) THEN col` arm, since NaN orders above every
/// bound.
fn cap_expr_for(col_name: &str, data_type: &DataType, bounds: &OutlierBounds) -> Expr {
    let base = col(col_name);
    let mut when_then_expr = Vec::with_capacity(3);
    if matches!(data_type, DataType::Float16 | DataType::Float32 | DataType::Float64) {
        when_then_expr.push((Box::new(isnan(base.clone())), Box::new(base.clone())));
    }
    when_then_expr.push((
        Box::new(base.clone().gt(lit(bounds.upper))),
        Box::new(lit(bounds.upper)),
    ));
    when_then_expr.push((
        Box::new(base.clone().lt(lit(bounds.lower))),
        Box::new(lit(bounds.lower)),
    ));
    Expr::Case(DFCase {
        expr: None,
        when_then_expr,
        else_expr: Some(Box::new(base)),
    })
}

/// The clipping interval learned for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Caps outliers of numeric columns at quantile-based bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierHandler {
    pub columns: Vec<String>,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    /// Bounds per column, set by `fit`.
    pub bounds: Option<BTreeMap<String, OutlierBounds>>,
}

impl OutlierHandler {
    /// Create a new OutlierHandler.
    ///
    /// Both quantiles must lie in `[0, 1]` and `lower_quantile` must not exceed `upper_quantile`.
    pub fn new(
        columns: Vec<String>,
        lower_quantile: f64,
        upper_quantile: f64,
    ) -> BikeshareResult<Self> {
        if !(0.0..=1.0).contains(&lower_quantile) {
            return Err(BikeshareError::InvalidConfig(format!(
                "lower_quantile {} must be between 0 and 1",
                lower_quantile
            )));
        }
        if !(0.0..=1.0).contains(&upper_quantile) {
            return Err(BikeshareError::InvalidConfig(format!(
                "upper_quantile {} must be between 0 and 1",
                upper_quantile
            )));
        }
        if lower_quantile > upper_quantile {
            return Err(BikeshareError::InvalidConfig(format!(
                "lower_quantile {} must not exceed upper_quantile {}",
                lower_quantile, upper_quantile
            )));
        }
        Ok(Self {
            columns,
            lower_quantile,
            upper_quantile,
            bounds: None,
        })
    }

    /// Fit the handler by computing the quantile bounds of each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        validate_columns(df, &self.columns)?;
        let mut bounds = BTreeMap::new();
        for col_name in &self.columns {
            let mut values = collect_f64_values(df, col_name).await?;
            values.sort_by(f64::total_cmp);
            let (Some(lower), Some(upper)) = (
                quantile(&values, self.lower_quantile),
                quantile(&values, self.upper_quantile),
            ) else {
                return Err(BikeshareError::InvalidData(format!(
                    "Column '{}' has no numeric values to compute quantiles from",
                    col_name
                )));
            };
            tracing::debug!(column = %col_name, lower, upper, "outlier bounds fitted");
            bounds.insert(col_name.clone(), OutlierBounds { lower, upper });
        }
        self.bounds = Some(bounds);
        Ok(())
    }

    /// Returns a new DataFrame where each target column is clipped to its fitted bounds.
    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        let bounds = self
            .bounds
            .as_ref()
            .ok_or_else(|| BikeshareError::NotFitted("OutlierHandler".to_string()))?;
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match bounds.get(name.as_str()) {
                    Some(b) => cap_expr_for(name, field.data_type(), b).alias(name),
                    None => col(name),
                }
            })
            .collect();
        let clipped = df.select(exprs)?;
        tracing::debug!(columns = ?self.columns, "outliers clipped");
        Ok(clipped)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(OutlierHandler);
