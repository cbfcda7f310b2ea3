//! ## Scaling Transformers
//!
//! [`StandardScaler`] centers each target column on its training mean and divides it by the
//! training population standard deviation. Output columns are Float64.

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::impl_transformer;
use crate::transformers::validate_columns;
use datafusion::arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{avg, stddev_pop};
use datafusion::logical_expr::{cast, col, lit, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Learned centering and scaling of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingParams {
    pub mean: f64,
    /// Population standard deviation, or 1.0 when the column is constant.
    pub scale: f64,
}

fn as_f64(scalar: ScalarValue, what: &str, col_name: &str) -> BikeshareResult<f64> {
    match scalar {
        ScalarValue::Float64(Some(v)) => Ok(v),
        _ => Err(BikeshareError::InvalidData(format!(
            "Failed to compute {} for column {}",
            what, col_name
        ))),
    }
}

/// Standardizes numeric columns: `(x - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub params: Option<BTreeMap<String, ScalingParams>>,
}

impl StandardScaler {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            params: None,
        }
    }

    /// Computes mean and population standard deviation of every target column in one aggregate query.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        validate_columns(df, &self.columns)?;
        let aggregates: Vec<Expr> = self
            .columns
            .iter()
            .flat_map(|name| {
                let value = cast(col(name), DataType::Float64);
                [
                    avg(value.clone()).alias(format!("{}__mean", name)),
                    stddev_pop(value).alias(format!("{}__std", name)),
                ]
            })
            .collect();
        let batches = df.clone().aggregate(vec![], aggregates)?.collect().await?;
        let batch = batches
            .iter()
            .find(|batch| batch.num_rows() > 0)
            .ok_or_else(|| BikeshareError::InvalidData("No rows to fit StandardScaler".into()))?;

        let mut params = BTreeMap::new();
        for (i, name) in self.columns.iter().enumerate() {
            let mean = as_f64(
                ScalarValue::try_from_array(batch.column(2 * i), 0)?,
                "mean",
                name,
            )?;
            let std = as_f64(
                ScalarValue::try_from_array(batch.column(2 * i + 1), 0)?,
                "standard deviation",
                name,
            )?;
            let scale = if std.is_finite() && std > 0.0 { std } else { 1.0 };
            params.insert(name.clone(), ScalingParams { mean, scale });
        }
        tracing::debug!(columns = ?self.columns, "standard scaler fitted");
        self.params = Some(params);
        Ok(())
    }

    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| BikeshareError::NotFitted("StandardScaler".to_string()))?;
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match params.get(name.as_str()) {
                    Some(p) => ((cast(col(name), DataType::Float64) - lit(p.mean)) / lit(p.scale))
                        .alias(name),
                    None => col(name),
                }
            })
            .collect();
        df.select(exprs).map_err(BikeshareError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(StandardScaler);
