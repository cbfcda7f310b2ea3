//! # Categorical Encoding Transformers
//!
//! This module provides the [`Mapper`], an ordinal encoder driven by an explicit
//! label-to-integer table supplied by configuration (nothing is learned from data).
//!
//! The table keys are written as strings. When the column holds strings they are compared as
//! strings; when it holds numbers they are parsed as integers first, so a table such as
//! `{"2011": 0, "2012": 1}` maps an integer `yr` column without silent lookup misses.
//!
//! A value without a table entry (including null) is a `Mapping` error naming the value and the
//! column; the mapper never produces nulls.

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::impl_transformer;
use crate::transformers::{column_type, is_string_type};
use datafusion::arrow::datatypes::DataType;
use datafusion::logical_expr::{cast, col, lit, Case as DFCase, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Helper to build `CASE <col> WHEN <key> THEN <code> ... END` from resolved table entries.
fn build_case_expr(col_name: &str, mapping: &[(Expr, i64)]) -> Expr {
    let when_then_expr = mapping
        .iter()
        .map(|(key, code)| (Box::new(key.clone()), Box::new(lit(*code))))
        .collect();
    Expr::Case(DFCase {
        expr: Some(Box::new(col(col_name))),
        when_then_expr,
        else_expr: None,
    })
}

/// Parses a table key as an integer, accepting integral float spellings such as `"2011.0"`.
fn parse_integer_key(key: &str) -> Option<i64> {
    let trimmed = key.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && v.is_finite())
            .map(|v| v as i64)
    })
}

/// Maps the labels of one categorical column to integer codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapper {
    pub column: String,
    pub mappings: BTreeMap<String, i64>,
}

impl Mapper {
    /// Create a new Mapper for the column and table.
    ///
    /// Fails with `InvalidConfig` if the column name or the table is empty.
    pub fn new(column: impl Into<String>, mappings: BTreeMap<String, i64>) -> BikeshareResult<Self> {
        let column = column.into();
        if column.trim().is_empty() {
            return Err(BikeshareError::InvalidConfig(
                "Mapper column name must not be empty".to_string(),
            ));
        }
        if mappings.is_empty() {
            return Err(BikeshareError::InvalidConfig(format!(
                "Mapper for column '{}' needs a non-empty mapping table",
                column
            )));
        }
        Ok(Self { column, mappings })
    }

    /// Resolves the table keys against the runtime type of the column.
    fn resolve_keys(&self, data_type: &DataType) -> BikeshareResult<Vec<(Expr, i64)>> {
        if is_string_type(data_type) {
            return Ok(self
                .mappings
                .iter()
                .map(|(key, &code)| (lit(key.clone()), code))
                .collect());
        }
        if data_type.is_numeric() {
            return self
                .mappings
                .iter()
                .map(|(key, &code)| {
                    parse_integer_key(key)
                        .map(|k| (lit(k), code))
                        .ok_or_else(|| {
                            BikeshareError::InvalidConfig(format!(
                                "Key '{}' of the table for numeric column '{}' is not an integer",
                                key, self.column
                            ))
                        })
                })
                .collect();
        }
        Err(BikeshareError::InvalidData(format!(
            "Column '{}' has type {:?}; only string or numeric columns can be mapped",
            self.column, data_type
        )))
    }

    /// Returns the first value (in row order) that has no table entry, if any.
    async fn find_unmapped(&self, df: &DataFrame, keys: Vec<Expr>) -> BikeshareResult<Option<String>> {
        let offending = df
            .clone()
            .select(vec![col(&self.column)])?
            .filter(col(&self.column).is_null().or(col(&self.column).in_list(keys, true)))?
            .limit(0, Some(1))?
            .collect()
            .await?;
        let Some(batch) = offending.iter().find(|batch| batch.num_rows() > 0) else {
            return Ok(None);
        };
        let value = ScalarValue::try_from_array(batch.column(0), 0)?;
        Ok(Some(if value.is_null() {
            "null".to_string()
        } else {
            value.to_string()
        }))
    }

    /// Stateless: validates that the column exists and that the table keys fit its type.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        let data_type = column_type(df, &self.column)?;
        self.resolve_keys(&data_type)?;
        Ok(())
    }

    /// Returns a new DataFrame where the column holds the Int64 code of each label.
    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        let data_type = column_type(&df, &self.column)?;
        let mapping = self.resolve_keys(&data_type)?;
        let keys = mapping.iter().map(|(key, _)| key.clone()).collect();
        if let Some(value) = self.find_unmapped(&df, keys).await? {
            return Err(BikeshareError::Mapping {
                column: self.column.clone(),
                value,
            });
        }
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                if name == &self.column {
                    cast(build_case_expr(name, &mapping), DataType::Int64).alias(name)
                } else {
                    col(name)
                }
            })
            .collect();
        let mapped = df.select(exprs)?;
        tracing::debug!(column = %self.column, "mapped");
        Ok(mapped)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(Mapper);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_key() {
        assert_eq!(parse_integer_key("2011"), Some(2011));
        assert_eq!(parse_integer_key(" 7 "), Some(7));
        assert_eq!(parse_integer_key("2012.0"), Some(2012));
        assert_eq!(parse_integer_key("2.5"), None);
        assert_eq!(parse_integer_key("spring"), None);
    }

    #[test]
    fn test_rejects_empty_table_or_column() {
        assert!(matches!(
            Mapper::new("season", BTreeMap::new()),
            Err(BikeshareError::InvalidConfig(_))
        ));
        let table = BTreeMap::from([("spring".to_string(), 1)]);
        assert!(matches!(
            Mapper::new("", table),
            Err(BikeshareError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_numeric_keys_must_be_integers() {
        let table = BTreeMap::from([("spring".to_string(), 1)]);
        let mapper = Mapper::new("yr", table).unwrap();
        assert!(matches!(
            mapper.resolve_keys(&DataType::Int64),
            Err(BikeshareError::InvalidConfig(_))
        ));
        assert_eq!(mapper.resolve_keys(&DataType::Utf8).unwrap().len(), 1);
    }
}
