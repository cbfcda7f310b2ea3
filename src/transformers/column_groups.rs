//! ## Column-Group Composer
//!
//! [`ColumnGroupComposer`] partitions the columns of a frame into named, disjoint groups, runs an
//! independent [`Pipeline`] on each group, and concatenates the group outputs column-wise.
//! Columns claimed by no group are appended unchanged, or dropped, depending on [`Remainder`].
//!
//! Output column order is: every group's output in group order, then the remainder columns in
//! their input order. Row order is never changed.

use crate::data::{collect_batch, column_names, frame_from_batch};
use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::impl_transformer;
use crate::pipeline::Pipeline;
use crate::transformers::validate_columns;
use arrow::array::ArrayRef;
use arrow::datatypes::{FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// What happens to the columns that no group claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remainder {
    #[default]
    Passthrough,
    Drop,
}

/// A named set of columns and the sub-pipeline applied to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub name: String,
    pub columns: Vec<String>,
    pub pipeline: Pipeline,
}

impl ColumnGroup {
    pub fn new(name: impl Into<String>, columns: Vec<String>, pipeline: Pipeline) -> Self {
        Self {
            name: name.into(),
            columns,
            pipeline,
        }
    }
}

/// Applies one sub-pipeline per disjoint column group and stitches the results together.
///
/// Deserialization goes through [`ColumnGroupComposer::new`], so a loaded composer obeys the
/// same group rules as a constructed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ComposerParts")]
pub struct ColumnGroupComposer {
    pub groups: Vec<ColumnGroup>,
    pub remainder: Remainder,
    fitted: bool,
}

#[derive(Deserialize)]
struct ComposerParts {
    groups: Vec<ColumnGroup>,
    #[serde(default)]
    remainder: Remainder,
    #[serde(default)]
    fitted: bool,
}

impl TryFrom<ComposerParts> for ColumnGroupComposer {
    type Error = BikeshareError;

    fn try_from(parts: ComposerParts) -> BikeshareResult<Self> {
        let mut composer = Self::new(parts.groups, parts.remainder)?;
        composer.fitted = parts.fitted;
        Ok(composer)
    }
}

impl ColumnGroupComposer {
    /// Create a composer.
    ///
    /// Fails with `InvalidConfig` when there are no groups, when two groups share a name or a
    /// column, or when a group has no columns.
    pub fn new(groups: Vec<ColumnGroup>, remainder: Remainder) -> BikeshareResult<Self> {
        if groups.is_empty() {
            return Err(BikeshareError::InvalidConfig(
                "ColumnGroupComposer needs at least one group".to_string(),
            ));
        }
        let mut names = HashSet::new();
        let mut claimed: HashSet<&str> = HashSet::new();
        for group in &groups {
            if !names.insert(group.name.as_str()) {
                return Err(BikeshareError::InvalidConfig(format!(
                    "Duplicate column group name '{}'",
                    group.name
                )));
            }
            if group.columns.is_empty() {
                return Err(BikeshareError::InvalidConfig(format!(
                    "Column group '{}' has no columns",
                    group.name
                )));
            }
            for column in &group.columns {
                if !claimed.insert(column.as_str()) {
                    return Err(BikeshareError::InvalidConfig(format!(
                        "Column '{}' belongs to more than one group (second: '{}')",
                        column, group.name
                    )));
                }
            }
        }
        Ok(Self {
            groups,
            remainder,
            fitted: false,
        })
    }

    fn claimed_columns(&self) -> HashSet<&str> {
        self.groups
            .iter()
            .flat_map(|group| group.columns.iter().map(String::as_str))
            .collect()
    }

    /// Fits every group's sub-pipeline on that group's columns only.
    pub async fn fit(&mut self, df: &DataFrame) -> BikeshareResult<()> {
        for group in &self.groups {
            validate_columns(df, &group.columns)?;
        }
        for group in self.groups.iter_mut() {
            let columns: Vec<&str> = group.columns.iter().map(String::as_str).collect();
            let sub_frame = df.clone().select_columns(&columns)?;
            group.pipeline.fit(&sub_frame).await?;
            tracing::debug!(group = %group.name, columns = ?group.columns, "column group fitted");
        }
        self.fitted = true;
        Ok(())
    }

    /// Runs each group's sub-pipeline and concatenates the outputs column-wise.
    pub async fn transform(&self, df: DataFrame) -> BikeshareResult<DataFrame> {
        if !self.fitted {
            return Err(BikeshareError::NotFitted("ColumnGroupComposer".to_string()));
        }
        for group in &self.groups {
            validate_columns(&df, &group.columns)?;
        }
        // Materialize once so each group reads the same rows without re-running upstream plans.
        let input = frame_from_batch(&df, collect_batch(df.clone()).await?)?;
        let n_rows = input.clone().count().await?;

        let mut fields: Vec<FieldRef> = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        let mut append = |batch: RecordBatch, origin: &str| -> BikeshareResult<()> {
            if batch.num_rows() != n_rows {
                return Err(BikeshareError::InvalidData(format!(
                    "{} produced {} rows, expected {}",
                    origin,
                    batch.num_rows(),
                    n_rows
                )));
            }
            for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
                if fields.iter().any(|f| f.name() == field.name()) {
                    return Err(BikeshareError::InvalidData(format!(
                        "{} produced column '{}' which already exists in the output",
                        origin,
                        field.name()
                    )));
                }
                fields.push(field.clone());
                arrays.push(array.clone());
            }
            Ok(())
        };

        for group in &self.groups {
            let columns: Vec<&str> = group.columns.iter().map(String::as_str).collect();
            let sub_frame = input.clone().select_columns(&columns)?;
            let output = group.pipeline.transform(sub_frame).await?;
            append(
                collect_batch(output).await?,
                &format!("Column group '{}'", group.name),
            )?;
        }

        if self.remainder == Remainder::Passthrough {
            let claimed = self.claimed_columns();
            let rest: Vec<String> = column_names(&input)
                .into_iter()
                .filter(|name| !claimed.contains(name.as_str()))
                .collect();
            if !rest.is_empty() {
                let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
                let passthrough = input.clone().select_columns(&rest)?;
                append(collect_batch(passthrough).await?, "Remainder")?;
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        tracing::debug!(
            groups = self.groups.len(),
            columns = batch.num_columns(),
            "column groups composed"
        );
        frame_from_batch(&input, batch)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(ColumnGroupComposer);
