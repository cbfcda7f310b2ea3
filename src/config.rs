//! ## Configuration
//!
//! [`Config`] holds everything the pipeline builder and the training driver read: file locations
//! and artifact naming ([`AppConfig`]) and the feature lists, mapping tables and hyperparameters
//! ([`ModelConfig`]). It is read-only once loaded.
//!
//! `Config::default()` is the bike-share configuration. A JSON file may override any subset of
//! fields; missing fields keep their default values.
//!
//! ```rust
//! use bikeshare_model::config::Config;
//!
//! let config = Config::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.model_config.target, "cnt");
//! ```

use crate::exceptions::{BikeshareError, BikeshareResult};
use crate::transformers::column_groups::Remainder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn table(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
    entries
        .iter()
        .map(|(label, code)| (label.to_string(), *code))
        .collect()
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app_config: AppConfig,
    pub model_config: ModelConfig,
}

/// Locations and naming of the training data and of the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub package_name: String,
    pub training_data_file: String,
    pub pipeline_name: String,
    /// File-name prefix of the artifact; the version and `.json` are appended.
    pub pipeline_save_file: String,
    pub trained_model_dir: String,
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            package_name: "bikeshare_model".to_string(),
            training_data_file: "datasets/bike-sharing-dataset.csv".to_string(),
            pipeline_name: "bikeshare_model".to_string(),
            pipeline_save_file: "bikeshare_model_output_v".to_string(),
            trained_model_dir: "trained_models".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A column group of the composer stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnGroupConfig {
    pub name: String,
    pub columns: Vec<String>,
    /// Apply the ordinal table of every column of the group before scaling.
    #[serde(default)]
    pub map_ordinals: bool,
    /// Standardize every column of the group.
    #[serde(default)]
    pub scale: bool,
}

/// Feature lists, mapping tables and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub target: String,
    /// Columns handed to the pipeline, in order.
    pub features: Vec<String>,
    /// Columns removed by the drop stage.
    pub unused_fields: Vec<String>,
    pub date_var: String,
    pub weekday_var: String,
    pub weathersit_var: String,
    pub yr_var: String,
    pub mnth_var: String,
    /// Numeric covariates: winsorized, then scaled by the `numerical` group.
    pub num_features: Vec<String>,
    pub cat_features: Vec<String>,
    /// Label-to-code table per categorical column.
    pub ordinal_mappings: BTreeMap<String, BTreeMap<String, i64>>,
    pub column_groups: Vec<ColumnGroupConfig>,
    pub remainder: Remainder,
    pub test_size: f64,
    pub random_state: u64,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Log pipeline step timings at INFO instead of DEBUG.
    pub verbose: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cat_features = strings(&[
            "season",
            "hr",
            "holiday",
            "workingday",
            "weathersit",
            "weekday",
            "yr",
            "mnth",
        ]);
        let num_features = strings(&["temp", "atemp", "hum", "windspeed"]);

        let mut ordinal_mappings = BTreeMap::new();
        ordinal_mappings.insert("yr".to_string(), table(&[("2011", 0), ("2012", 1)]));
        ordinal_mappings.insert(
            "mnth".to_string(),
            table(&[
                ("January", 0),
                ("February", 1),
                ("December", 2),
                ("March", 3),
                ("November", 4),
                ("April", 5),
                ("October", 6),
                ("May", 7),
                ("September", 8),
                ("June", 9),
                ("July", 10),
                ("August", 11),
            ]),
        );
        ordinal_mappings.insert(
            "season".to_string(),
            table(&[("spring", 0), ("winter", 1), ("summer", 2), ("fall", 3)]),
        );
        ordinal_mappings.insert(
            "weathersit".to_string(),
            table(&[
                ("Heavy Rain", 0),
                ("Light Rain", 1),
                ("Mist", 2),
                ("Clear", 3),
            ]),
        );
        ordinal_mappings.insert("holiday".to_string(), table(&[("Yes", 0), ("No", 1)]));
        ordinal_mappings.insert("workingday".to_string(), table(&[("No", 0), ("Yes", 1)]));
        ordinal_mappings.insert(
            "hr".to_string(),
            table(&[
                ("4am", 0),
                ("3am", 1),
                ("5am", 2),
                ("2am", 3),
                ("1am", 4),
                ("12am", 5),
                ("6am", 6),
                ("11pm", 7),
                ("10pm", 8),
                ("10am", 9),
                ("9pm", 10),
                ("11am", 11),
                ("7am", 12),
                ("9am", 13),
                ("8pm", 14),
                ("2pm", 15),
                ("1pm", 16),
                ("12pm", 17),
                ("3pm", 18),
                ("4pm", 19),
                ("7pm", 20),
                ("8am", 21),
                ("6pm", 22),
                ("5pm", 23),
            ]),
        );
        ordinal_mappings.insert(
            "weekday".to_string(),
            table(&[
                ("Sun", 0),
                ("Mon", 1),
                ("Tue", 2),
                ("Wed", 3),
                ("Thu", 4),
                ("Fri", 5),
                ("Sat", 6),
            ]),
        );

        Self {
            target: "cnt".to_string(),
            features: strings(&[
                "dteday",
                "season",
                "hr",
                "holiday",
                "weekday",
                "workingday",
                "weathersit",
                "temp",
                "atemp",
                "hum",
                "windspeed",
                "yr",
                "mnth",
                "casual",
                "registered",
            ]),
            unused_fields: strings(&["dteday", "casual", "registered"]),
            date_var: "dteday".to_string(),
            weekday_var: "weekday".to_string(),
            weathersit_var: "weathersit".to_string(),
            yr_var: "yr".to_string(),
            mnth_var: "mnth".to_string(),
            column_groups: vec![
                ColumnGroupConfig {
                    name: "categorical".to_string(),
                    columns: cat_features.clone(),
                    map_ordinals: true,
                    scale: true,
                },
                ColumnGroupConfig {
                    name: "numerical".to_string(),
                    columns: num_features.clone(),
                    map_ordinals: false,
                    scale: true,
                },
            ],
            num_features,
            cat_features,
            ordinal_mappings,
            remainder: Remainder::Passthrough,
            test_size: 0.2,
            random_state: 42,
            lower_quantile: 0.25,
            upper_quantile: 0.75,
            n_estimators: 200,
            max_depth: Some(20),
            min_samples_split: 2,
            min_samples_leaf: 1,
            verbose: false,
        }
    }
}

impl Config {
    /// Reads a JSON configuration file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> BikeshareResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks the consistency of the configuration. Every failure is `InvalidConfig`.
    pub fn validate(&self) -> BikeshareResult<()> {
        self.model_config.validate()?;
        let app = &self.app_config;
        if app.pipeline_save_file.trim().is_empty() || app.trained_model_dir.trim().is_empty() {
            return Err(BikeshareError::InvalidConfig(
                "pipeline_save_file and trained_model_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl ModelConfig {
    /// Columns the raw dataset must provide. The year and month columns are derived from the
    /// date and are not required.
    pub fn required_columns(&self) -> Vec<String> {
        self.features
            .iter()
            .filter(|name| *name != &self.yr_var && *name != &self.mnth_var)
            .chain(std::iter::once(&self.target))
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> BikeshareResult<()> {
        let invalid = |msg: String| -> BikeshareResult<()> { Err(BikeshareError::InvalidConfig(msg)) };

        if self.features.is_empty() {
            return invalid("features must not be empty".to_string());
        }
        if self.features.contains(&self.target) {
            return invalid(format!("target '{}' is listed among the features", self.target));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return invalid(format!(
                "test_size {} must be strictly between 0 and 1",
                self.test_size
            ));
        }
        let quantile_range = 0.0..=1.0;
        if !quantile_range.contains(&self.lower_quantile)
            || !quantile_range.contains(&self.upper_quantile)
            || self.lower_quantile > self.upper_quantile
        {
            return invalid(format!(
                "quantiles ({}, {}) must satisfy 0 <= lower <= upper <= 1",
                self.lower_quantile, self.upper_quantile
            ));
        }
        if self.n_estimators == 0 {
            return invalid("n_estimators must be at least 1".to_string());
        }
        for name in [
            &self.date_var,
            &self.weekday_var,
            &self.weathersit_var,
            &self.yr_var,
            &self.mnth_var,
        ] {
            if !self.features.contains(name) {
                return invalid(format!("column '{}' is not listed among the features", name));
            }
        }
        for name in self.num_features.iter().chain(&self.unused_fields) {
            if !self.features.contains(name) {
                return invalid(format!("column '{}' is not listed among the features", name));
            }
        }

        let mut group_names = HashSet::new();
        let mut claimed = HashSet::new();
        for group in &self.column_groups {
            if !group_names.insert(group.name.as_str()) {
                return invalid(format!("duplicate column group '{}'", group.name));
            }
            if group.columns.is_empty() {
                return invalid(format!("column group '{}' has no columns", group.name));
            }
            if !group.map_ordinals && !group.scale {
                return invalid(format!("column group '{}' has no steps", group.name));
            }
            for column in &group.columns {
                if !claimed.insert(column.as_str()) {
                    return invalid(format!(
                        "column '{}' belongs to more than one group",
                        column
                    ));
                }
                if !self.features.contains(column) || self.unused_fields.contains(column) {
                    return invalid(format!(
                        "column '{}' of group '{}' is not a retained feature",
                        column, group.name
                    ));
                }
                if group.map_ordinals && !self.ordinal_mappings.contains_key(column) {
                    return invalid(format!(
                        "column '{}' of group '{}' has no ordinal mapping table",
                        column, group.name
                    ));
                }
            }
        }
        Ok(())
    }
}
