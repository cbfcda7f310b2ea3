#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use bikeshare_model::config::Config;
use bikeshare_model::data::{collect_batch, new_context};
use chrono::{Datelike, NaiveDate};
use datafusion::datasource::memory::MemTable;
use datafusion::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Builds an in-memory DataFrame from named columns, in order.
pub async fn create_df(columns: Vec<(&str, ArrayRef)>) -> DataFrame {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = new_context();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

pub fn strings(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

pub fn floats(values: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

pub fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32
}

pub fn dates(values: &[Option<NaiveDate>]) -> ArrayRef {
    Arc::new(Date32Array::from(
        values
            .iter()
            .map(|d| d.map(days_since_epoch))
            .collect::<Vec<_>>(),
    ))
}

/// Collects one column as optional strings.
pub async fn collect_strings(df: DataFrame, name: &str) -> Vec<Option<String>> {
    let batch = collect_batch(df).await.unwrap();
    let column = batch.column_by_name(name).unwrap();
    let array = column.as_any().downcast_ref::<StringArray>().unwrap();
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
        .collect()
}

/// Collects one Float64 column.
pub async fn collect_floats(df: DataFrame, name: &str) -> Vec<f64> {
    let batch = collect_batch(df).await.unwrap();
    let column = batch.column_by_name(name).unwrap();
    column
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap()
        .values()
        .to_vec()
}

/// Collects one Int64 column.
pub async fn collect_ints(df: DataFrame, name: &str) -> Vec<i64> {
    let batch = collect_batch(df).await.unwrap();
    let column = batch.column_by_name(name).unwrap();
    column
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap()
        .values()
        .to_vec()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

const HOUR_LABELS: [&str; 24] = [
    "12am", "1am", "2am", "3am", "4am", "5am", "6am", "7am", "8am", "9am", "10am", "11am", "12pm",
    "1pm", "2pm", "3pm", "4pm", "5pm", "6pm", "7pm", "8pm", "9pm", "10pm", "11pm",
];

/// Relative demand per hour of day, with commute peaks.
const HOUR_PROFILE: [f64; 24] = [
    0.25, 0.15, 0.1, 0.05, 0.05, 0.15, 0.5, 1.4, 2.6, 1.5, 0.9, 1.0, 1.2, 1.2, 1.1, 1.2, 1.6, 2.8,
    2.6, 1.7, 1.2, 0.9, 0.7, 0.45,
];

const WEATHER: [(&str, f64); 4] = [
    ("Clear", 1.0),
    ("Mist", 0.85),
    ("Light Rain", 0.55),
    ("Heavy Rain", 0.3),
];

fn season_of(month: u32) -> &'static str {
    match month {
        3..=5 => "spring",
        6..=8 => "summer",
        9..=11 => "fall",
        _ => "winter",
    }
}

/// Generates a raw bike-share frame of `n_rows` rows spanning 2011 and 2012.
///
/// About 5% of the weekday and weathersit values are missing (alternating null and empty
/// string). `cnt = casual + registered` and depends on hour, temperature, weather and year.
pub async fn synthetic_bikeshare(n_rows: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();

    let mut dteday = Vec::with_capacity(n_rows);
    let mut season = Vec::with_capacity(n_rows);
    let mut hr = Vec::with_capacity(n_rows);
    let mut holiday = Vec::with_capacity(n_rows);
    let mut weekday: Vec<Option<String>> = Vec::with_capacity(n_rows);
    let mut workingday = Vec::with_capacity(n_rows);
    let mut weathersit: Vec<Option<String>> = Vec::with_capacity(n_rows);
    let (mut temp, mut atemp, mut hum, mut windspeed) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    let (mut casual, mut registered, mut cnt) = (Vec::new(), Vec::new(), Vec::new());

    for row in 0..n_rows {
        let date = start + chrono::Duration::days(rng.gen_range(0..731));
        let hour = rng.gen_range(0..24usize);
        let is_holiday = rng.gen_bool(0.03);
        let weekend = matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);
        let weather_idx = match rng.gen_range(0..100) {
            0..=59 => 0,
            60..=84 => 1,
            85..=97 => 2,
            _ => 3,
        };

        let month_warmth = 1.0 - ((date.month() as f64 - 7.0).abs() / 6.0);
        let t = (0.15 + 0.7 * month_warmth + rng.gen_range(-0.1..0.1)).clamp(0.02, 1.0);
        let year_boost = if date.year() == 2012 { 1.4 } else { 1.0 };
        let demand = 160.0 * HOUR_PROFILE[hour] * (0.4 + t) * WEATHER[weather_idx].1 * year_boost;
        let total = (demand + rng.gen_range(-20.0..20.0)).max(1.0).round();
        let casual_share = if weekend { 0.35 } else { 0.15 };
        let c = (total * casual_share).round();

        dteday.push(date.format("%Y-%m-%d").to_string());
        season.push(season_of(date.month()).to_string());
        hr.push(HOUR_LABELS[hour].to_string());
        holiday.push(if is_holiday { "Yes" } else { "No" }.to_string());
        workingday.push(if weekend || is_holiday { "No" } else { "Yes" }.to_string());

        let day_name = date.format("%a").to_string();
        weekday.push(match (rng.gen_bool(0.05), row % 2) {
            (true, 0) => None,
            (true, _) => Some(String::new()),
            (false, _) => Some(day_name),
        });
        weathersit.push(match (rng.gen_bool(0.05), row % 2) {
            (true, 0) => Some(String::new()),
            (true, _) => None,
            (false, _) => Some(WEATHER[weather_idx].0.to_string()),
        });

        temp.push(t);
        atemp.push((t * 0.95 + rng.gen_range(-0.05..0.05)).clamp(0.0, 1.0));
        hum.push(rng.gen_range(0.2..1.0));
        windspeed.push(rng.gen_range(0.0..0.6));
        casual.push(c as i64);
        registered.push((total - c) as i64);
        cnt.push(total as i64);
    }

    let owned = |values: Vec<String>| -> ArrayRef { Arc::new(StringArray::from(values)) };
    let optional = |values: Vec<Option<String>>| -> ArrayRef { Arc::new(StringArray::from(values)) };
    create_df(vec![
        ("dteday", owned(dteday)),
        ("season", owned(season)),
        ("hr", owned(hr)),
        ("holiday", owned(holiday)),
        ("weekday", optional(weekday)),
        ("workingday", owned(workingday)),
        ("weathersit", optional(weathersit)),
        ("temp", floats(&temp)),
        ("atemp", floats(&atemp)),
        ("hum", floats(&hum)),
        ("windspeed", floats(&windspeed)),
        ("casual", ints(&casual)),
        ("registered", ints(&registered)),
        ("cnt", ints(&cnt)),
    ])
    .await
}

/// The default configuration with a small forest and the artifact directory moved to `dir`.
pub fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.app_config.trained_model_dir = dir.display().to_string();
    config.model_config.n_estimators = 20;
    config.model_config.max_depth = Some(8);
    config
}
