mod common;

use bikeshare_model::exceptions::{BikeshareError, BikeshareResult};
use bikeshare_model::transformers::feature_selection::{drop_columns, ColumnDropper};
use common::{column_names, create_df, floats, strings};
use datafusion::prelude::DataFrame;

async fn sample_df() -> DataFrame {
    create_df(vec![
        ("dteday", strings(&[Some("2011-01-01"), Some("2011-01-02")])),
        ("temp", floats(&[0.2, 0.3])),
        ("casual", floats(&[3.0, 8.0])),
        ("hum", floats(&[0.8, 0.7])),
    ])
    .await
}

#[tokio::test]
async fn test_drop_columns_removes_exactly_named() -> BikeshareResult<()> {
    let df = sample_df().await;
    let dropped = drop_columns(df, &["dteday".to_string(), "casual".to_string()])?;
    assert_eq!(column_names(&dropped), vec!["temp", "hum"]);
    assert_eq!(dropped.count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_drop_columns_unknown_column() {
    let df = sample_df().await;
    assert!(matches!(
        drop_columns(df, &["registered".to_string()]),
        Err(BikeshareError::UnknownColumn(_))
    ));
}

#[tokio::test]
async fn test_drop_columns_all_is_invalid() {
    let df = sample_df().await;
    let all: Vec<String> = column_names(&df);
    assert!(matches!(
        drop_columns(df, &all),
        Err(BikeshareError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_column_dropper_stage() -> BikeshareResult<()> {
    let df = sample_df().await;
    let mut dropper = ColumnDropper::new(vec!["casual".to_string()]);
    dropper.fit(&df).await?;
    let transformed = dropper.transform(df).await?;
    assert_eq!(column_names(&transformed), vec!["dteday", "temp", "hum"]);
    Ok(())
}
