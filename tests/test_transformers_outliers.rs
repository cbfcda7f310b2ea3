mod common;

use approx::assert_abs_diff_eq;
use bikeshare_model::exceptions::{BikeshareError, BikeshareResult};
use bikeshare_model::transformers::outlier_handling::OutlierHandler;
use common::{collect_floats, create_df, floats};

#[tokio::test]
async fn test_outlier_handler_clips_to_quantiles() -> BikeshareResult<()> {
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let df = create_df(vec![("temp", floats(&values))]).await;

    let mut handler = OutlierHandler::new(vec!["temp".to_string()], 0.25, 0.75)?;
    handler.fit(&df).await?;
    let bounds = handler.bounds.as_ref().unwrap()["temp"];
    assert_abs_diff_eq!(bounds.lower, 3.25);
    assert_abs_diff_eq!(bounds.upper, 7.75);

    let clipped = collect_floats(handler.transform(df).await?, "temp").await;
    assert_eq!(clipped.len(), values.len());
    for (before, after) in values.iter().zip(&clipped) {
        assert!(*after >= bounds.lower && *after <= bounds.upper);
        if *before >= bounds.lower && *before <= bounds.upper {
            // In-range values are untouched, bit for bit.
            assert_eq!(before.to_bits(), after.to_bits());
        }
    }
    assert_abs_diff_eq!(clipped[0], 3.25);
    assert_abs_diff_eq!(clipped[9], 7.75);
    Ok(())
}

#[tokio::test]
async fn test_outlier_handler_uses_fit_bounds_on_new_data() -> BikeshareResult<()> {
    let train = create_df(vec![("hum", floats(&[0.0, 1.0, 2.0, 3.0, 4.0]))]).await;
    let mut handler = OutlierHandler::new(vec!["hum".to_string()], 0.0, 1.0)?;
    handler.fit(&train).await?;

    let test = create_df(vec![("hum", floats(&[-5.0, 2.5, 100.0]))]).await;
    let clipped = collect_floats(handler.transform(test).await?, "hum").await;
    assert_eq!(clipped, vec![0.0, 2.5, 4.0]);
    Ok(())
}

#[tokio::test]
async fn test_outlier_handler_leaves_other_columns() -> BikeshareResult<()> {
    let df = create_df(vec![
        ("temp", floats(&[1.0, 2.0, 30.0])),
        ("hum", floats(&[100.0, -100.0, 0.5])),
    ])
    .await;
    let mut handler = OutlierHandler::new(vec!["temp".to_string()], 0.5, 0.5)?;
    handler.fit(&df).await?;
    let transformed = handler.transform(df).await?;
    assert_eq!(collect_floats(transformed.clone(), "temp").await, vec![2.0; 3]);
    assert_eq!(
        collect_floats(transformed, "hum").await,
        vec![100.0, -100.0, 0.5]
    );
    Ok(())
}

#[tokio::test]
async fn test_outlier_handler_keeps_nan() -> BikeshareResult<()> {
    let df = create_df(vec![("temp", floats(&[1.0, 2.0, 3.0, 4.0, f64::NAN]))]).await;
    let mut handler = OutlierHandler::new(vec!["temp".to_string()], 0.25, 0.75)?;
    handler.fit(&df).await?;
    // NaN is ignored when the bounds are learned.
    let bounds = handler.bounds.as_ref().unwrap()["temp"];
    assert_abs_diff_eq!(bounds.lower, 1.75);
    assert_abs_diff_eq!(bounds.upper, 3.25);

    let clipped = collect_floats(handler.transform(df).await?, "temp").await;
    assert_eq!(&clipped[..4], &[1.75, 2.0, 3.0, 3.25]);
    assert!(clipped[4].is_nan());
    Ok(())
}

#[tokio::test]
async fn test_outlier_handler_errors() -> BikeshareResult<()> {
    let df = create_df(vec![("temp", floats(&[1.0]))]).await;
    let handler = OutlierHandler::new(vec!["temp".to_string()], 0.1, 0.9)?;
    assert!(matches!(
        handler.transform(df.clone()).await,
        Err(BikeshareError::NotFitted(_))
    ));

    let mut missing = OutlierHandler::new(vec!["windspeed".to_string()], 0.1, 0.9)?;
    assert!(matches!(
        missing.fit(&df).await,
        Err(BikeshareError::UnknownColumn(_))
    ));
    Ok(())
}
