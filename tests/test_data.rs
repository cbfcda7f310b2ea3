mod common;

use bikeshare_model::config::ModelConfig;
use bikeshare_model::data::{
    frame_to_matrix, load_dataset, new_context, pre_pipeline_preparation, train_test_split,
};
use bikeshare_model::exceptions::{BikeshareError, BikeshareResult};
use common::{collect_ints, collect_strings, column_names, create_df, floats, ints, strings};

#[tokio::test]
async fn test_pre_pipeline_preparation_derives_year_and_month() -> BikeshareResult<()> {
    let df = create_df(vec![
        ("dteday", strings(&[Some("2011-03-05"), Some("2012-12-31")])),
        ("yr", ints(&[0, 0])),
        ("temp", floats(&[0.3, 0.4])),
    ])
    .await;
    let prepared = pre_pipeline_preparation(df, &ModelConfig::default())?;
    assert_eq!(column_names(&prepared), vec!["dteday", "temp", "yr", "mnth"]);
    assert_eq!(collect_ints(prepared.clone(), "yr").await, vec![2011, 2012]);
    assert_eq!(
        collect_strings(prepared, "mnth").await,
        vec![Some("March".to_string()), Some("December".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_train_test_split_is_deterministic() -> BikeshareResult<()> {
    let ids: Vec<i64> = (0..100).collect();
    let df = create_df(vec![("id", ints(&ids))]).await;

    let (train, test) = train_test_split(df.clone(), 0.25, 42).await?;
    let train_ids = collect_ints(train, "id").await;
    let test_ids = collect_ints(test, "id").await;
    assert_eq!(test_ids.len(), 25);
    assert_eq!(train_ids.len(), 75);

    let mut all: Vec<i64> = train_ids.iter().chain(&test_ids).copied().collect();
    all.sort();
    assert_eq!(all, ids);

    let (_, again) = train_test_split(df.clone(), 0.25, 42).await?;
    assert_eq!(collect_ints(again, "id").await, test_ids);
    let (_, other_seed) = train_test_split(df, 0.25, 43).await?;
    assert_ne!(collect_ints(other_seed, "id").await, test_ids);
    Ok(())
}

#[tokio::test]
async fn test_train_test_split_errors() {
    let empty = create_df(vec![("id", ints(&[]))]).await;
    assert!(matches!(
        train_test_split(empty, 0.2, 1).await,
        Err(BikeshareError::EmptyDataset(_))
    ));
    let one = create_df(vec![("id", ints(&[1]))]).await;
    assert!(matches!(
        train_test_split(one.clone(), 0.2, 1).await,
        Err(BikeshareError::EmptyDataset(_))
    ));
    assert!(matches!(
        train_test_split(one, 0.0, 1).await,
        Err(BikeshareError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_frame_to_matrix_rejects_nulls() -> BikeshareResult<()> {
    let df = create_df(vec![
        ("a", ints(&[1, 2])),
        ("b", floats(&[0.5, 1.5])),
    ])
    .await;
    let (names, matrix) = frame_to_matrix(df).await?;
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(matrix[[1, 0]], 2.0);
    assert_eq!(matrix[[1, 1]], 1.5);

    let with_text = create_df(vec![("season", strings(&[Some("spring")]))]).await;
    assert!(matches!(
        frame_to_matrix(with_text).await,
        Err(BikeshareError::InvalidData(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_load_dataset_rejects_unknown_extension() {
    let ctx = new_context();
    assert!(matches!(
        load_dataset(&ctx, "rides.json").await,
        Err(BikeshareError::InvalidConfig(_))
    ));
}
