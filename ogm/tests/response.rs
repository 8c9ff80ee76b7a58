use std::sync::Arc;

use futures_util::StreamExt;
use ogm::{
    driver::{memory::InMemoryDriver, Request},
    error::OgmResult,
    model::Value,
    response::{
        into_stream, EmptyResponse, RecordShape, Response, ResponseExt, ResponseRecord, Scalar,
    },
};

mod test_utils;

fn numbers(n: i64) -> Request {
    Request::rows(["i"], (0..n).map(|i| vec![Value::Int(i)]).collect())
}

#[tokio::test]
async fn test_row_id_after_n_rows() -> OgmResult<()> {
    test_utils::setup_tracing(None);
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver, 3);
    let mut session = factory.open_session();

    for n in [0, 1, 3, 10] {
        let mut response = session.query(numbers(n), Scalar::<i64>::new()).await?;
        let mut read = 0;
        while let Some(i) = response.next().await? {
            assert_eq!(i, read);
            read += 1;
        }
        assert_eq!(read, n);
        assert_eq!(response.row_id(), n - 1);

        // Past the end, `next` keeps returning terminal.
        assert!(response.next().await?.is_none());
        assert!(response.next().await?.is_none());
        assert_eq!(response.row_id(), n - 1);
    }
    Ok(())
}

#[tokio::test]
async fn test_close_is_idempotent() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver, 2);
    let mut session = factory.open_session();

    let mut response = session.query_records(numbers(5)).await?;
    let first = response.next().await?.unwrap();
    assert_eq!(first.get("i"), Some(&Value::Int(0)));

    response.close();
    let (row_id, columns) = (response.row_id(), response.columns().to_vec());
    response.close();
    assert_eq!(response.row_id(), row_id);
    assert_eq!(response.columns(), columns);
    assert!(response.next().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_empty_response_contract() -> OgmResult<()> {
    let mut response = EmptyResponse::<ResponseRecord>::new();
    response.close();
    assert!(response.next().await?.is_none());
    response.expect(RecordShape::columns(["anything"]));
    assert!(response.columns().is_empty());
    assert_eq!(response.row_id(), -1);
    assert!(response.next().await?.is_none());
    response.close();
    assert_eq!(response.row_id(), -1);
    Ok(())
}

#[tokio::test]
async fn test_zero_rows_look_like_empty_response() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver, 10);
    let mut session = factory.open_session();

    let mut no_rows = session.query_records(numbers(0)).await?;
    let mut noop = session.query_records(Request::noop()).await?;
    for response in [&mut no_rows, &mut noop] {
        assert!(response.next().await?.is_none());
        assert!(response.columns().is_empty());
        assert_eq!(response.row_id(), -1);
    }
    Ok(())
}

#[tokio::test]
async fn test_expect_shape() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver, 10);
    let mut session = factory.open_session();

    let mut response = session.query_records(numbers(2)).await?;
    response.expect(RecordShape::columns(["i"]));
    assert!(response.next().await?.is_some());
    response.expect(RecordShape::columns(["x", "y"]));
    assert!(response.next().await.unwrap_err().is_decoding());
    Ok(())
}

#[tokio::test]
async fn test_decoding_failure_is_reported() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver, 10);
    let mut session = factory.open_session();

    let request = Request::rows(["i"], vec![vec![Value::Int(1)], vec![Value::from("two")]]);
    let mut response = session.query(request, Scalar::<i64>::new()).await?;
    assert_eq!(response.next().await?, Some(1));
    assert!(response.next().await.unwrap_err().is_decoding());
    assert_eq!(response.row_id(), 0);
    Ok(())
}

#[tokio::test]
async fn test_responses_return_connections() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(2));
    let factory = test_utils::factory_with(driver.clone(), 2);
    let mut session = factory.open_session();

    // Drained.
    let mut response = session.query_records(numbers(5)).await?;
    assert_eq!(driver.available_connections(), 1);
    assert_eq!(response.drain().await?, 5);
    assert_eq!(driver.available_connections(), 2);

    // Closed mid-stream.
    let mut response = session.query_records(numbers(5)).await?;
    response.next().await?;
    response.close();
    test_utils::settle(&driver).await;
    assert_eq!(driver.available_connections(), 2);

    // Dropped.
    let response = session.query_records(numbers(5)).await?;
    assert_eq!(driver.available_connections(), 1);
    drop(response);
    test_utils::settle(&driver).await;
    assert_eq!(driver.available_connections(), 2);
    Ok(())
}

#[tokio::test]
async fn test_into_stream() -> OgmResult<()> {
    let driver = Arc::new(InMemoryDriver::new(4));
    let factory = test_utils::factory_with(driver, 4);
    let mut session = factory.open_session();

    let response = session.query(numbers(10), Scalar::<i64>::new()).await?;
    let sum: i64 = into_stream(response)
        .map(|item| item.unwrap())
        .fold(0, |acc, i| async move { acc + i })
        .await;
    assert_eq!(sum, 45);
    Ok(())
}
