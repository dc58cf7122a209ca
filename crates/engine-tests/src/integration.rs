#[cfg(test)]
mod tests {
    use crate::{FakeApi, TEST_TOKEN, options_for};
    use axum::http::StatusCode;
    use connectors::error::FetchError;
    use engine_core::{
        connector::HttpPullReader,
        error::{ConnectorError, ProgressError},
        source::StreamReader,
    };
    use futures::TryStreamExt;
    use model::pagination::{offset::Offset, partition::Partition};
    use tracing_test::traced_test;

    async fn connect(api: &FakeApi, extra: &[(&str, &str)]) -> HttpPullReader {
        let addr = api.spawn().await;
        HttpPullReader::connect(&options_for(addr, extra))
            .await
            .unwrap()
    }

    // latest_offset in fixed mode advances by rows_per_batch without touching the source.
    #[traced_test]
    #[tokio::test]
    async fn fixed_mode_advances_without_reading() {
        let api = FakeApi::with_rows(3);
        let reader = connect(&api, &[]).await;

        assert_eq!(reader.initial_offset().await.unwrap(), Offset::ZERO);
        for expected in [10, 20, 30, 40] {
            assert_eq!(reader.latest_offset().await.unwrap(), Offset::new(expected));
        }
        assert!(api.requests_to("GET", "/comments").is_empty());
        assert!(logs_contain("No progress document"));
    }

    // Stored `current: 42` resumes at 42 and the next batch ends at 52.
    #[traced_test]
    #[tokio::test]
    async fn resumes_from_remote_checkpoint() {
        let api = FakeApi::with_rows(100);
        api.set_progress(42);
        let reader = connect(&api, &[]).await;

        assert_eq!(reader.initial_offset().await.unwrap(), Offset::new(42));
        let end = reader.latest_offset().await.unwrap();
        assert_eq!(end, Offset::new(52));

        let parts = reader.partitions(Offset::new(42), end).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].bounds(), (42, 52));

        let load = &api.requests_to("GET", "/progress.json")[0];
        assert_eq!(
            load.header("authorization"),
            Some(format!("Bearer {TEST_TOKEN}").as_str())
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn document_without_current_starts_at_zero() {
        let api = FakeApi::with_rows(10);
        api.set_progress_body("{}");
        let reader = connect(&api, &[]).await;

        assert_eq!(reader.initial_offset().await.unwrap(), Offset::ZERO);
    }

    // Commit PUTs exactly {"current": <cursor>} with overwrite and If-Match.
    #[traced_test]
    #[tokio::test]
    async fn commit_puts_current_offset() {
        let api = FakeApi::with_rows(100);
        api.set_progress(42);
        let reader = connect(&api, &[]).await;

        reader.initial_offset().await.unwrap();
        let end = reader.latest_offset().await.unwrap();
        reader.commit(end).await.unwrap();

        let puts = api.requests_to("PUT", "/progress.json");
        assert_eq!(puts.len(), 1);
        let put = &puts[0];
        assert_eq!(put.body, r#"{"current":52}"#);
        assert_eq!(put.query.get("overwrite").map(String::as_str), Some("true"));
        assert_eq!(put.header("content-type"), Some("application/json"));
        assert_eq!(
            put.header("authorization"),
            Some(format!("Bearer {TEST_TOKEN}").as_str())
        );
        assert_eq!(put.header("if-match"), Some("\"v1\""));
        assert_eq!(api.progress(), Some(52));

        // The second commit is conditional on the version the first one returned
        let end = reader.latest_offset().await.unwrap();
        reader.commit(end).await.unwrap();
        let puts = api.requests_to("PUT", "/progress.json");
        assert_eq!(puts[1].header("if-match"), Some("\"v2\""));
        assert_eq!(api.progress(), Some(62));
        assert!(logs_contain("Committed offset 62"));
    }

    #[traced_test]
    #[tokio::test]
    async fn first_commit_only_creates_the_document() {
        let api = FakeApi::with_rows(10);
        let reader = connect(&api, &[]).await;

        reader.initial_offset().await.unwrap();
        let end = reader.latest_offset().await.unwrap();
        reader.commit(end).await.unwrap();

        let put = &api.requests_to("PUT", "/progress.json")[0];
        assert_eq!(put.header("if-match"), None);
        assert_eq!(put.header("if-none-match"), Some("*"));
        assert_eq!(api.progress(), Some(10));
    }

    // Two jobs that both found no checkpoint must not both win.
    #[traced_test]
    #[tokio::test]
    async fn second_job_on_empty_progress_gets_conflict() {
        let api = FakeApi::with_rows(100);
        let addr = api.spawn().await;
        let first = HttpPullReader::connect(&options_for(addr, &[]))
            .await
            .unwrap();
        let second = HttpPullReader::connect(&options_for(addr, &[("rows_per_batch", "5")]))
            .await
            .unwrap();

        for reader in [&first, &second] {
            reader.initial_offset().await.unwrap();
            reader.latest_offset().await.unwrap();
        }

        first.commit(Offset::new(10)).await.unwrap();
        let err = second.commit(Offset::new(5)).await.unwrap_err();

        assert!(matches!(
            err,
            ConnectorError::Progress(ProgressError::Conflict { .. })
        ));
        assert_eq!(api.progress(), Some(10));
    }

    #[traced_test]
    #[tokio::test]
    async fn concurrent_writer_causes_conflict() {
        let api = FakeApi::with_rows(100);
        api.set_progress(10);
        let reader = connect(&api, &[]).await;

        reader.initial_offset().await.unwrap();
        let end = reader.latest_offset().await.unwrap();

        // Another job commits in the meantime
        api.set_progress(30);

        let err = reader.commit(end).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Progress(ProgressError::Conflict { .. })
        ));
        assert_eq!(api.progress(), Some(30));
    }

    // read((20, 30)) asks for _start=20&_limit=10 and keeps response order.
    #[traced_test]
    #[tokio::test]
    async fn read_requests_partition_window() {
        let api = FakeApi::with_rows(100);
        let reader = connect(&api, &[]).await;

        let rows: Vec<_> = reader
            .read(Partition::new(0, 20, 30).unwrap())
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, (21..=30).collect::<Vec<_>>());
        assert_eq!(rows[0].email, "user21@example.com");

        let gets = api.requests_to("GET", "/comments");
        assert_eq!(gets.len(), 1);
        assert_eq!(gets[0].query_u64("_start"), Some(20));
        assert_eq!(gets[0].query_u64("_limit"), Some(10));
    }

    // Rows past _limit are dropped so the next page does not repeat them.
    #[traced_test]
    #[tokio::test]
    async fn oversized_pages_are_truncated() {
        let api = FakeApi::with_rows(100);
        api.overfill_pages(3);
        let reader = connect(&api, &[("rows_per_batch", "10")]).await;

        let rows: Vec<_> = reader
            .read(Partition::new(0, 0, 25).unwrap())
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
        assert_eq!(api.requests_to("GET", "/comments").len(), 3);
        assert!(logs_contain("dropping the excess"));
    }

    #[traced_test]
    #[tokio::test]
    async fn wide_partitions_are_paged() {
        let api = FakeApi::with_rows(100);
        let reader = connect(&api, &[("rows_per_batch", "10")]).await;

        let rows: Vec<_> = reader
            .read(Partition::new(0, 0, 25).unwrap())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 25);

        let windows: Vec<_> = api
            .requests_to("GET", "/comments")
            .iter()
            .map(|r| (r.query_u64("_start").unwrap(), r.query_u64("_limit").unwrap()))
            .collect();
        assert_eq!(windows, vec![(0, 10), (10, 10), (20, 5)]);
    }

    #[traced_test]
    #[tokio::test]
    async fn short_page_ends_the_partition() {
        let api = FakeApi::with_rows(12);
        let reader = connect(&api, &[]).await;

        let rows: Vec<_> = reader
            .read(Partition::new(0, 10, 40).unwrap())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(api.requests_to("GET", "/comments").len(), 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn malformed_rows_are_a_fetch_error() {
        let api = FakeApi::with_rows(10);
        api.serve_malformed_rows();
        let reader = connect(&api, &[]).await;

        let err = reader
            .read(Partition::new(0, 0, 10).unwrap())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed { start: 0, .. }));
    }

    #[traced_test]
    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let api = FakeApi::with_rows(10);
        api.fail_rows(StatusCode::NOT_FOUND, 1);
        let reader = connect(&api, &[("max_attempts", "3")]).await;

        let err = reader
            .read(Partition::new(0, 0, 10).unwrap())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        match err {
            FetchError::Request { source, .. } => {
                assert_eq!(source.status(), Some(StatusCode::NOT_FOUND));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.requests_to("GET", "/comments").len(), 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn server_errors_are_retried() {
        let api = FakeApi::with_rows(10);
        api.fail_rows(StatusCode::SERVICE_UNAVAILABLE, 2);
        let reader = connect(&api, &[("max_attempts", "3")]).await;

        let rows: Vec<_> = reader
            .read(Partition::new(0, 0, 10).unwrap())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(api.requests_to("GET", "/comments").len(), 3);
    }

    #[traced_test]
    #[tokio::test]
    async fn retries_are_bounded() {
        let api = FakeApi::with_rows(10);
        api.fail_rows(StatusCode::BAD_GATEWAY, 5);
        let reader = connect(&api, &[("max_attempts", "2")]).await;

        let err = reader
            .read(Partition::new(0, 0, 10).unwrap())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
        assert_eq!(api.requests_to("GET", "/comments").len(), 2);
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_progress_load_fails_construction() {
        let api = FakeApi::with_rows(10);
        api.fail_progress(StatusCode::INTERNAL_SERVER_ERROR, 1);
        let addr = api.spawn().await;

        let result =
            HttpPullReader::connect(&options_for(addr, &[("max_attempts", "1")])).await;
        assert!(matches!(
            result,
            Err(ConnectorError::Progress(ProgressError::Load { .. }))
        ));
    }

    #[traced_test]
    #[tokio::test]
    async fn failed_progress_load_can_fall_back_to_zero() {
        let api = FakeApi::with_rows(10);
        api.set_progress(42);
        api.fail_progress(StatusCode::INTERNAL_SERVER_ERROR, 1);
        let reader = connect(
            &api,
            &[("max_attempts", "1"), ("progress_on_error", "zero")],
        )
        .await;

        assert_eq!(reader.initial_offset().await.unwrap(), Offset::ZERO);
        assert!(logs_contain("starting from offset 0"));
    }

    // Probe mode never advertises offsets past the end of a finite source.
    #[traced_test]
    #[tokio::test]
    async fn probe_mode_stops_at_source_end() {
        let api = FakeApi::with_rows(25);
        let reader = connect(&api, &[("latest_offset_mode", "probe")]).await;

        reader.initial_offset().await.unwrap();
        let mut ends = Vec::new();
        for _ in 0..4 {
            ends.push(reader.latest_offset().await.unwrap().offset);
        }
        assert_eq!(ends, vec![10, 20, 25, 25]);
    }

    #[traced_test]
    #[tokio::test]
    async fn split_partitions_cover_the_batch() {
        let api = FakeApi::with_rows(100);
        let reader = connect(&api, &[("num_partitions", "3")]).await;

        let start = reader.initial_offset().await.unwrap();
        let end = reader.latest_offset().await.unwrap();
        let bounds: Vec<_> = reader
            .partitions(start, end)
            .unwrap()
            .iter()
            .map(|p| p.bounds())
            .collect();
        assert_eq!(bounds, vec![(0, 4), (4, 7), (7, 10)]);
    }
}
