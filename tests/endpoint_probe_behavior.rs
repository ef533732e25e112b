//! Behaviour tests for ordered endpoint probing: priority order, not-found
//! fall-through, abort on anything else, and exhaustion.

use std::sync::Arc;

use arcdata_core::probe::JsonDocumentParser;
use arcdata_core::providers::statcan::{StatCanSource, WDS_LEGACY_HOST, WDS_REST_HOST};
use arcdata_core::providers::SeriesSource;
use arcdata_core::{
    Candidate, CoreError, DateRange, HttpError, HttpResponse, Prober, ResponseFormat,
    ScriptedHttpClient, SourceName,
};
use tempfile::tempdir;
use time::macros::date;

mod support;

fn json_candidates(urls: &[&str]) -> Vec<Candidate> {
    urls.iter()
        .map(|url| Candidate {
            url: (*url).to_owned(),
            format: ResponseFormat::Json,
        })
        .collect()
}

// =============================================================================
// Prober ordering
// =============================================================================

#[test]
fn when_the_first_endpoint_is_not_found_then_the_next_one_answers_and_no_later_one_is_tried() {
    // Given: A answers 404, B and C would both answer
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond("https://a.test/", HttpResponse::not_found())
            .respond("https://b.test/", HttpResponse::ok(r#"{"from": "b"}"#))
            .respond("https://c.test/", HttpResponse::ok(r#"{"from": "c"}"#)),
    );
    let prober = Prober::new(http.clone());

    // When
    let probed = prober
        .probe(
            "K",
            &json_candidates(&["https://a.test/k", "https://b.test/k", "https://c.test/k"]),
            &JsonDocumentParser::new("test"),
        )
        .expect("probe");

    // Then: B wins and C was never requested
    assert_eq!(probed.value["from"], "b");
    assert_eq!(probed.attempts, 2);
    assert_eq!(
        http.request_urls(),
        vec!["https://a.test/k", "https://b.test/k"]
    );
}

#[test]
fn when_an_endpoint_answers_a_server_error_then_probing_aborts_with_a_transport_error() {
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond("https://a.test/", HttpResponse::new(500, "boom"))
            .respond("https://b.test/", HttpResponse::ok("{}")),
    );
    let prober = Prober::new(http.clone());

    let error = prober
        .probe(
            "K",
            &json_candidates(&["https://a.test/k", "https://b.test/k"]),
            &JsonDocumentParser::new("test"),
        )
        .expect_err("abort");

    match error {
        CoreError::Transport { url, status, .. } => {
            assert_eq!(url.as_deref(), Some("https://a.test/k"));
            assert_eq!(status, Some(500));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(http.request_count(), 1);
}

#[test]
fn when_the_connection_fails_then_probing_aborts_without_trying_later_endpoints() {
    let http = Arc::new(
        ScriptedHttpClient::new()
            .fail("https://a.test/", HttpError::timeout("timed out after 10ms"))
            .respond("https://b.test/", HttpResponse::ok("{}")),
    );
    let prober = Prober::new(http.clone()).with_timeout_ms(10);

    let error = prober
        .probe(
            "K",
            &json_candidates(&["https://a.test/k", "https://b.test/k"]),
            &JsonDocumentParser::new("test"),
        )
        .expect_err("abort");

    assert_eq!(error.code(), "core.transport");
    assert_eq!(http.request_count(), 1);
    assert_eq!(http.requests()[0].timeout_ms, 10);
}

#[test]
fn when_every_endpoint_is_not_found_then_the_error_names_the_key() {
    let http = Arc::new(ScriptedHttpClient::new());
    let prober = Prober::new(http.clone());

    let error = prober
        .probe(
            "v00000000",
            &json_candidates(&["https://a.test/1", "https://a.test/2", "https://b.test/1"]),
            &JsonDocumentParser::new("test"),
        )
        .expect_err("exhausted");

    assert!(matches!(&error, CoreError::NotFound { key } if key == "v00000000"));
    assert!(error.to_string().contains("v00000000"));
    assert_eq!(http.request_count(), 3);
}

// =============================================================================
// Statistics Canada vector probing
// =============================================================================

#[test]
fn when_the_first_host_lacks_a_vector_then_the_second_host_serves_it() {
    // Given: the REST host answers 404 for all three paths; the legacy host
    // serves the JSON envelope on its first path
    let temp = tempdir().expect("tempdir");
    let http = Arc::new(ScriptedHttpClient::new().respond(
        format!("{WDS_LEGACY_HOST}/getDataFromVectorsByVectorIds?vectorIds=v41690973"),
        HttpResponse::ok(r#"[{"status":0},{"vectorData":[{"refPer":"2024-01","value":100}]}]"#),
    ));
    let context = support::context(temp.path(), http.clone());

    // When
    let resolved = context
        .get_series(
            SourceName::StatisticalAgency,
            "v41690973",
            DateRange::unbounded(),
            true,
        )
        .expect("series");

    // Then: one canonical row, reached on the fourth request
    assert_eq!(resolved.rows.len(), 1);
    assert_eq!(resolved.rows[0].date, date!(2024 - 01 - 01));
    assert_eq!(resolved.rows[0].value, 100.0);
    let urls = http.request_urls();
    assert_eq!(urls.len(), 4);
    assert!(urls[..3].iter().all(|url| url.starts_with(WDS_REST_HOST)));
    assert!(urls[3].starts_with(WDS_LEGACY_HOST));

    // And: the vector is now cached under the agency source
    let stored = context
        .warehouse()
        .find_series(SourceName::StatisticalAgency.as_str(), "v41690973")
        .expect("find");
    assert!(stored.is_some());
}

#[test]
fn when_a_csv_endpoint_has_unexpected_headers_then_the_fetch_fails_hard() {
    // Given: only the CSV path answers, with the wrong columns
    let http = Arc::new(ScriptedHttpClient::new().respond(
        format!("{WDS_REST_HOST}/v41690973?format=CSV"),
        HttpResponse::ok("when,amount\n2024-01,100\n"),
    ));
    let source = StatCanSource::new(http.clone(), 1_000);

    // When
    let error = source
        .fetch_series("v41690973", DateRange::unbounded())
        .expect_err("header mismatch");

    // Then: a provider error, and the second host was never consulted
    assert!(matches!(error, CoreError::Provider { .. }));
    assert_eq!(http.request_count(), 3);
}

#[test]
fn when_the_agency_reports_a_failed_status_then_its_message_surfaces() {
    let http = Arc::new(ScriptedHttpClient::new().respond(
        WDS_REST_HOST,
        HttpResponse::ok(
            r#"[{"status":"FAILED","object":"Vector v1 is not valid"}]"#,
        ),
    ));
    let source = StatCanSource::new(http, 1_000);

    let error = source
        .fetch_series("v1", DateRange::unbounded())
        .expect_err("failed status");

    assert!(matches!(error, CoreError::Provider { .. }));
}
