// tests/pipeline_e2e.rs
mod common;

use common::{stat_body, ScriptedTransport, AV_DAILY, BCB_SELIC, NEWS_PAGE};
use market_data_collector::ingest::retry::RetryPolicy;
use market_data_collector::{
    emit, Collector, CollectorSettings, Encoding, FailureReason, FieldValue, MemorySink,
    OutcomeStatus, PipelineError, SourceDescriptor, SourceKind,
};
use std::time::Duration;

const SGS: &str = "https://bcb.test/sgs/{id}";

fn sgs(id: &str) -> SourceDescriptor {
    SourceDescriptor::new(id, SGS, SourceKind::StatSeries)
}

fn sgs_url(id: &str) -> String {
    SGS.replace("{id}", id)
}

fn fast(max_attempts: u32) -> CollectorSettings {
    CollectorSettings {
        retry: RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn hard_error_in_the_middle_does_not_stop_the_run() {
    let transport = ScriptedTransport::new()
        .respond(&sgs_url("IPCA"), 200, &stat_body(&[("01/01/2024", "0,42")]))
        .respond(&sgs_url("SELIC"), 500, "boom")
        .respond(&sgs_url("PIB"), 200, &stat_body(&[("01/01/2024", "1.234,56")]));
    let collector = Collector::new(transport.clone(), fast(2));

    let report = collector
        .run(&[sgs("IPCA"), sgs("SELIC"), sgs("PIB")])
        .await
        .unwrap();

    assert_eq!(transport.calls().len(), 3);
    assert_eq!(report.table.len(), 2);
    let ids: Vec<&str> = report.table.rows().iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(ids, ["IPCA", "PIB"]);
    assert_eq!(
        report.table.rows()[1].fields.get("value"),
        Some(&FieldValue::Number(1234.56))
    );

    assert_eq!(report.failed(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.source_id, "SELIC");
    assert_eq!(failure.reason, FailureReason::HardError(500));
    assert_eq!(report.outcomes[1].attempts, 1);
}

#[tokio::test]
async fn all_empty_ends_in_nothing_collected_and_skips_the_sink() {
    let transport = ScriptedTransport::new()
        .respond(&sgs_url("IPCA"), 200, "[]")
        .respond(&sgs_url("SELIC"), 200, "[]");
    let collector = Collector::new(transport, fast(2));

    let report = collector.run(&[sgs("IPCA"), sgs("SELIC")]).await.unwrap();
    assert!(report.table.is_empty());
    assert_eq!(report.empty(), 2);

    let sink = MemorySink::new();
    let err = emit(&sink, &report.table, "out.csv", Encoding::Utf8Bom)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoDataCollected));
    assert_eq!(sink.call_count(), 0);
    assert!(matches!(report.into_table(), Err(PipelineError::NoDataCollected)));
}

#[tokio::test(start_paused = true)]
async fn retry_is_transparent_to_normalization() {
    let body = stat_body(&[("01/01/2024", "0,42"), ("02/01/2024", "0,43")]);

    let direct = ScriptedTransport::new().respond(&sgs_url("IPCA"), 200, &body);
    let direct_report = Collector::new(direct, CollectorSettings::default())
        .run(&[sgs("IPCA")])
        .await
        .unwrap();

    let flaky = ScriptedTransport::new()
        .respond(&sgs_url("IPCA"), 503, "")
        .respond(&sgs_url("IPCA"), 200, &body);
    let flaky_report = Collector::new(flaky.clone(), CollectorSettings::default())
        .run(&[sgs("IPCA")])
        .await
        .unwrap();

    assert_eq!(flaky.calls_to(&sgs_url("IPCA")), 2);
    assert_eq!(flaky_report.outcomes[0].attempts, 2);
    assert_eq!(flaky_report.table, direct_report.table);
}

#[tokio::test]
async fn rate_limit_is_not_retried_and_next_source_still_runs() {
    let av = "https://av.test/q?symbol={id}.SA";
    let transport = ScriptedTransport::new()
        .respond(
            "https://av.test/q?symbol=PETR4.SA",
            200,
            r#"{"Note": "API call frequency is 5 calls per minute"}"#,
        )
        .respond("https://av.test/q?symbol=VALE3.SA", 200, AV_DAILY);
    let collector = Collector::new(transport.clone(), fast(5));

    let report = collector
        .run(&[
            SourceDescriptor::new("PETR4", av, SourceKind::TimeSeries),
            SourceDescriptor::new("VALE3", av, SourceKind::TimeSeries),
        ])
        .await
        .unwrap();

    assert_eq!(transport.calls_to("https://av.test/q?symbol=PETR4.SA"), 1);
    assert!(matches!(
        &report.outcomes[0].status,
        OutcomeStatus::Failed { error } if matches!(error.reason, FailureReason::RateLimited(_))
    ));
    assert_eq!(report.collected(), 1);
    assert_eq!(report.table.len(), 10);
    assert!(report.table.rows().iter().all(|r| r.source_id == "VALE3"));
}

#[tokio::test]
async fn attempts_never_exceed_the_budget() {
    let transport = ScriptedTransport::new()
        .respond(&sgs_url("A"), 503, "")
        .respond(&sgs_url("A"), 503, "")
        .respond(&sgs_url("A"), 503, "")
        .respond(&sgs_url("A"), 503, "")
        .fail(&sgs_url("B"), "connection reset")
        .respond(&sgs_url("B"), 200, &stat_body(&[("01/01/2024", "1")]))
        .respond(&sgs_url("C"), 404, "");
    let collector = Collector::new(transport.clone(), fast(3));

    let report = collector.run(&[sgs("A"), sgs("B"), sgs("C")]).await.unwrap();

    assert_eq!(transport.calls_to(&sgs_url("A")), 3);
    assert_eq!(transport.calls_to(&sgs_url("B")), 2);
    assert_eq!(transport.calls_to(&sgs_url("C")), 1);
    assert!(report.outcomes.iter().all(|o| o.attempts <= 3));
    assert_eq!(
        report.failures().next().unwrap().reason,
        FailureReason::RetriesExhausted {
            attempts: 3,
            status: Some(503)
        }
    );
    assert_eq!(report.collected(), 1);
    assert_eq!(report.failed(), 2);
}

#[tokio::test(start_paused = true)]
async fn sources_are_spaced_but_not_after_the_last() {
    let transport = ScriptedTransport::new()
        .respond(&sgs_url("A"), 200, "[]")
        .respond(&sgs_url("B"), 200, "[]")
        .respond(&sgs_url("C"), 200, "[]");
    let settings = CollectorSettings {
        inter_request_delay: Duration::from_secs(15),
        ..fast(1)
    };
    let collector = Collector::new(transport, settings);

    let t0 = tokio::time::Instant::now();
    collector.run(&[sgs("A"), sgs("B"), sgs("C")]).await.unwrap();
    let elapsed = t0.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(45), "{elapsed:?}");
}

#[tokio::test]
async fn missing_credential_fails_before_any_request() {
    let transport = ScriptedTransport::new();
    let collector = Collector::new(transport.clone(), fast(2));
    let err = collector
        .run(&[
            sgs("IPCA"),
            SourceDescriptor::new("PETR4", "https://av.test/q?s={id}&apikey={api_key}", SourceKind::TimeSeries),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingCredential { source_id } if source_id == "PETR4"));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn malformed_payload_counts_as_empty_not_failure() {
    let transport = ScriptedTransport::new()
        .respond(&sgs_url("PIB"), 200, &stat_body(&[("01/01/2024", "")]))
        .respond(&sgs_url("IPCA"), 200, BCB_SELIC);
    let collector = Collector::new(transport, fast(2));

    let report = collector.run(&[sgs("PIB"), sgs("IPCA")]).await.unwrap();
    assert!(matches!(report.outcomes[0].status, OutcomeStatus::Empty { .. }));
    assert_eq!(report.failed(), 0);
    assert_eq!(report.table.len(), 4);
}

#[tokio::test]
async fn news_pages_are_filtered_and_deduplicated_across_sites() {
    let keywords: Vec<String> = ["selic", "ipca", "ibovespa", "mercado", "juros"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let transport = ScriptedTransport::new()
        .respond("https://g1.test/economia/", 200, NEWS_PAGE)
        .respond("https://cnn.test/economia/", 200, NEWS_PAGE)
        .respond("https://exame.test/economia/", 503, "");
    let settings = CollectorSettings {
        keywords,
        ..fast(1)
    };
    let collector = Collector::new(transport, settings);

    let report = collector
        .run(&[
            SourceDescriptor::new("G1", "https://g1.test/economia/", SourceKind::HtmlPage),
            SourceDescriptor::new("CNN", "https://cnn.test/economia/", SourceKind::HtmlPage),
            SourceDescriptor::new("Exame", "https://exame.test/economia/", SourceKind::HtmlPage),
        ])
        .await
        .unwrap();

    let titles: Vec<&str> = report
        .table
        .rows()
        .iter()
        .filter_map(|r| r.fields.get("title").and_then(|v| v.as_text()))
        .collect();
    assert_eq!(
        titles,
        [
            "Copom Mantém Selic Em 10,50%",
            "Ibovespa Fecha Em Alta",
            "Ipca De Março Surpreende"
        ]
    );
    assert!(report.table.rows().iter().all(|r| r.source_id == "G1"));
    assert_eq!(
        report.table.rows()[0].fields.get("link").and_then(|v| v.as_text()),
        Some("https://g1.test/economia/noticia/copom-selic.html")
    );
    assert_eq!(
        report.outcomes[0].status,
        OutcomeStatus::Collected {
            rows: 3,
            duplicates: 1
        }
    );
    // Same page on a second site: every headline was already seen.
    assert_eq!(
        report.outcomes[1].status,
        OutcomeStatus::Collected {
            rows: 0,
            duplicates: 4
        }
    );
    assert_eq!(report.failed(), 1);
}
