//! Tests for the submission client: retry policy, error classification, and
//! response parsing. All traffic goes through a scripted transport.

mod common;

use common::{ScriptedTransport, Step};
use distribution_records::client::{parse_confirmation, RetryPolicy, SubmissionClient};
use distribution_records::config::ClientConfig;
use distribution_records::error::Error;
use distribution_records::FormNormalizer;
use std::time::Duration;

const BASE: Duration = Duration::from_millis(40);

fn client(steps: Vec<Step>, max_attempts: u32) -> SubmissionClient<ScriptedTransport> {
    SubmissionClient::builder()
        .endpoint("http://records.test/api/records")
        .retry(RetryPolicy::new(max_attempts, BASE))
        .build_with_transport(ScriptedTransport::new(steps))
        .unwrap()
}

fn sample_record() -> distribution_records::Record {
    FormNormalizer::new().normalize(&common::sample_form()).unwrap()
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[test]
fn delay_doubles_per_attempt() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
    assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
}

#[test]
fn default_policy_is_three_attempts_one_second_base() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.base_delay, Duration::from_millis(1000));
}

#[test]
fn succeeds_on_third_attempt_after_full_backoff() {
    let client = client(
        vec![
            Step::Fail("connection refused".into()),
            Step::Respond(503, "unavailable".into()),
            Step::ok(),
        ],
        3,
    );

    let reply = client.submit(&sample_record()).unwrap();
    assert!(reply.success);
    assert_eq!(reply.message, "Record saved");

    let times = client.transport().post_times();
    assert_eq!(times.len(), 3);
    assert!(times[1].duration_since(times[0]) >= BASE);
    assert!(times[2].duration_since(times[0]) >= BASE + BASE * 2);
}

#[test]
fn exhaustion_returns_last_error_after_exact_attempts() {
    let client = client(
        vec![
            Step::Fail("first".into()),
            Step::Fail("second".into()),
            Step::Fail("third".into()),
        ],
        3,
    );

    let err = client.submit(&sample_record()).unwrap_err();
    assert_eq!(client.transport().post_count(), 3);
    match err {
        Error::Transport(msg) => assert_eq!(msg, "third"),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[test]
fn always_failing_backend_sees_max_attempts() {
    let client = client(vec![Step::Respond(500, "boom".into())], 3);
    let err = client.submit(&sample_record()).unwrap_err();
    assert_eq!(client.transport().post_count(), 3);
    assert!(err.to_string().contains("HTTP status 500"));
}

#[test]
fn zero_attempts_still_tries_once() {
    let client = client(vec![Step::Fail("down".into())], 0);
    assert!(client.submit(&sample_record()).is_err());
    assert_eq!(client.transport().post_count(), 1);
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

#[test]
fn server_rejection_is_not_retried() {
    let client = client(vec![Step::rejected("missing required fields: dexNo")], 3);
    let err = client.submit(&sample_record()).unwrap_err();
    assert_eq!(client.transport().post_count(), 1);
    match err {
        Error::Server(msg) => assert_eq!(msg, "missing required fields: dexNo"),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn unparsable_body_is_retried_as_transport_error() {
    let client = client(
        vec![Step::Respond(200, "<html>oops</html>".into()), Step::ok()],
        3,
    );
    assert!(client.submit(&sample_record()).unwrap().success);
    assert_eq!(client.transport().post_count(), 2);
}

#[test]
fn payload_is_the_record_json() {
    let client = client(vec![Step::ok()], 1);
    let record = sample_record();
    client.submit(&record).unwrap();
    let posts = client.transport().posts.lock().unwrap();
    let sent: serde_json::Value = serde_json::from_str(&posts[0].1).unwrap();
    assert_eq!(sent["id"], "001");
    assert_eq!(sent["dexNo"], "0025");
}

#[test]
fn invalid_endpoint_is_a_config_error() {
    let result = SubmissionClient::builder()
        .endpoint("not a url")
        .build_with_transport(ScriptedTransport::new(vec![]));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn builder_reads_client_config() {
    let config = ClientConfig {
        endpoint_url: "http://example.test/submit".into(),
        max_attempts: 5,
        base_delay_ms: 10,
        timeout_seconds: 2.0,
    };
    let client = distribution_records::client::SubmissionClientBuilder::from_config(&config)
        .build_with_transport(ScriptedTransport::new(vec![]))
        .unwrap();
    assert_eq!(client.endpoint().as_str(), "http://example.test/submit");
    assert_eq!(client.retry_policy(), RetryPolicy::new(5, Duration::from_millis(10)));
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[test]
fn parses_plain_json() {
    let c = parse_confirmation(r#"{"success":true,"message":"ok"}"#).unwrap();
    assert!(c.success);
    assert_eq!(c.message, "ok");
}

#[test]
fn parses_json_wrapped_in_text() {
    let c = parse_confirmation("result: {\"success\":false,\"message\":\"no\"} (end)").unwrap();
    assert!(!c.success);
    assert_eq!(c.message, "no");
}

#[test]
fn missing_message_defaults_to_empty() {
    let c = parse_confirmation(r#"{"success":true}"#).unwrap();
    assert_eq!(c.message, "");
}

#[test]
fn rejects_non_json() {
    assert!(matches!(parse_confirmation("OK"), Err(Error::Transport(_))));
    assert!(matches!(parse_confirmation("} {"), Err(Error::Transport(_))));
    assert!(matches!(
        parse_confirmation(r#"{"ok":true}"#),
        Err(Error::Transport(_))
    ));
}

// ---------------------------------------------------------------------------
// Read API
// ---------------------------------------------------------------------------

#[test]
fn read_urls_are_derived_from_endpoint() {
    let client = client(
        vec![
            Step::Respond(200, r#"{"status":"healthy"}"#.into()),
            Step::Respond(
                200,
                r#"{"success":true,"data":[],"total":0,"offset":5,"limit":10}"#.into(),
            ),
            Step::Respond(404, r#"{"success":false,"message":"Record not found"}"#.into()),
        ],
        1,
    );

    assert_eq!(client.health().unwrap()["status"], "healthy");
    let page = client.list_records(10, 5).unwrap();
    assert_eq!(page.offset, 5);
    assert!(client.get_record("a b").unwrap().is_none());

    let gets = client.transport().gets.lock().unwrap().clone();
    assert_eq!(
        gets,
        vec![
            "http://records.test/health",
            "http://records.test/api/records?limit=10&offset=5",
            "http://records.test/api/records/a%20b",
        ]
    );
}

#[test]
fn get_record_unwraps_data() {
    let client = client(
        vec![Step::Respond(200, r#"{"success":true,"data":{"ID":"001"}}"#.into())],
        1,
    );
    let record = client.get_record("001").unwrap().unwrap();
    assert_eq!(record["ID"], "001");
}
