mod common;

use axum::http::StatusCode;
use common::*;
use tablecall_server::replies;

fn from(
    caller: &'static str,
    event: Vec<(&'static str, &'static str)>,
) -> Vec<(&'static str, &'static str)> {
    event
        .into_iter()
        .map(|(k, v)| if k == "From" { (k, caller) } else { (k, v) })
        .collect()
}

#[tokio::test]
async fn caller_over_limit_is_hung_up_on_with_markup() {
    let h = harness(Fakes {
        webhook_rate_limit: 2,
        ..Fakes::default()
    });

    for i in 1..=2 {
        let reply = post_webhook(&h.app, "/voice/webhook", &ringing()).await;
        assert_eq!(reply.status, StatusCode::OK, "request {} should succeed", i);
        assert!(reply.body.contains("<Record "), "request {} should record", i);
    }

    for i in 3..=4 {
        let reply = post_webhook(&h.app, "/voice/webhook", &recorded()).await;
        assert_eq!(reply.status, StatusCode::OK, "request {} should still answer", i);
        assert_eq!(reply.content_type, "application/xml");
        assert_eq!(
            reply.body,
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>\
                 <Say voice=\"alice\">{}</Say><Hangup/></Response>",
                replies::RATE_LIMITED
            )
        );
    }

    // Throttled turns never reach the vendors.
    assert_eq!(h.synthesizer.texts.lock().unwrap().len(), 2);
    assert!(h.transcriber.urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn limit_is_counted_per_caller() {
    let h = harness(Fakes {
        webhook_rate_limit: 1,
        ..Fakes::default()
    });

    for caller in ["+15550000001", "+15550000002", "+15550000003"] {
        let reply = post_webhook(&h.app, "/voice/webhook", &from(caller, ringing())).await;
        assert!(reply.body.contains("<Record "), "{caller} should be greeted");
    }

    let again = post_webhook(&h.app, "/voice/webhook", &from("+15550000001", ringing())).await;
    assert!(again.body.contains(replies::RATE_LIMITED));
}

#[tokio::test]
async fn audio_route_is_not_rate_limited() {
    let h = harness(Fakes {
        webhook_rate_limit: 1,
        ..Fakes::default()
    });

    for _ in 0..3 {
        let request = axum::http::Request::builder()
            .uri("/voice/audio/missing")
            .body(axum::body::Body::empty())
            .unwrap();
        let reply = send(&h.app, request).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }
}
