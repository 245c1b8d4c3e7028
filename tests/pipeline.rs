//! Integration tests for the command pipeline: FIFO response matching,
//! offline buffering, reconnect supervision, unavailability, disposal, and
//! the internal-error ceiling.

use std::time::Duration;

use bloomd_client::{BloomClient, BloomError, ClientEvent, CreateOptions};
use tokio::time::{sleep, timeout};

mod common;
use common::{MockBloomd, ServerOptions, TestResult, free_port};

fn client_for(port: u16) -> BloomClient {
    BloomClient::builder()
        .host("127.0.0.1")
        .port(port)
        .reconnect_delay(Duration::from_millis(10))
        .build()
}

async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<ClientEvent>,
) -> TestResult<ClientEvent> {
    Ok(timeout(Duration::from_secs(5), events.recv()).await??)
}

/// The i-th callback (by submission order) receives the result for the i-th
/// command, for interleaved verbs on one connection.
#[tokio::test]
async fn responses_match_commands_in_submission_order() -> TestResult {
    let server = MockBloomd::start().await?;
    let client = client_for(server.port());
    client.create("f", &CreateOptions::new()).await?;

    let keys: Vec<String> = (0..20).map(|i| format!("key-{i}")).collect();
    let mut expected = Vec::new();
    let mut submissions = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if i % 2 == 0 {
            // a fresh key: set answers Yes
            submissions.push(futures::future::Either::Left(client.set("f", key)));
            expected.push(true);
        } else {
            // never set: check answers No
            submissions.push(futures::future::Either::Right(client.check("f", key)));
            expected.push(false);
        }
    }
    let results = futures::future::join_all(submissions).await;

    for (i, (result, expected)) in results.into_iter().zip(expected).enumerate() {
        assert_eq!(result?, expected, "command {i} got another command's result");
    }
    assert_eq!(client.stats().commands_sent, 21);

    let log = server.log();
    assert_eq!(log.len(), 21);
    assert_eq!(log[1], "set f key-0");
    assert_eq!(log[2], "check f key-1");
    assert_eq!(log[19], "set f key-18");
    Ok(())
}

/// Commands submitted before the socket connects are preserved and written
/// in submission order once it does.
#[tokio::test]
async fn offline_commands_flush_in_order_on_connect() -> TestResult {
    let port = free_port().await?;
    let client = client_for(port);
    let mut events = client.events();

    let create_options = CreateOptions::new();
    let (created, set, checked, server) = tokio::join!(
        client.create("pages", &create_options),
        client.set("pages", "zipzab"),
        client.check("pages", "zipzab"),
        async {
            // let the client queue everything first
            sleep(Duration::from_millis(50)).await;
            MockBloomd::start_on(port, ServerOptions::default()).await
        },
    );
    let server = server?;

    created?;
    assert!(set?);
    assert!(checked?);
    assert_eq!(
        server.log(),
        ["create pages", "set pages zipzab", "check pages zipzab"]
    );

    let mut saw_drain = false;
    while let Ok(event) = events.try_recv() {
        if event == ClientEvent::Drain {
            saw_drain = true;
        }
    }
    assert!(saw_drain, "drain should fire after the offline queue flushes");
    Ok(())
}

/// A server that becomes available later is eventually reached, and the
/// safe coordinator's create is counted in `commands_sent`.
#[tokio::test]
async fn client_recovers_when_the_server_starts_late() -> TestResult {
    let port = free_port().await?;
    let client = client_for(port);

    let (set, server) = tokio::join!(
        client.set_safe("visitors", "zipzab", CreateOptions::new()),
        async {
            sleep(Duration::from_millis(80)).await;
            MockBloomd::start_on(port, ServerOptions::default()).await
        },
    );
    let server = server?;
    assert!(set?);
    assert!(client.check("visitors", "zipzab").await?);
    client.drop_filter("visitors").await?;

    // set + create + retried set + check + drop
    let stats = client.stats();
    assert_eq!(stats.commands_sent, 5);
    assert!(
        stats.connection_attempts >= 2,
        "the first attempts hit a closed port"
    );
    assert_eq!(
        server.log(),
        [
            "set visitors zipzab",
            "create visitors",
            "set visitors zipzab",
            "check visitors zipzab",
            "drop visitors",
        ]
    );
    Ok(())
}

/// With one allowed attempt and no server, everything queued and everything
/// submitted later fails with the unavailability error, and the event fires
/// exactly once.
#[tokio::test]
async fn give_up_rejects_all_queues_and_future_commands() -> TestResult {
    let port = free_port().await?;
    let client = BloomClient::builder()
        .port(port)
        .reconnect_delay(Duration::from_millis(10))
        .max_connection_attempts(1)
        .build();
    let mut events = client.events();

    let buffered = client.set("f", "k");
    let (result, event) = tokio::join!(buffered, next_event(&mut events));
    assert_eq!(result.expect_err("no server"), BloomError::Unavailable);

    let mut unavailable_events = 0;
    let mut event = event?;
    loop {
        if event == ClientEvent::Unavailable {
            unavailable_events += 1;
        }
        match events.try_recv() {
            Ok(next) => event = next,
            Err(_) => break,
        }
    }
    assert_eq!(unavailable_events, 1);

    let late = client.check("f", "k").await;
    assert_eq!(late.expect_err("still unavailable"), BloomError::Unavailable);
    assert_eq!(client.stats().commands_sent, 0);
    Ok(())
}

/// `reconnect()` resets the counters and leaves the unavailable state.
#[tokio::test]
async fn explicit_reconnect_recovers_an_unavailable_client() -> TestResult {
    let port = free_port().await?;
    let client = BloomClient::builder()
        .port(port)
        .reconnect_delay(Duration::from_millis(10))
        .max_connection_attempts(1)
        .build();
    let mut events = client.events();

    let rejected = client.set("f", "k").await;
    assert_eq!(rejected.expect_err("no server"), BloomError::Unavailable);
    while next_event(&mut events).await? != ClientEvent::Unavailable {}

    let server = MockBloomd::start_on(port, ServerOptions::default()).await?;
    client.reconnect();
    client.create("f", &CreateOptions::new()).await?;
    assert!(client.set("f", "k").await?);
    assert_eq!(server.log().len(), 2);
    Ok(())
}

/// After `dispose` no reconnection is attempted and pending commands fail.
#[tokio::test]
async fn dispose_is_final() -> TestResult {
    let server = MockBloomd::start_with(ServerOptions {
        stall: true,
        ..ServerOptions::default()
    })
    .await?;
    let client = client_for(server.port());
    let mut events = client.events();
    assert_eq!(next_event(&mut events).await?, ClientEvent::Connected);

    // written, never answered
    let stuck = tokio::spawn({
        let client = client.clone();
        async move { client.set("f", "k").await }
    });
    sleep(Duration::from_millis(50)).await;

    client.dispose();
    let pending = timeout(Duration::from_secs(5), stuck).await??;
    assert_eq!(
        pending.expect_err("written request is lost"),
        BloomError::ConnectionLost
    );

    let refused = client.set("f", "k").await;
    assert_eq!(refused.expect_err("disposed"), BloomError::Disposed);

    // no reconnect after disposal
    sleep(Duration::from_millis(100)).await;
    while let Ok(event) = events.try_recv() {
        assert_ne!(event, ClientEvent::Connected, "disposed client reconnected");
    }
    Ok(())
}

/// Internal errors accumulate toward the ceiling; crossing it makes the
/// client unavailable.
#[tokio::test]
async fn internal_error_ceiling_triggers_unavailability() -> TestResult {
    let server = MockBloomd::start_with(ServerOptions {
        internal_errors: 2,
        ..ServerOptions::default()
    })
    .await?;
    let client = BloomClient::builder()
        .port(server.port())
        .reconnect_delay(Duration::from_millis(10))
        .max_errors(2)
        .build();
    let mut events = client.events();

    let first = client.create("f", &CreateOptions::new()).await;
    assert_eq!(
        first.expect_err("injected"),
        BloomError::Server("Internal Error".into())
    );
    let second = client.set("f", "k").await;
    assert_eq!(
        second.expect_err("injected"),
        BloomError::Server("Internal Error".into())
    );

    while next_event(&mut events).await? != ClientEvent::Unavailable {}
    let third = client.check("f", "k").await;
    assert_eq!(third.expect_err("ceiling crossed"), BloomError::Unavailable);
    assert_eq!(client.stats().errors, 2);
    Ok(())
}

/// Successful responses decrement the error counter, so a transient spike
/// below the ceiling self-heals.
#[tokio::test]
async fn successful_responses_heal_the_error_counter() -> TestResult {
    let server = MockBloomd::start_with(ServerOptions {
        internal_errors: 1,
        ..ServerOptions::default()
    })
    .await?;
    let client = BloomClient::builder()
        .port(server.port())
        .max_errors(2)
        .build();

    let spike = client.create("f", &CreateOptions::new()).await;
    assert!(spike.is_err());
    client.create("f", &CreateOptions::new()).await?;
    assert!(client.set("f", "k").await?);
    assert_eq!(client.stats().errors, 0);

    // server errors that are not internal never count
    let missing = client.check("nope", "k").await;
    assert!(missing.expect_err("missing filter").is_missing_filter());
    assert_eq!(client.stats().errors, 0);
    Ok(())
}
