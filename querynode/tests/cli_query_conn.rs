//! End-to-end tests: a real querynode process driven through the harness
//!
//! Each test owns its fixture; the node is stopped and the work dir removed
//! when the fixture drops, whether the test passes or fails.

mod common;

use assert_matches::assert_matches;
use harness::{FixtureState, HarnessError, NodeStatusClient, Phase, TestServiceClient};
use shared::testdata::{EchoRequest, SayHelloRequest, ECHO_METHOD, TEST_SERVICE};
use shared::StatusCode;
use std::time::Duration;

use common::{node_config, started_fixture};

#[tokio::test]
async fn test_echo_round_trip() {
    println!("🧪 Echo through a live node");
    let mut fixture = started_fixture(node_config().build()).await;
    let client = TestServiceClient::new(fixture.query_conn().await.unwrap());

    let reply = client
        .echo(&EchoRequest {
            message: "hello".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(reply.message, "hello");

    let empty = client.echo(&EchoRequest { message: String::new() }).await.unwrap();
    assert_eq!(empty.message, "");
}

#[tokio::test]
async fn test_say_hello() {
    let mut fixture = started_fixture(node_config().build()).await;
    let client = TestServiceClient::new(fixture.query_conn().await.unwrap());

    let reply = client
        .say_hello(&SayHelloRequest {
            name: "harness".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(reply.greeting, "Hello harness!");
}

#[tokio::test]
async fn test_remote_failures_keep_the_session_usable() {
    let mut fixture = started_fixture(node_config().build()).await;
    let conn = fixture.query_conn().await.unwrap();

    let unknown_service = conn.invoke("missing.Service", "Call", vec![]).await.unwrap_err();
    assert_eq!(unknown_service.remote_code(), Some(StatusCode::NotFound));

    let unknown_method = conn.invoke(TEST_SERVICE, "Shout", vec![]).await.unwrap_err();
    assert_matches!(
        unknown_method,
        HarnessError::RemoteError { code: StatusCode::Unimplemented, ref method, .. } if method == "Shout"
    );

    let garbage = conn.invoke(TEST_SERVICE, ECHO_METHOD, vec![0xff]).await.unwrap_err();
    assert_eq!(garbage.remote_code(), Some(StatusCode::InvalidArgument));
    assert_eq!(garbage.phase(), Phase::Call);

    let client = TestServiceClient::new(conn);
    let reply = client.echo(&EchoRequest { message: "still here".to_string() }).await.unwrap();
    assert_eq!(reply.message, "still here");
}

#[tokio::test]
async fn test_query_conn_is_reused_until_closed() {
    let mut fixture = started_fixture(node_config().build()).await;

    let first = fixture.query_conn().await.unwrap();
    let second = fixture.query_conn().await.unwrap();
    assert!(first.same_session(&second));

    first.close().unwrap();
    first.close().unwrap();
    assert_matches!(
        second.invoke(TEST_SERVICE, ECHO_METHOD, vec![]).await,
        Err(HarnessError::Closed)
    );

    let reopened = fixture.query_conn().await.unwrap();
    assert!(!reopened.same_session(&first));
    let reply = TestServiceClient::new(reopened)
        .echo(&EchoRequest { message: "again".to_string() })
        .await
        .unwrap();
    assert_eq!(reply.message, "again");
}

#[tokio::test]
async fn test_status_reports_own_home() {
    let mut fixture = started_fixture(node_config().moniker("solo").build()).await;
    let status = NodeStatusClient::new(fixture.query_conn().await.unwrap())
        .status()
        .await
        .unwrap();

    assert_eq!(status.moniker, "solo");
    assert_eq!(status.chain_id, fixture.config().chain_id);
    assert_eq!(status.home, fixture.home().display().to_string());
}

#[tokio::test]
async fn test_concurrent_fixtures_are_isolated() {
    let (mut a, mut b) = tokio::join!(
        started_fixture(node_config().moniker("a").build()),
        started_fixture(node_config().moniker("b").build()),
    );
    assert_ne!(a.query_addr(), b.query_addr());
    assert_ne!(a.work_dir(), b.work_dir());

    let status_a = NodeStatusClient::new(a.query_conn().await.unwrap()).status().await.unwrap();
    let status_b = NodeStatusClient::new(b.query_conn().await.unwrap()).status().await.unwrap();

    assert_eq!(status_a.moniker, "a");
    assert_eq!(status_b.moniker, "b");
    assert_eq!(status_a.home, a.home().display().to_string());
    assert_eq!(status_b.home, b.home().display().to_string());
}

#[tokio::test]
async fn test_delayed_endpoint_becomes_ready() {
    let mut fixture = started_fixture(node_config().arg("--startup-delay-ms").arg("500").build()).await;
    assert_eq!(fixture.state(), FixtureState::Ready);

    let reply = TestServiceClient::new(fixture.query_conn().await.unwrap())
        .echo(&EchoRequest { message: "late".to_string() })
        .await
        .unwrap();
    assert_eq!(reply.message, "late");
}

#[tokio::test]
async fn test_teardown_stops_node_and_removes_work_dir() {
    let mut fixture = started_fixture(node_config().build()).await;
    let conn = fixture.query_conn().await.unwrap();
    let pid = fixture.node().map(|node| node.pid).unwrap();
    let work_dir = fixture.work_dir().to_path_buf();

    let report = fixture.teardown();

    assert!(report.is_clean(), "cleanup failures: {:?}", report.failures);
    assert!(report.ran[0].starts_with("close query connection"));
    assert!(report.ran[1].starts_with("stop node"));
    assert!(conn.is_closed());
    assert!(!work_dir.exists());
    #[cfg(unix)]
    assert!(common::pid_is_gone(pid));
    let _ = pid;
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_setup() {
    let config = node_config()
        .ready_timeout(Duration::from_secs(1))
        .arg("--no-listen")
        .build();
    let mut fixture = harness::Fixture::new(config).unwrap();
    let work_dir = fixture.work_dir().to_path_buf();

    let err = fixture.start().await.unwrap_err();

    let pid = match err {
        HarnessError::NotReady { pid: Some(pid), .. } => pid,
        other => panic!("expected NotReady, got {other:?}"),
    };
    assert_eq!(fixture.state(), FixtureState::TornDown);
    assert!(!work_dir.exists());
    #[cfg(unix)]
    assert!(common::pid_is_gone(pid));
    let _ = pid;
}

#[tokio::test]
async fn test_uninitialized_home_fails_setup() {
    let mut fixture = harness::Fixture::new(node_config().skip_init().build()).unwrap();
    let work_dir = fixture.work_dir().to_path_buf();

    let err = fixture.start().await.unwrap_err();

    assert!(err.phase().is_setup(), "unexpected error: {err}");
    assert_eq!(fixture.state(), FixtureState::TornDown);
    assert!(!work_dir.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_stop_node_escalates_when_sigterm_ignored() {
    let grace = Duration::from_millis(500);
    let mut fixture = started_fixture(node_config().grace_period(grace).arg("--ignore-sigterm").build()).await;
    let pid = fixture.node().map(|node| node.pid).unwrap();

    let started = std::time::Instant::now();
    fixture.stop_node(false).unwrap();

    assert!(started.elapsed() >= grace);
    assert!(common::pid_is_gone(pid));

    // automatic cleanup still runs cleanly after the explicit stop
    assert!(fixture.teardown().is_clean());
}

#[tokio::test]
async fn test_call_after_node_stop_is_transport_error() {
    let mut fixture = started_fixture(node_config().build()).await;
    let conn = fixture.query_conn().await.unwrap();

    fixture.stop_node(false).unwrap();

    let err = conn.invoke(TEST_SERVICE, ECHO_METHOD, vec![]).await.unwrap_err();
    assert_matches!(err, HarnessError::TransportError { .. });
}

#[cfg(unix)]
#[tokio::test]
async fn test_broken_session_is_replaced() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let mut fixture = started_fixture(node_config().call_timeout(Duration::from_millis(300)).build()).await;
    let pid = Pid::from_raw(fixture.node().map(|node| node.pid).unwrap() as i32);
    let broken = fixture.query_conn().await.unwrap();

    // a paused node lets the call time out and breaks the session
    kill(pid, Signal::SIGSTOP).unwrap();
    let err = broken.invoke(TEST_SERVICE, ECHO_METHOD, vec![]).await;
    kill(pid, Signal::SIGCONT).unwrap();
    assert_matches!(err, Err(HarnessError::TransportError { .. }));
    assert!(!broken.is_usable());

    let fresh = fixture.query_conn().await.unwrap();
    assert!(!fresh.same_session(&broken));
    assert!(broken.is_closed());

    let reply = TestServiceClient::new(fresh)
        .echo(&EchoRequest { message: "recovered".to_string() })
        .await
        .unwrap();
    assert_eq!(reply.message, "recovered");
    assert!(fixture.teardown().is_clean());
}
