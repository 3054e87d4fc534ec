use std::collections::HashMap;

use assert_matches::assert_matches;
use blesched::{
    BATTERY_LEVEL, BATTERY_SERVICE, ConnectFailure, ConnectTarget, ConnectionState,
    DEVICE_INFORMATION_SERVICE, ElementType, ErrorKind, EventStream, FakeBackend, FakeDevice,
    FakeLinkScript, GattClient, GattError, GattEvent, MODEL_NUMBER, OperationKind,
    SchedulerConfig, UART_RX, UART_SERVICE, Values, WriteOptions,
};
use pretty_assertions::assert_eq;
use tokio_stream::StreamExt;

const ADDRESS: &str = "AA:BB:CC:DD:EE:01";

fn script() -> FakeLinkScript {
    FakeLinkScript::builder()
        .devices(vec![FakeDevice::new(ADDRESS, Some("HRM-1"), Some(-48))])
        .reads(HashMap::from([
            (BATTERY_LEVEL, vec![100]),
            (MODEL_NUMBER, b"M-7\0".to_vec()),
        ]))
        .notifications(HashMap::from([(BATTERY_LEVEL, vec![vec![99], vec![98]])]))
        .build()
}

async fn next_matching(
    events: &mut EventStream,
    predicate: impl Fn(&GattEvent) -> bool,
) -> GattEvent {
    while let Some(event) = events.next().await {
        if predicate(&event) {
            return event;
        }
    }
    panic!("event stream ended before a matching event arrived");
}

async fn open(script: FakeLinkScript) -> (GattClient, EventStream) {
    GattClient::open(Box::new(FakeBackend::new(script)), SchedulerConfig::default())
        .await
        .expect("the fake backend should open")
}

async fn connected(script: FakeLinkScript) -> (GattClient, EventStream) {
    let (client, mut events) = open(script).await;
    client
        .start_scanning()
        .await
        .expect("scanning should start");
    next_matching(&mut events, |event| {
        matches!(event, GattEvent::DeviceFound { .. })
    })
    .await;
    client
        .connect(ConnectTarget::Index(0))
        .await
        .expect("the discovered device should resolve");
    next_matching(&mut events, |event| matches!(event, GattEvent::Connected { .. })).await;
    (client, events)
}

#[tokio::test]
async fn reads_resolve_with_decoded_values() {
    let (client, _events) = connected(script()).await;

    let battery = client
        .read(
            &BATTERY_SERVICE.to_string(),
            &BATTERY_LEVEL.to_string(),
            ElementType::UInt8,
        )
        .await
        .expect("the battery level should be readable");
    let model = client
        .read(
            &DEVICE_INFORMATION_SERVICE.to_string(),
            &MODEL_NUMBER.to_string(),
            ElementType::Utf8String,
        )
        .await
        .expect("the model number should be readable");

    assert_eq!(Values::UInt8(vec![100]), battery);
    assert_eq!(Values::Utf8(vec!["M-7".to_string()]), model);
    client.shutdown().await;
}

#[tokio::test]
async fn snapshot_reports_the_ready_link() {
    let (client, _events) = connected(script()).await;

    let snapshot = client.snapshot().await.expect("the task should be running");

    assert_eq!(ConnectionState::Ready, snapshot.state());
    assert_eq!(
        Some(ADDRESS),
        snapshot.peripheral().map(|peripheral| peripheral.address())
    );
    assert!(!snapshot.is_scanning());
    assert_eq!(0, snapshot.queued());
    assert!(!snapshot.services().is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn reads_before_connecting_are_rejected() {
    let (client, _events) = open(script()).await;

    let error = client
        .read(
            &BATTERY_SERVICE.to_string(),
            &BATTERY_LEVEL.to_string(),
            ElementType::UInt8,
        )
        .await
        .expect_err("reads without a link should fail");

    assert_eq!(GattError::NotConnected, error);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn busy_submissions_are_retried_until_accepted() {
    let script = FakeLinkScript::builder()
        .devices(vec![FakeDevice::new(ADDRESS, None, None)])
        .reads(HashMap::from([(BATTERY_LEVEL, vec![55])]))
        .busy_submissions(4)
        .build();
    let (client, _events) = connected(script).await;

    let values = client
        .read(
            &BATTERY_SERVICE.to_string(),
            &BATTERY_LEVEL.to_string(),
            ElementType::UInt8,
        )
        .await
        .expect("the read should succeed once the stack frees up");

    assert_eq!(Values::UInt8(vec![55]), values);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn a_permanently_busy_stack_times_out_the_submission() {
    let script = FakeLinkScript::builder()
        .devices(vec![FakeDevice::new(ADDRESS, None, None)])
        .busy_submissions(usize::MAX)
        .build();
    let (client, mut events) = connected(script).await;

    let error = client
        .write(
            &UART_SERVICE.to_string(),
            &UART_RX.to_string(),
            Values::UInt8(vec![1]),
            WriteOptions::default(),
        )
        .await
        .expect_err("the write should never be accepted");

    assert_matches!(
        error,
        GattError::SubmissionTimeout {
            characteristic,
            kind: OperationKind::Write,
        } if characteristic == UART_RX
    );
    let reported = next_matching(&mut events, |event| event.error_kind().is_some()).await;
    assert_eq!(Some(ErrorKind::SubmissionTimeout), reported.error_kind());
    client.shutdown().await;
}

#[tokio::test]
async fn subscriptions_stream_every_notification() {
    let (client, _events) = connected(script()).await;

    let mut subscription = client
        .subscribe(
            &BATTERY_SERVICE.to_string(),
            &BATTERY_LEVEL.to_string(),
            ElementType::UInt8,
        )
        .await
        .expect("the subscription should be accepted");

    let first = subscription
        .next()
        .await
        .expect("a first notification should arrive")
        .expect("the first notification should decode");
    let second = subscription
        .next()
        .await
        .expect("a second notification should arrive")
        .expect("the second notification should decode");

    assert_eq!(Values::UInt8(vec![99]), first);
    assert_eq!(Values::UInt8(vec![98]), second);
    client
        .unsubscribe(&BATTERY_SERVICE.to_string(), &BATTERY_LEVEL.to_string())
        .await
        .expect("unsubscribe should be accepted");
    assert_eq!(
        0,
        client
            .snapshot()
            .await
            .expect("the task should be running")
            .registered()
    );
    client.shutdown().await;
}

#[tokio::test]
async fn refused_connections_surface_as_error_events() {
    let script = FakeLinkScript::builder()
        .devices(vec![FakeDevice::new(ADDRESS, None, None)])
        .connect_failure(ConnectFailure::Refused)
        .build();
    let (client, mut events) = open(script).await;
    client
        .start_scanning()
        .await
        .expect("scanning should start");
    next_matching(&mut events, |event| {
        matches!(event, GattEvent::DeviceFound { .. })
    })
    .await;

    client
        .connect(ConnectTarget::Address(ADDRESS.to_string()))
        .await
        .expect("the address should resolve");
    let reported = next_matching(&mut events, |event| event.error_kind().is_some()).await;

    assert_eq!(Some(ErrorKind::ConnectRefused), reported.error_kind());
    client.shutdown().await;
}

#[tokio::test]
async fn unknown_characteristics_are_rejected_without_queueing() {
    let (client, _events) = connected(script()).await;

    let error = client
        .read(
            &UART_SERVICE.to_string(),
            &BATTERY_LEVEL.to_string(),
            ElementType::UInt8,
        )
        .await
        .expect_err("the battery level is not part of the UART service");

    assert_matches!(error, GattError::UnknownCharacteristic { .. });
    assert_eq!(
        0,
        client
            .snapshot()
            .await
            .expect("the task should be running")
            .queued()
    );
    client.shutdown().await;
}
