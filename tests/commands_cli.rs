use clap::Parser;
use clap::error::ErrorKind;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const BATTERY_SERVICE: &str = "0000180f-0000-1000-8000-00805f9b34fb";
const BATTERY_LEVEL: &str = "00002a19-0000-1000-8000-00805f9b34fb";
const UART_SERVICE: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";
const UART_RX: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";
const TWO_DEVICES: &str = "AA:BB:CC:DD:EE:01|HRM-1|-50;AA:BB:CC:DD:EE:02|Scale|-71";

#[derive(Debug, Default)]
struct FakeTerminalClient;

impl blesched::TerminalClient for FakeTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        false
    }

    fn stderr_is_terminal(&self) -> bool {
        false
    }
}

async fn run_with_parsed_args(args: blesched::Args) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let options = args.run_options();
    let connect_timeout = args.connect_timeout();
    let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
    let backend = match maybe_fake_args {
        Some(fake_args) => blesched::fake_backend(fake_args),
        None => blesched::real_backend(connect_timeout),
    };
    blesched::run_with_clients(command, &mut output, &FakeTerminalClient, backend, options)
        .await?;
    Ok(String::from_utf8(output)?)
}

async fn run_with_argv(argv: &[&str]) -> anyhow::Result<String> {
    let parsed_args = blesched::Args::try_parse_from(argv)?;
    run_with_parsed_args(parsed_args).await
}

fn json_lines(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line should be JSON"))
        .collect()
}

#[tokio::test]
async fn scan_lists_devices_as_json_by_default_off_a_terminal() -> anyhow::Result<()> {
    let stdout = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "scan",
        "--scan-duration",
        "20ms",
    ])
    .await?;

    assert_eq!(
        vec![json!({
            "devices": [
                { "address": "AA:BB:CC:DD:EE:01", "name": "HRM-1", "rssi": -50 },
                { "address": "AA:BB:CC:DD:EE:02", "name": "Scale", "rssi": -71 },
            ]
        })],
        json_lines(&stdout)
    );
    Ok(())
}

#[tokio::test]
async fn scan_pretty_output_lists_the_connect_index() -> anyhow::Result<()> {
    let fake = blesched::FakeArgs::builder()
        .scan_fixture(TWO_DEVICES)?
        .build();
    let args = blesched::Args::try_parse_from([
        "blesched",
        "--output",
        "pretty",
        "scan",
        "--scan-duration",
        "20ms",
    ])?
    .with_fake(fake);

    let stdout = run_with_parsed_args(args).await?;

    assert_snapshot!(stdout.trim_end(), @r"
    Discovered devices (2):
    ╭───┬───────────────────┬───────┬─────────╮
    │ # │ address           │ name  │ rssi    │
    ├───┼───────────────────┼───────┼─────────┤
    │ 0 │ AA:BB:CC:DD:EE:01 │ HRM-1 │ -50 dBm │
    │ 1 │ AA:BB:CC:DD:EE:02 │ Scale │ -71 dBm │
    ╰───┴───────────────────┴───────┴─────────╯
    ");
    Ok(())
}

#[tokio::test]
async fn scan_applies_the_name_filter() -> anyhow::Result<()> {
    let stdout = run_with_argv(&[
        "blesched",
        "--name-filter",
        "HRM",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "scan",
        "--scan-duration",
        "20ms",
    ])
    .await?;

    let lines = json_lines(&stdout);
    let devices = lines[0]["devices"]
        .as_array()
        .expect("devices should be an array");
    assert_eq!(1, devices.len());
    assert_eq!("HRM-1", devices[0]["name"]);
    Ok(())
}

#[tokio::test]
async fn read_decodes_the_fixture_value() -> anyhow::Result<()> {
    let fake_read = format!("{BATTERY_LEVEL}=010203");
    let stdout = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "--fake-read",
        &fake_read,
        "read",
        "--device",
        "AA:BB:CC:DD:EE:02",
        "--service",
        BATTERY_SERVICE,
        "--characteristic",
        BATTERY_LEVEL,
    ])
    .await?;

    assert_eq!(
        vec![json!({
            "peripheral": { "address": "AA:BB:CC:DD:EE:02", "name": "Scale", "rssi": -71 },
            "service": BATTERY_SERVICE,
            "characteristic": BATTERY_LEVEL,
            "values": { "type": "uint8", "values": [1, 2, 3] },
        })],
        json_lines(&stdout)
    );
    Ok(())
}

#[tokio::test]
async fn read_pretty_output_shows_typed_values() -> anyhow::Result<()> {
    let fake_read = format!("{BATTERY_LEVEL}=FEFF");
    let stdout = run_with_argv(&[
        "blesched",
        "--output",
        "pretty",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "--fake-read",
        &fake_read,
        "read",
        "--service",
        BATTERY_SERVICE,
        "--characteristic",
        BATTERY_LEVEL,
        "--type",
        "int16",
    ])
    .await?;

    assert_snapshot!(stdout.trim_end(), @r"
    Connected device:
    ╭─────────┬───────────────────╮
    │ field   │ value             │
    ├─────────┼───────────────────┤
    │ address │ AA:BB:CC:DD:EE:01 │
    │ name    │ HRM-1             │
    │ rssi    │ -50 dBm           │
    ╰─────────┴───────────────────╯

    Read:
    ╭────────────────┬──────────────────────────────────────╮
    │ field          │ value                                │
    ├────────────────┼──────────────────────────────────────┤
    │ service        │ 0000180f-0000-1000-8000-00805f9b34fb │
    │ characteristic │ 00002a19-0000-1000-8000-00805f9b34fb │
    │ type           │ int16                                │
    │ values         │ [-2]                                 │
    ╰────────────────┴──────────────────────────────────────╯
    ");
    Ok(())
}

#[tokio::test]
async fn read_rejects_malformed_uuids() {
    let error = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "read",
        "--service",
        "180f",
        "--characteristic",
        BATTERY_LEVEL,
    ])
    .await
    .expect_err("a short service UUID should be rejected");

    assert_eq!(
        Some(&blesched::GattError::InvalidUuidFormat {
            uuid: "180f".to_string()
        }),
        error.downcast_ref::<blesched::GattError>()
    );
}

#[tokio::test]
async fn read_reports_devices_that_never_advertise() {
    let error = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "read",
        "--device",
        "FF:FF:FF:FF:FF:FF",
        "--scan-duration",
        "20ms",
        "--service",
        BATTERY_SERVICE,
        "--characteristic",
        BATTERY_LEVEL,
    ])
    .await
    .expect_err("an unknown address should not be found");

    assert_eq!(
        "no device matching `FF:FF:FF:FF:FF:FF` was found within 20ms",
        error.to_string()
    );
}

#[tokio::test]
async fn write_reports_the_mode_and_values() -> anyhow::Result<()> {
    let stdout = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "write",
        "--service",
        UART_SERVICE,
        "--characteristic",
        UART_RX,
        "--type",
        "int8",
        "--without-response",
        "-1",
        "7",
    ])
    .await?;

    let lines = json_lines(&stdout);
    assert_eq!(1, lines.len());
    assert_eq!("without_response", lines[0]["mode"]);
    assert_eq!(json!({ "type": "int8", "values": [-1, 7] }), lines[0]["values"]);
    Ok(())
}

#[tokio::test]
async fn write_rejects_values_outside_the_element_type() {
    let error = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "write",
        "--service",
        UART_SERVICE,
        "--characteristic",
        UART_RX,
        "--type",
        "uint16",
        "70000",
    ])
    .await
    .expect_err("70000 should not fit in uint16");

    assert_eq!("value 70000 does not fit in `uint16`", error.to_string());
}

#[tokio::test]
async fn write_rejects_unparseable_values() {
    let error = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "write",
        "--service",
        UART_SERVICE,
        "--characteristic",
        UART_RX,
        "--type",
        "float32",
        "warm",
    ])
    .await
    .expect_err("text should not parse as float32");

    assert_eq!("`warm` is not a valid `float32` value", error.to_string());
}

#[tokio::test]
async fn subscribe_prints_notifications_until_the_limit() -> anyhow::Result<()> {
    let fake_notify = format!("{BATTERY_LEVEL}=63,62,61");
    let stdout = run_with_argv(&[
        "blesched",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "--fake-notify",
        &fake_notify,
        "subscribe",
        "--service",
        BATTERY_SERVICE,
        "--characteristic",
        BATTERY_LEVEL,
        "--max-notifications",
        "2",
    ])
    .await?;

    let lines = json_lines(&stdout);
    assert_eq!(
        vec![
            json!({ "index": 0, "values": { "type": "uint8", "values": [0x63] } }),
            json!({ "index": 1, "values": { "type": "uint8", "values": [0x62] } }),
        ],
        lines[..2].to_vec()
    );
    assert_eq!(2, lines[2]["received"]);
    assert_eq!("reached_limit", lines[2]["stop_reason"]);
    Ok(())
}

#[tokio::test]
async fn subscribe_pretty_output_numbers_each_notification() -> anyhow::Result<()> {
    let fake_notify = format!("{BATTERY_LEVEL}=05,06");
    let stdout = run_with_argv(&[
        "blesched",
        "--output",
        "pretty",
        "--fake",
        "--fake-scan",
        TWO_DEVICES,
        "--fake-notify",
        &fake_notify,
        "subscribe",
        "--service",
        BATTERY_SERVICE,
        "--characteristic",
        BATTERY_LEVEL,
        "--max-notifications",
        "2",
    ])
    .await?;

    assert_snapshot!(stdout.trim_end(), @r"
    [0000] [5]
    [0001] [6]
    Subscription summary:
    ╭────────────────┬──────────────────────────────────────╮
    │ field          │ value                                │
    ├────────────────┼──────────────────────────────────────┤
    │ device         │ AA:BB:CC:DD:EE:01                    │
    │ characteristic │ 00002a19-0000-1000-8000-00805f9b34fb │
    │ received       │ 2                                    │
    │ stopped        │ reached notification limit           │
    ╰────────────────┴──────────────────────────────────────╯
    ");
    Ok(())
}

#[test]
fn invalid_scan_fixture_is_rejected() {
    let result = blesched::FakeArgs::builder().scan_fixture("invalid-record");
    assert!(matches!(
        result,
        Err(blesched::FixtureError::InvalidRecordFieldCount)
    ));
}

#[test]
fn fake_fixtures_require_fake_mode() {
    let error = blesched::Args::try_parse_from([
        "blesched",
        "--fake-read",
        "00002a19-0000-1000-8000-00805f9b34fb=01",
        "scan",
    ])
    .expect_err("fixtures without --fake should fail parsing");

    assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
}

#[test]
fn unknown_element_types_fail_parsing() {
    let error = blesched::Args::try_parse_from([
        "blesched",
        "read",
        "--service",
        BATTERY_SERVICE,
        "--characteristic",
        BATTERY_LEVEL,
        "--type",
        "int64",
    ])
    .expect_err("int64 is not a supported element type");

    assert_eq!(ErrorKind::ValueValidation, error.kind());
}
