use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use bon::Builder;
use btleplug::api::bleuuid::uuid_from_u16;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::link::{
    AdapterStatus, HardwareLink, LinkBackend, LinkEventSender, NotifySetup, WriteMode,
};
use super::model::{CharacteristicInfo, ServiceInfo, find_characteristic};
use crate::error::{FixtureError, LinkError};
use crate::gatt::{ConnectFailure, DisconnectCause, GattStatus, GattTarget, LinkEvent};

/// Battery service (0x180F).
pub const BATTERY_SERVICE: Uuid = uuid_from_u16(0x180F);
/// Battery level characteristic (0x2A19): read and notify.
pub const BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);
/// Device information service (0x180A).
pub const DEVICE_INFORMATION_SERVICE: Uuid = uuid_from_u16(0x180A);
/// Model number string characteristic (0x2A24): read only.
pub const MODEL_NUMBER: Uuid = uuid_from_u16(0x2A24);
/// UART-style service carrying a write and a notify characteristic.
pub const UART_SERVICE: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);
/// UART receive characteristic: write and write-without-response.
pub const UART_RX: Uuid = Uuid::from_u128(0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e);
/// UART transmit characteristic: notify with a configuration descriptor.
pub const UART_TX: Uuid = Uuid::from_u128(0x6e40_0003_b5a3_f393_e0a9_e50e_24dc_ca9e);
/// Service holding fixture characteristics that no default service declares.
pub const FIXTURE_SERVICE: Uuid = uuid_from_u16(0xFFE0);

/// A scripted advertising peripheral.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FakeDevice {
    address: String,
    name: Option<String>,
    rssi: Option<i16>,
}

impl FakeDevice {
    #[must_use]
    pub fn new(address: impl Into<String>, name: Option<&str>, rssi: Option<i16>) -> Self {
        Self {
            address: address.into(),
            name: name.map(str::to_string),
            rssi,
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Parsed `--fake-scan` fixture: `address|name|rssi;...`, with `-` for a
/// missing name or RSSI.
#[derive(Debug, Clone)]
pub struct ScanFixture {
    devices: Vec<FakeDevice>,
}

impl ScanFixture {
    #[must_use]
    pub fn devices(&self) -> &[FakeDevice] {
        &self.devices
    }
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(FixtureError::EmptyFixture);
        }
        let devices = value
            .split(';')
            .map(parse_scan_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { devices })
    }
}

/// Parsed `<uuid>=<hex>` read fixture.
#[derive(Debug, Clone)]
pub struct ValueFixture {
    characteristic: Uuid,
    value: Vec<u8>,
}

impl FromStr for ValueFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (characteristic, payload) = split_characteristic(value)?;
        Ok(Self {
            characteristic,
            value: parse_hex(payload)?,
        })
    }
}

/// Parsed `<uuid>=<hex>,<hex>,...` notification fixture.
#[derive(Debug, Clone)]
pub struct NotificationFixture {
    characteristic: Uuid,
    values: Vec<Vec<u8>>,
}

impl FromStr for NotificationFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (characteristic, payloads) = split_characteristic(value)?;
        let values = if payloads.trim().is_empty() {
            Vec::new()
        } else {
            payloads.split(',').map(parse_hex).collect::<Result<_, _>>()?
        };
        Ok(Self {
            characteristic,
            values,
        })
    }
}

/// Everything a [`FakeLink`] answers with.
#[derive(Debug, Clone, Builder)]
pub struct FakeLinkScript {
    #[builder(default)]
    devices: Vec<FakeDevice>,
    #[builder(default = default_services())]
    services: Vec<ServiceInfo>,
    #[builder(default)]
    reads: HashMap<Uuid, Vec<u8>>,
    #[builder(default)]
    notifications: HashMap<Uuid, Vec<Vec<u8>>>,
    /// Number of GATT submissions refused as busy before any is accepted.
    #[builder(default)]
    busy_submissions: usize,
    connect_failure: Option<ConnectFailure>,
    #[builder(default = AdapterStatus::Ready)]
    adapter_status: AdapterStatus,
}

impl Default for FakeLinkScript {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FakeLinkScript {
    /// Builds a script from parsed CLI fixtures, declaring any fixture
    /// characteristic the default services lack under [`FIXTURE_SERVICE`].
    #[must_use]
    pub fn from_fixtures(
        scan: &ScanFixture,
        reads: Vec<ValueFixture>,
        notifications: Vec<NotificationFixture>,
        busy_submissions: usize,
    ) -> Self {
        let reads: HashMap<Uuid, Vec<u8>> = reads
            .into_iter()
            .map(|fixture| (fixture.characteristic, fixture.value))
            .collect();
        let notifications: HashMap<Uuid, Vec<Vec<u8>>> = notifications
            .into_iter()
            .map(|fixture| (fixture.characteristic, fixture.values))
            .collect();

        let mut services = default_services();
        let mut extra = Vec::new();
        for characteristic in reads.keys().chain(notifications.keys()) {
            let declared = services.iter().any(|service| {
                service
                    .characteristics()
                    .iter()
                    .any(|candidate| candidate.uuid() == *characteristic)
            });
            if !declared && !extra.contains(characteristic) {
                extra.push(*characteristic);
            }
        }
        if !extra.is_empty() {
            let mut fixture_service = ServiceInfo::new(FIXTURE_SERVICE, true, Vec::new());
            fixture_service.characteristics_mut().extend(extra.into_iter().map(|uuid| {
                CharacteristicInfo::new(uuid, labels(&["read", "write", "notify"]))
                    .with_notify_descriptor(true)
            }));
            services.push(fixture_service);
        }

        Self::builder()
            .devices(scan.devices().to_vec())
            .services(services)
            .reads(reads)
            .notifications(notifications)
            .busy_submissions(busy_submissions)
            .build()
    }
}

/// A hardware call the fake link accepted or refused.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LinkCall {
    StartScan,
    StopScan,
    Connect(String),
    Disconnect,
    DiscoverServices,
    Read(GattTarget),
    Write {
        target: GattTarget,
        payload: Vec<u8>,
        mode: WriteMode,
    },
    EnableNotifications(GattTarget),
    DisableNotifications(GattTarget),
}

impl LinkCall {
    /// Returns whether the call occupies the stack's single GATT slot.
    #[must_use]
    pub fn is_gatt_submission(&self) -> bool {
        matches!(
            self,
            Self::Read(_) | Self::Write { .. } | Self::EnableNotifications(_)
        )
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum FakeLinkState {
    Down,
    Connecting,
    Up,
}

/// Scripted [`HardwareLink`] that records every call.
///
/// Without a responder it only records, so tests drive the completions
/// themselves. A submission that expects a callback then stays outstanding
/// until [`FakeLink::complete_outstanding`], and any GATT submission accepted
/// meanwhile is recorded as an overlap. With a responder it answers every
/// accepted call on the event channel the way a peripheral following the
/// script would.
#[derive(Debug)]
pub struct FakeLink {
    script: FakeLinkScript,
    responder: Option<LinkEventSender>,
    calls: Vec<LinkCall>,
    refused: Vec<LinkCall>,
    busy_remaining: usize,
    link_state: FakeLinkState,
    written: HashMap<Uuid, Vec<u8>>,
    outstanding: Option<LinkCall>,
    overlaps: Vec<(LinkCall, LinkCall)>,
}

impl FakeLink {
    /// Creates a recording-only link.
    #[must_use]
    pub fn new(script: FakeLinkScript) -> Self {
        let busy_remaining = script.busy_submissions;
        Self {
            script,
            responder: None,
            calls: Vec::new(),
            refused: Vec::new(),
            busy_remaining,
            link_state: FakeLinkState::Down,
            written: HashMap::new(),
            outstanding: None,
            overlaps: Vec::new(),
        }
    }

    /// Creates a link that answers on `events`.
    #[must_use]
    pub fn with_responder(script: FakeLinkScript, events: LinkEventSender) -> Self {
        let mut link = Self::new(script);
        link.responder = Some(events);
        link
    }

    /// Returns the accepted calls in order.
    #[must_use]
    pub fn calls(&self) -> &[LinkCall] {
        &self.calls
    }

    /// Returns the calls refused as busy, in order.
    #[must_use]
    pub fn refused(&self) -> &[LinkCall] {
        &self.refused
    }

    /// Returns the number of accepted GATT submissions.
    #[must_use]
    pub fn gatt_submissions(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| call.is_gatt_submission())
            .count()
    }

    /// Returns every submission accepted while another still awaited its
    /// callback, as `(outstanding, overlapping)` pairs.
    #[must_use]
    pub fn overlapping_submissions(&self) -> &[(LinkCall, LinkCall)] {
        &self.overlaps
    }

    /// Releases the submission awaiting its callback and returns it.
    pub fn complete_outstanding(&mut self) -> Option<LinkCall> {
        self.outstanding.take()
    }

    /// Refuses the next `count` GATT submissions as busy.
    pub fn set_busy_submissions(&mut self, count: usize) {
        self.busy_remaining = count;
    }

    /// Returns the last payload written to a characteristic.
    #[must_use]
    pub fn last_written(&self, characteristic: &Uuid) -> Option<&[u8]> {
        self.written.get(characteristic).map(Vec::as_slice)
    }

    /// Returns the scripted service snapshot.
    #[must_use]
    pub fn services(&self) -> &[ServiceInfo] {
        &self.script.services
    }

    fn respond(&self, event: LinkEvent) {
        if let Some(responder) = &self.responder
            && responder.send(event).is_err()
        {
            trace!("fake link responder has no receiver");
        }
    }

    fn admit(&mut self, call: LinkCall, awaits_callback: bool) -> Result<(), LinkError> {
        if self.link_state != FakeLinkState::Up {
            return Err(LinkError::NotConnected);
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            debug!(?call, "fake link refusing submission as busy");
            self.refused.push(call);
            return Err(LinkError::Busy);
        }
        if let Some(outstanding) = &self.outstanding {
            warn!(?outstanding, ?call, "fake link accepted an overlapping submission");
            self.overlaps.push((outstanding.clone(), call.clone()));
        }
        // A responder answers at once, so nothing stays outstanding.
        if awaits_callback && self.responder.is_none() {
            self.outstanding = Some(call.clone());
        }
        self.calls.push(call);
        Ok(())
    }

    fn characteristic(&self, target: &GattTarget) -> Result<&CharacteristicInfo, LinkError> {
        find_characteristic(
            &self.script.services,
            &target.service(),
            &target.characteristic(),
        )
        .ok_or(LinkError::UnknownCharacteristic { target: *target })
    }
}

impl HardwareLink for FakeLink {
    fn adapter_status(&self) -> AdapterStatus {
        self.script.adapter_status
    }

    fn start_scan(&mut self) -> Result<(), LinkError> {
        self.calls.push(LinkCall::StartScan);
        for device in &self.script.devices {
            self.respond(LinkEvent::Advertisement {
                address: device.address.clone(),
                name: device.name.clone(),
                rssi: device.rssi,
            });
        }
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), LinkError> {
        self.calls.push(LinkCall::StopScan);
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<(), LinkError> {
        self.calls.push(LinkCall::Connect(address.to_string()));
        self.outstanding = None;
        match self.script.connect_failure {
            Some(failure) => {
                self.link_state = FakeLinkState::Down;
                self.respond(LinkEvent::ConnectFailed(failure));
            }
            None => {
                self.link_state = FakeLinkState::Connecting;
                self.respond(LinkEvent::Connected);
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        if self.link_state == FakeLinkState::Down {
            return Err(LinkError::NotConnected);
        }
        self.calls.push(LinkCall::Disconnect);
        self.link_state = FakeLinkState::Down;
        self.outstanding = None;
        self.respond(LinkEvent::Disconnected(DisconnectCause::Requested));
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), LinkError> {
        if self.link_state == FakeLinkState::Down {
            return Err(LinkError::NotConnected);
        }
        self.calls.push(LinkCall::DiscoverServices);
        self.link_state = FakeLinkState::Up;
        self.respond(LinkEvent::ServicesDiscovered(self.script.services.clone()));
        Ok(())
    }

    fn read(&mut self, target: &GattTarget) -> Result<(), LinkError> {
        self.characteristic(target)?;
        self.admit(LinkCall::Read(*target), true)?;
        let characteristic = target.characteristic();
        let (value, status) = match self.script.reads.get(&characteristic) {
            Some(value) => (value.clone(), GattStatus::Success),
            None => (
                Vec::new(),
                GattStatus::Failure("no scripted value".to_string()),
            ),
        };
        self.respond(LinkEvent::CharacteristicRead {
            characteristic,
            value,
            status,
        });
        Ok(())
    }

    fn write(
        &mut self,
        target: &GattTarget,
        payload: &[u8],
        mode: WriteMode,
    ) -> Result<(), LinkError> {
        self.characteristic(target)?;
        self.admit(
            LinkCall::Write {
                target: *target,
                payload: payload.to_vec(),
                mode,
            },
            true,
        )?;
        self.written
            .insert(target.characteristic(), payload.to_vec());
        self.respond(LinkEvent::CharacteristicWrite {
            characteristic: target.characteristic(),
            status: GattStatus::Success,
        });
        Ok(())
    }

    fn enable_notifications(&mut self, target: &GattTarget) -> Result<NotifySetup, LinkError> {
        let has_descriptor = self.characteristic(target)?.has_notify_descriptor();
        self.admit(LinkCall::EnableNotifications(*target), has_descriptor)?;
        let characteristic = target.characteristic();
        if has_descriptor {
            self.respond(LinkEvent::DescriptorWrite {
                characteristic,
                status: GattStatus::Success,
            });
        }
        let scripted = self
            .script
            .notifications
            .get(&characteristic)
            .cloned()
            .unwrap_or_default();
        for value in scripted {
            self.respond(LinkEvent::CharacteristicChanged {
                characteristic,
                value,
            });
        }
        Ok(if has_descriptor {
            NotifySetup::DescriptorWritePending
        } else {
            NotifySetup::NoDescriptor
        })
    }

    fn disable_notifications(&mut self, target: &GattTarget) -> Result<(), LinkError> {
        self.characteristic(target)?;
        if self.link_state != FakeLinkState::Up {
            return Err(LinkError::NotConnected);
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            self.refused.push(LinkCall::DisableNotifications(*target));
            return Err(LinkError::Busy);
        }
        self.calls.push(LinkCall::DisableNotifications(*target));
        Ok(())
    }
}

/// Opens a responding [`FakeLink`].
#[derive(Debug, Default)]
pub struct FakeBackend {
    script: FakeLinkScript,
}

impl FakeBackend {
    #[must_use]
    pub fn new(script: FakeLinkScript) -> Self {
        Self { script }
    }
}

#[async_trait]
impl LinkBackend for FakeBackend {
    async fn open(
        self: Box<Self>,
        events: LinkEventSender,
    ) -> Result<Box<dyn HardwareLink>, LinkError> {
        info!("using fake BLE backend");
        Ok(Box::new(FakeLink::with_responder(self.script, events)))
    }
}

/// The services every scripted peripheral offers.
#[must_use]
pub fn default_services() -> Vec<ServiceInfo> {
    vec![
        ServiceInfo::new(
            BATTERY_SERVICE,
            true,
            vec![
                CharacteristicInfo::new(BATTERY_LEVEL, labels(&["read", "notify"]))
                    .with_notify_descriptor(true),
            ],
        ),
        ServiceInfo::new(
            DEVICE_INFORMATION_SERVICE,
            true,
            vec![CharacteristicInfo::new(MODEL_NUMBER, labels(&["read"]))],
        ),
        ServiceInfo::new(
            UART_SERVICE,
            true,
            vec![
                CharacteristicInfo::new(
                    UART_RX,
                    labels(&["write", "write_without_response"]),
                ),
                CharacteristicInfo::new(UART_TX, labels(&["notify"])).with_notify_descriptor(true),
            ],
        ),
    ]
}

fn labels(properties: &[&str]) -> Vec<String> {
    properties.iter().map(|label| (*label).to_string()).collect()
}

fn parse_scan_record(raw_record: &str) -> Result<FakeDevice, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    let [address, name, rssi] = fields.as_slice() else {
        return Err(FixtureError::InvalidRecordFieldCount);
    };
    if address.is_empty() {
        return Err(FixtureError::EmptyAddress);
    }
    let name = (!name.is_empty() && *name != "-").then_some(*name);
    let rssi = match *rssi {
        "" | "-" => None,
        value => Some(value.parse::<i16>()?),
    };
    Ok(FakeDevice::new(*address, name, rssi))
}

fn split_characteristic(raw: &str) -> Result<(Uuid, &str), FixtureError> {
    let Some((characteristic, payload)) = raw.split_once('=') else {
        return Err(FixtureError::MissingCharacteristic {
            record: raw.to_string(),
        });
    };
    let characteristic = characteristic.trim();
    let uuid = Uuid::parse_str(characteristic).map_err(|_error| {
        FixtureError::InvalidCharacteristic {
            uuid: characteristic.to_string(),
        }
    })?;
    Ok((uuid, payload))
}

fn parse_hex(raw_value: &str) -> Result<Vec<u8>, FixtureError> {
    let cleaned: String = raw_value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned)?)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tokio::sync::mpsc;

    use super::*;

    fn connected(script: FakeLinkScript) -> (FakeLink, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut link = FakeLink::with_responder(script, tx);
        link.connect("AA:01").expect("connect should be accepted");
        link.discover_services()
            .expect("discovery should be accepted");
        (link, rx)
    }

    #[rstest]
    #[case::one("AA:01|Sensor|-40", 1)]
    #[case::two("AA:01|Sensor|-40;AA:02|-|-", 2)]
    fn scan_fixture_parses_records(#[case] fixture: &str, #[case] expected: usize) {
        let parsed: ScanFixture = fixture.parse().expect("fixture should parse");
        assert_eq!(expected, parsed.devices().len());
    }

    #[test]
    fn scan_fixture_dashes_mean_missing() {
        let parsed: ScanFixture = "AA:02|-|-".parse().expect("fixture should parse");
        assert_eq!(FakeDevice::new("AA:02", None, None), parsed.devices()[0]);
    }

    #[rstest]
    #[case::empty("", "empty")]
    #[case::field_count("AA:01|Sensor", "field_count")]
    #[case::bad_rssi("AA:01|Sensor|loud", "rssi")]
    #[case::no_address("|Sensor|-40", "address")]
    fn scan_fixture_rejects_malformed_records(#[case] fixture: &str, #[case] expected: &str) {
        let error = fixture
            .parse::<ScanFixture>()
            .expect_err("fixture should be rejected");
        match expected {
            "empty" => assert_matches!(error, FixtureError::EmptyFixture),
            "field_count" => assert_matches!(error, FixtureError::InvalidRecordFieldCount),
            "rssi" => assert_matches!(error, FixtureError::InvalidRssi(_)),
            _ => assert_matches!(error, FixtureError::EmptyAddress),
        }
    }

    #[test]
    fn value_fixture_parses_uuid_and_hex() {
        let fixture: ValueFixture = "00002a19-0000-1000-8000-00805f9b34fb=01 02 03"
            .parse()
            .expect("fixture should parse");

        assert_eq!(BATTERY_LEVEL, fixture.characteristic);
        assert_eq!(vec![1, 2, 3], fixture.value);
    }

    #[rstest]
    #[case::missing_separator("00002a19-0000-1000-8000-00805f9b34fb")]
    #[case::bad_uuid("battery=01")]
    #[case::odd_hex("00002a19-0000-1000-8000-00805f9b34fb=012")]
    fn value_fixture_rejects_malformed_input(#[case] fixture: &str) {
        assert!(fixture.parse::<ValueFixture>().is_err());
    }

    #[test]
    fn notification_fixture_splits_payloads() {
        let fixture: NotificationFixture = "6e400003-b5a3-f393-e0a9-e50e24dcca9e=01,0203"
            .parse()
            .expect("fixture should parse");

        assert_eq!(vec![vec![1], vec![2, 3]], fixture.values);
    }

    #[test]
    fn unknown_fixture_characteristics_get_a_fixture_service() {
        let scan: ScanFixture = "AA:01|Sensor|-40".parse().expect("fixture should parse");
        let custom = Uuid::from_u128(0xABCD);
        let reads = vec![
            format!("{custom}=FF")
                .parse()
                .expect("fixture should parse"),
        ];

        let script = FakeLinkScript::from_fixtures(&scan, reads, Vec::new(), 0);

        assert!(find_characteristic(&script.services, &FIXTURE_SERVICE, &custom).is_some());
        assert!(find_characteristic(&script.services, &BATTERY_SERVICE, &BATTERY_LEVEL).is_some());
    }

    #[test]
    fn scripted_read_answers_with_value() {
        let script = FakeLinkScript::builder()
            .reads(HashMap::from([(BATTERY_LEVEL, vec![0x64])]))
            .build();
        let (mut link, mut rx) = connected(script);
        while rx.try_recv().is_ok() {}

        link.read(&GattTarget::new(BATTERY_SERVICE, BATTERY_LEVEL))
            .expect("read should be accepted");

        assert_eq!(
            LinkEvent::CharacteristicRead {
                characteristic: BATTERY_LEVEL,
                value: vec![0x64],
                status: GattStatus::Success,
            },
            rx.try_recv().expect("read should be answered")
        );
    }

    #[test]
    fn busy_submissions_are_refused_then_accepted() {
        let script = FakeLinkScript::builder().busy_submissions(2).build();
        let (mut link, _rx) = connected(script);
        let target = GattTarget::new(BATTERY_SERVICE, BATTERY_LEVEL);

        assert_matches!(link.read(&target), Err(LinkError::Busy));
        assert_matches!(link.read(&target), Err(LinkError::Busy));
        assert_matches!(link.read(&target), Ok(()));
        assert_eq!(2, link.refused().len());
        assert_eq!(1, link.gatt_submissions());
    }

    #[test]
    fn recording_links_flag_submissions_that_overlap_an_outstanding_one() {
        let mut link = FakeLink::new(FakeLinkScript::default());
        link.connect("AA:01").expect("connect should be accepted");
        link.discover_services()
            .expect("discovery should be accepted");
        let battery = GattTarget::new(BATTERY_SERVICE, BATTERY_LEVEL);

        link.read(&battery).expect("read should be accepted");
        link.read(&battery).expect("the stack should accept the second read");

        assert_eq!(
            vec![(LinkCall::Read(battery), LinkCall::Read(battery))],
            link.overlapping_submissions()
        );
        assert_eq!(Some(LinkCall::Read(battery)), link.complete_outstanding());
        assert_eq!(None, link.complete_outstanding());
    }

    #[test]
    fn notify_setup_without_a_descriptor_leaves_nothing_outstanding() {
        let services = vec![ServiceInfo::new(
            BATTERY_SERVICE,
            true,
            vec![CharacteristicInfo::new(BATTERY_LEVEL, labels(&["read", "notify"]))],
        )];
        let mut link = FakeLink::new(FakeLinkScript::builder().services(services).build());
        link.connect("AA:01").expect("connect should be accepted");
        link.discover_services()
            .expect("discovery should be accepted");
        let battery = GattTarget::new(BATTERY_SERVICE, BATTERY_LEVEL);

        assert_matches!(
            link.enable_notifications(&battery),
            Ok(NotifySetup::NoDescriptor)
        );
        link.read(&battery).expect("read should be accepted");

        assert!(link.overlapping_submissions().is_empty());
    }

    #[test]
    fn gatt_calls_require_a_discovered_link() {
        let mut link = FakeLink::new(FakeLinkScript::default());

        assert_matches!(
            link.read(&GattTarget::new(BATTERY_SERVICE, BATTERY_LEVEL)),
            Err(LinkError::NotConnected)
        );
        assert_matches!(link.disconnect(), Err(LinkError::NotConnected));
    }

    #[test]
    fn unknown_characteristic_is_reported_by_the_link() {
        let (mut link, _rx) = connected(FakeLinkScript::default());

        assert_matches!(
            link.read(&GattTarget::new(BATTERY_SERVICE, MODEL_NUMBER)),
            Err(LinkError::UnknownCharacteristic { .. })
        );
    }

    #[test]
    fn scripted_connect_failure_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let script = FakeLinkScript::builder()
            .connect_failure(ConnectFailure::Refused)
            .build();
        let mut link = FakeLink::with_responder(script, tx);

        link.connect("AA:01").expect("connect should be accepted");

        assert_eq!(
            LinkEvent::ConnectFailed(ConnectFailure::Refused),
            rx.try_recv().expect("failure should be reported")
        );
    }
}
