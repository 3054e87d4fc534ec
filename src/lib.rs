mod app;
mod cli;
mod client;
mod codec;
mod error;
mod gatt;
mod hw;
mod telemetry;
mod terminal;
mod utils;

pub use app::{RunOptions, fake_backend, real_backend, run, run_with_clients, run_with_options};
pub use cli::{
    Args, Command, FakeArgs, LogLevel, OutputFormat, ReadArgs, ScanArgs, SubscribeArgs,
    TargetArgs, WriteArgs,
};
pub use client::{ClientSnapshot, EventStream, GattClient, Subscription};
pub use codec::{
    CodecError, ElementType, StringTermination, ValueCodec, Values, f32_to_sfloat, sfloat_to_f32,
};
pub use error::{ErrorKind, FixtureError, GattError, LinkError};
pub use gatt::{
    Completion, CompletionSink, ConnectFailure, ConnectTarget, Connection, ConnectionState,
    DeviceDirectory, DeviceFilter, DisconnectCause, DispatchQueue, ErrorMessages, ErrorReport,
    EventSender, GattEvent, GattStatus, GattTarget, LinkEvent, NotificationItem, Observation,
    Operation, OperationId, OperationKind, PendingRegistry, Peripheral, RetryPolicy, RetryTarget,
    RetryTimer, RetryTimers, SchedulerConfig, WriteOptions, WritePayload, parse_gatt_uuid,
};
pub use hw::{
    AdapterStatus, BATTERY_LEVEL, BATTERY_SERVICE, BtleplugBackend, BtleplugLink,
    CharacteristicInfo, DEVICE_INFORMATION_SERVICE, FIXTURE_SERVICE, FakeBackend, FakeDevice,
    FakeLink, FakeLinkScript, HardwareLink, LinkBackend, LinkCall, LinkEventReceiver,
    LinkEventSender, MODEL_NUMBER, NotificationFixture, NotifySetup, ScanFixture, ServiceInfo,
    UART_RX, UART_SERVICE, UART_TX, ValueFixture, WriteMode, default_services, find_characteristic,
};
pub use terminal::TerminalClient;
