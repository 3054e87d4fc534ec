use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use crate::app::RunOptions;
use crate::codec::ElementType;
use crate::error::{CliError, FixtureError};
use crate::gatt::{ConnectTarget, DeviceFilter, RetryPolicy, SchedulerConfig, WriteOptions};
use crate::hw::{FakeBackend, FakeLinkScript, NotificationFixture, ScanFixture, ValueFixture};

const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(3);

/// Command-line options for the BLE GATT scheduler tool.
#[derive(Debug, Parser)]
#[command(
    name = "blesched",
    about = "Scan, read, write and subscribe to BLE GATT characteristics."
)]
pub struct Args {
    /// Overrides `RUST_LOG` for this run.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to pretty on a terminal and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Only list devices whose advertised name contains this text.
    #[arg(long, global = true)]
    name_filter: Option<String>,
    /// First backoff delay when the BLE stack is busy (e.g. `1ms`).
    #[arg(long, global = true, value_parser = parse_duration)]
    retry_initial: Option<Duration>,
    /// Give up once the next backoff delay would exceed this (e.g. `2s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    retry_ceiling: Option<Duration>,
    /// How long the real backend waits for a link (e.g. `10s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    connect_timeout: Option<Duration>,
    /// Uses the fake BLE backend with fixture-driven discovery and values.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `address|name|rssi;...` (`-` for none).
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Fake read value as `<characteristic-uuid>=<hex>`; repeatable.
    #[arg(long, global = true, requires = "fake")]
    fake_read: Vec<ValueFixture>,
    /// Fake notifications as `<characteristic-uuid>=<hex>,<hex>,...`; repeatable.
    #[arg(long, global = true, requires = "fake")]
    fake_notify: Vec<NotificationFixture>,
    /// Number of GATT submissions the fake stack refuses as busy.
    #[arg(long, global = true, requires = "fake")]
    fake_busy: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use blesched::{Args, Command, ScanArgs};
    ///
    /// let args = Args::new(Command::Scan(ScanArgs::default()));
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output: None,
            name_filter: None,
            retry_initial: None,
            retry_ceiling: None,
            connect_timeout: None,
            fake: false,
            fake_scan: None,
            fake_read: Vec::new(),
            fake_notify: Vec::new(),
            fake_busy: None,
            command,
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            scan_fixture,
            reads,
            notifications,
            busy_submissions,
        } = fake;

        self.fake = true;
        self.fake_scan = Some(scan_fixture);
        self.fake_read = reads;
        self.fake_notify = notifications;
        self.fake_busy = Some(busy_submissions);
        self
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Builds the scheduler configuration from the global flags.
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            self.retry_initial.unwrap_or(defaults.initial_delay()),
            self.retry_ceiling.unwrap_or(defaults.ceiling()),
        );
        SchedulerConfig::builder()
            .retry(retry)
            .maybe_device_filter(self.name_filter.clone().map(DeviceFilter::name_contains))
            .build()
    }

    /// Collects the options every command run shares.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::builder()
            .config(self.scheduler_config())
            .maybe_log_level(self.log_level)
            .maybe_output(self.output)
            .build()
    }

    /// Splits parsed CLI arguments into command and optional fake-backend settings.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_read,
            fake_notify,
            fake_busy,
            command,
            ..
        } = self;

        let fake_args = if fake {
            let Some(scan_fixture) = fake_scan else {
                return Err(CliError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan_fixture,
                reads: fake_read,
                notifications: fake_notify,
                busy_submissions: fake_busy.unwrap_or_default(),
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
///
/// ```
/// use blesched::FakeArgs;
///
/// let fake = FakeArgs::builder()
///     .scan_fixture("AA:BB:CC:DD:EE:01|HRM-1|-50")?
///     .busy_submissions(2)
///     .build();
/// let _ = fake;
/// # Ok::<(), blesched::FixtureError>(())
/// ```
#[derive(Debug, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan_fixture: ScanFixture,
    #[builder(default)]
    reads: Vec<ValueFixture>,
    #[builder(default)]
    notifications: Vec<NotificationFixture>,
    #[builder(default)]
    busy_submissions: usize,
}

impl FakeArgs {
    pub(crate) fn into_backend(self) -> FakeBackend {
        let Self {
            scan_fixture,
            reads,
            notifications,
            busy_submissions,
        } = self;

        FakeBackend::new(FakeLinkScript::from_fixtures(
            &scan_fixture,
            reads,
            notifications,
            busy_submissions,
        ))
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan for advertising peripherals and list them in discovery order.
    Scan(ScanArgs),
    /// Connect to a peripheral and read one characteristic.
    Read(ReadArgs),
    /// Connect to a peripheral and write values to one characteristic.
    Write(WriteArgs),
    /// Connect to a peripheral and print notifications from one characteristic.
    Subscribe(SubscribeArgs),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Scan(_args) => "scan",
            Self::Read(_args) => "read",
            Self::Write(_args) => "write",
            Self::Subscribe(_args) => "subscribe",
        }
    }
}

/// Arguments for the `scan` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ScanArgs {
    /// How long to scan (e.g. `500ms`, `5s`).
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    scan_duration: Duration,
}

impl Default for ScanArgs {
    fn default() -> Self {
        Self {
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }
}

impl ScanArgs {
    #[must_use]
    pub fn new(scan_duration: Duration) -> Self {
        Self { scan_duration }
    }

    pub(crate) fn scan_duration(&self) -> Duration {
        self.scan_duration
    }
}

/// Selects a peripheral and one of its characteristics.
#[derive(Debug, Clone, clap::Args)]
pub struct TargetArgs {
    /// 0-based position in the scan results, or a device address.
    #[arg(long, default_value = "0")]
    device: ConnectTarget,
    /// Service UUID in `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    #[arg(long)]
    service: String,
    /// Characteristic UUID in `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    #[arg(long)]
    characteristic: String,
    /// Element type of the characteristic value.
    #[arg(long = "type", default_value = "uint8")]
    element: ElementType,
    /// Longest time to scan for the device before giving up.
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    scan_duration: Duration,
}

impl TargetArgs {
    #[must_use]
    pub fn new(
        device: ConnectTarget,
        service: impl Into<String>,
        characteristic: impl Into<String>,
        element: ElementType,
    ) -> Self {
        Self {
            device,
            service: service.into(),
            characteristic: characteristic.into(),
            element,
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }

    #[must_use]
    pub fn with_scan_duration(mut self, scan_duration: Duration) -> Self {
        self.scan_duration = scan_duration;
        self
    }

    pub(crate) fn device(&self) -> &ConnectTarget {
        &self.device
    }

    pub(crate) fn service(&self) -> &str {
        &self.service
    }

    pub(crate) fn characteristic(&self) -> &str {
        &self.characteristic
    }

    pub(crate) fn element(&self) -> ElementType {
        self.element
    }

    pub(crate) fn scan_duration(&self) -> Duration {
        self.scan_duration
    }
}

/// Arguments for the `read` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ReadArgs {
    #[command(flatten)]
    target: TargetArgs,
}

impl ReadArgs {
    #[must_use]
    pub fn new(target: TargetArgs) -> Self {
        Self { target }
    }

    pub(crate) fn target(&self) -> &TargetArgs {
        &self.target
    }
}

/// Arguments for the `write` command.
#[derive(Debug, Clone, clap::Args)]
pub struct WriteArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Values to write, parsed according to `--type`.
    #[arg(required = true, allow_negative_numbers = true)]
    values: Vec<String>,
    /// Write without waiting for a response from the peripheral.
    #[arg(long)]
    without_response: bool,
    /// Terminate the last string as well as separating strings.
    #[arg(long)]
    terminate: bool,
}

impl WriteArgs {
    #[must_use]
    pub fn new(target: TargetArgs, values: Vec<String>) -> Self {
        Self {
            target,
            values,
            without_response: false,
            terminate: false,
        }
    }

    pub(crate) fn target(&self) -> &TargetArgs {
        &self.target
    }

    pub(crate) fn values(&self) -> &[String] {
        &self.values
    }

    pub(crate) fn write_options(&self) -> WriteOptions {
        let mut options = WriteOptions::default();
        if self.without_response {
            options = options.without_response();
        }
        if self.terminate {
            options = options.terminated();
        }
        options
    }
}

/// Arguments for the `subscribe` command.
#[derive(Debug, Clone, clap::Args)]
pub struct SubscribeArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Stop after this many notifications. If omitted, listen until Ctrl+C.
    #[arg(long)]
    max_notifications: Option<usize>,
}

impl SubscribeArgs {
    #[must_use]
    pub fn new(target: TargetArgs, max_notifications: Option<usize>) -> Self {
        Self {
            target,
            max_notifications,
        }
    }

    pub(crate) fn target(&self) -> &TargetArgs {
        &self.target
    }

    pub(crate) fn max_notifications(&self) -> Option<usize> {
        self.max_notifications
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
