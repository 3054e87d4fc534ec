use std::io;
use std::time::Duration;

use anyhow::Result;
use bon::Builder;
use tracing::instrument;

use crate::cli::output::Printer;
use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::gatt::SchedulerConfig;
use crate::hw::{BtleplugBackend, LinkBackend};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};

/// Creates a backend for the platform BLE stack.
#[must_use]
pub fn real_backend(connect_timeout: Option<Duration>) -> Box<dyn LinkBackend> {
    Box::new(
        BtleplugBackend::builder()
            .maybe_connect_timeout(connect_timeout)
            .build(),
    )
}

/// Creates a backend that answers from fixtures.
#[must_use]
pub fn fake_backend(fake_args: FakeArgs) -> Box<dyn LinkBackend> {
    Box::new(fake_args.into_backend())
}

/// Settings shared by every command run.
///
/// ```
/// use blesched::{LogLevel, OutputFormat, RunOptions};
///
/// let options = RunOptions::builder()
///     .log_level(LogLevel::Debug)
///     .output(OutputFormat::Json)
///     .build();
/// assert_eq!(Some(OutputFormat::Json), options.output());
/// ```
#[derive(Debug, Clone, Default, Builder)]
pub struct RunOptions {
    #[builder(default)]
    config: SchedulerConfig,
    log_level: Option<LogLevel>,
    /// Falls back to pretty on a terminal and JSON otherwise.
    output: Option<OutputFormat>,
}

impl RunOptions {
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output(&self) -> Option<OutputFormat> {
        self.output
    }
}

/// Runs a CLI command with default options.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = blesched::Args::try_parse_from([
///     "blesched",
///     "--fake",
///     "--fake-scan",
///     "AA:BB:CC:DD:EE:01|HRM-1|-50",
///     "scan",
///     "--scan-duration",
///     "10ms",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let backend = match maybe_fake_args {
///     Some(fake_args) => blesched::fake_backend(fake_args),
///     None => blesched::real_backend(None),
/// };
/// let mut out = Vec::new();
/// blesched::run(command, &mut out, backend).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run<W>(command: Command, out: &mut W, backend: Box<dyn LinkBackend>) -> Result<()>
where
    W: io::Write,
{
    run_with_options(command, out, backend, RunOptions::default()).await
}

/// Runs a CLI command with explicit options against the process terminal.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = blesched::Args::try_parse_from([
///     "blesched",
///     "--log-level",
///     "debug",
///     "--output",
///     "json",
///     "--fake",
///     "--fake-scan",
///     "AA:BB:CC:DD:EE:01|HRM-1|-50",
///     "--fake-read",
///     "00002a19-0000-1000-8000-00805f9b34fb=64",
///     "read",
///     "--service",
///     "0000180f-0000-1000-8000-00805f9b34fb",
///     "--characteristic",
///     "00002a19-0000-1000-8000-00805f9b34fb",
/// ])?;
/// let options = args.run_options();
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let backend = match maybe_fake_args {
///     Some(fake_args) => blesched::fake_backend(fake_args),
///     None => blesched::real_backend(None),
/// };
/// let mut out = Vec::new();
/// blesched::run_with_options(command, &mut out, backend, options).await?;
/// assert!(String::from_utf8(out)?.contains("\"values\":[100]"));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run_with_options<W>(
    command: Command,
    out: &mut W,
    backend: Box<dyn LinkBackend>,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(command, out, &SystemTerminalClient, backend, options).await
}

/// Runs a CLI command with injected clients.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use blesched::{Command, FakeArgs, RunOptions, ScanArgs};
///
/// struct FakeTerminal;
/// impl blesched::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let fake = FakeArgs::builder()
///     .scan_fixture("AA:BB:CC:DD:EE:01|HRM-1|-50")?
///     .build();
/// let command = Command::Scan(ScanArgs::new(std::time::Duration::from_millis(10)));
/// let mut out = Vec::new();
/// blesched::run_with_clients(
///     command,
///     &mut out,
///     &FakeTerminal,
///     blesched::fake_backend(fake),
///     RunOptions::default(),
/// ).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
#[instrument(
    skip(out, terminal_client, backend, options),
    level = "info",
    fields(command = command.name(), log_level = ?options.log_level())
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    backend: Box<dyn LinkBackend>,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        "blesched",
        terminal_client.stderr_is_terminal(),
        options.log_level().map(LogLevel::as_level_filter),
    )?;

    let stdout_is_terminal = terminal_client.stdout_is_terminal();
    let format = options.output().unwrap_or(if stdout_is_terminal {
        OutputFormat::Pretty
    } else {
        OutputFormat::Json
    });
    let printer = Printer::new(format, stdout_is_terminal);
    let RunOptions { config, .. } = options;

    match command {
        Command::Scan(args) => crate::cli::scan::run(backend, config, &args, out, &printer).await,
        Command::Read(args) => crate::cli::read::run(backend, config, &args, out, &printer).await,
        Command::Write(args) => {
            crate::cli::write::run(backend, config, &args, out, &printer).await
        }
        Command::Subscribe(args) => {
            crate::cli::subscribe::run(backend, config, &args, out, &printer).await
        }
    }
}
