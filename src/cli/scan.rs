use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::gatt::SchedulerConfig;
use crate::hw::LinkBackend;

use super::command::ScanArgs;
use super::output::Printer;
use super::report::ScanReport;
use super::session::scan_for;
use super::ui::DeviceListView;

/// Executes the `scan` command.
#[instrument(skip_all, level = "info", fields(scan_duration = ?args.scan_duration()))]
pub(crate) async fn run<W>(
    backend: Box<dyn LinkBackend>,
    config: SchedulerConfig,
    args: &ScanArgs,
    out: &mut W,
    printer: &Printer,
) -> Result<()>
where
    W: io::Write,
{
    let devices = scan_for(backend, config, args.scan_duration()).await?;
    let report = ScanReport { devices };
    printer.print(out, &report, |report, painter| {
        DeviceListView::new(&report.devices, painter)
    })
}
