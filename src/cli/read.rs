use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::gatt::{SchedulerConfig, parse_gatt_uuid};
use crate::hw::LinkBackend;

use super::command::ReadArgs;
use super::output::Printer;
use super::report::ReadReport;
use super::session::ConnectedSession;
use super::ui::ReadView;

/// Executes the `read` command.
#[instrument(skip_all, level = "info", fields(characteristic = args.target().characteristic()))]
pub(crate) async fn run<W>(
    backend: Box<dyn LinkBackend>,
    config: SchedulerConfig,
    args: &ReadArgs,
    out: &mut W,
    printer: &Printer,
) -> Result<()>
where
    W: io::Write,
{
    let target = args.target();
    let session = ConnectedSession::establish(backend, config, target).await?;
    let outcome = session
        .client()
        .read(target.service(), target.characteristic(), target.element())
        .await;
    let peripheral = session.peripheral().clone();
    session.close().await;

    let report = ReadReport {
        peripheral,
        service: parse_gatt_uuid(target.service())?,
        characteristic: parse_gatt_uuid(target.characteristic())?,
        values: outcome?,
    };
    printer.print(out, &report, |report, painter| ReadView::new(report, painter))
}
