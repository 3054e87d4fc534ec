use std::io;

use anyhow::Result;
use tracing::instrument;

use crate::codec::{ElementType, Values};
use crate::error::CliError;
use crate::gatt::{SchedulerConfig, parse_gatt_uuid};
use crate::hw::LinkBackend;

use super::command::WriteArgs;
use super::output::Printer;
use super::report::WriteReport;
use super::session::ConnectedSession;
use super::ui::WriteView;

/// Executes the `write` command.
#[instrument(skip_all, level = "info", fields(characteristic = args.target().characteristic()))]
pub(crate) async fn run<W>(
    backend: Box<dyn LinkBackend>,
    config: SchedulerConfig,
    args: &WriteArgs,
    out: &mut W,
    printer: &Printer,
) -> Result<()>
where
    W: io::Write,
{
    let target = args.target();
    let values = parse_values(target.element(), args.values())?;
    let options = args.write_options();

    let session = ConnectedSession::establish(backend, config, target).await?;
    let outcome = session
        .client()
        .write(
            target.service(),
            target.characteristic(),
            values.clone(),
            options,
        )
        .await;
    let peripheral = session.peripheral().clone();
    session.close().await;
    outcome?;

    let report = WriteReport {
        peripheral,
        service: parse_gatt_uuid(target.service())?,
        characteristic: parse_gatt_uuid(target.characteristic())?,
        values,
        mode: options.mode(),
    };
    printer.print(out, &report, |report, painter| WriteView::new(report, painter))
}

/// Parses command-line values into the requested element type.
pub(crate) fn parse_values(element: ElementType, raw: &[String]) -> Result<Values> {
    let invalid = |value: &String| CliError::InvalidValue {
        element: element.to_string(),
        value: value.clone(),
    };

    let values = if element.is_integer() {
        let integers = raw
            .iter()
            .map(|value| value.parse::<i64>().map_err(|_| invalid(value)))
            .collect::<Result<Vec<_>, _>>()?;
        Values::from_integers(element, &integers)?
    } else if element.is_float() {
        let floats = raw
            .iter()
            .map(|value| value.parse::<f32>().map_err(|_| invalid(value)))
            .collect::<Result<Vec<_>, _>>()?;
        Values::from_floats(element, &floats)?
    } else {
        Values::from_strings(element, raw.to_vec())?
    };
    Ok(values)
}
