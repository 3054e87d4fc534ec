use std::io;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::client::Subscription;
use crate::error::CliError;
use crate::gatt::{SchedulerConfig, parse_gatt_uuid};
use crate::hw::LinkBackend;

use super::command::SubscribeArgs;
use super::output::Printer;
use super::report::{NotificationOutcome, NotificationRecord, StopReason, SubscriptionSummary};
use super::session::ConnectedSession;
use super::ui::{NotificationView, SubscriptionSummaryView};

/// Executes the `subscribe` command.
#[instrument(skip_all, level = "info", fields(characteristic = args.target().characteristic()))]
pub(crate) async fn run<W>(
    backend: Box<dyn LinkBackend>,
    config: SchedulerConfig,
    args: &SubscribeArgs,
    out: &mut W,
    printer: &Printer,
) -> Result<()>
where
    W: io::Write,
{
    let target = args.target();
    let characteristic = parse_gatt_uuid(target.characteristic())?;
    let session = ConnectedSession::establish(backend, config, target).await?;
    let subscription = match session
        .client()
        .subscribe(target.service(), target.characteristic(), target.element())
        .await
    {
        Ok(subscription) => subscription,
        Err(error) => {
            session.close().await;
            return Err(error.into());
        }
    };

    let printed = print_notifications(subscription, args.max_notifications(), out, printer).await;

    if let Err(error) = session
        .client()
        .unsubscribe(target.service(), target.characteristic())
        .await
    {
        debug!(%error, "failed to unsubscribe cleanly");
    }
    let peripheral = session.peripheral().clone();
    session.close().await;

    let (received, stop_reason) = printed?;
    let summary = SubscriptionSummary {
        peripheral,
        characteristic,
        received,
        stop_reason,
    };
    printer.print(out, &summary, |summary, painter| {
        SubscriptionSummaryView::new(summary, painter)
    })
}

async fn print_notifications<W>(
    mut subscription: Subscription,
    max_notifications: Option<usize>,
    out: &mut W,
    printer: &Printer,
) -> Result<(usize, StopReason)>
where
    W: io::Write,
{
    let mut received = 0usize;
    loop {
        if max_notifications.is_some_and(|limit| received >= limit) {
            return Ok((received, StopReason::ReachedLimit));
        }
        let item = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|source| CliError::CtrlC { source })?;
                return Ok((received, StopReason::Interrupted));
            }
            item = subscription.next() => item,
        };
        let Some(item) = item else {
            return Ok((received, StopReason::StreamClosed));
        };
        let record = NotificationRecord {
            index: received,
            outcome: NotificationOutcome::from_item(item),
        };
        printer.print(out, &record, |record, painter| {
            NotificationView::new(record, painter)
        })?;
        received += 1;
    }
}
