use std::fmt::{self, Display, Formatter};

use crate::cli::report::{
    NotificationOutcome, NotificationRecord, ReadReport, StopReason, SubscriptionSummary,
    WriteReport,
};
use crate::utils::format_values;

use super::device_view::DeviceView;
use super::painter::Painter;
use super::table::Table;

/// Renders a completed read.
pub(crate) struct ReadView<'a> {
    report: &'a ReadReport,
    painter: &'a Painter,
}

impl<'a> ReadView<'a> {
    pub(crate) fn new(report: &'a ReadReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }
}

impl Display for ReadView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = Table::key_value(
            self.painter,
            vec![
                ("service", self.report.service.to_string()),
                ("characteristic", self.report.characteristic.to_string()),
                ("type", self.report.values.element_type().to_string()),
                ("values", self.painter.value(format_values(&self.report.values))),
            ],
        );
        let device = DeviceView::new(&self.report.peripheral, self.painter);

        write!(f, "{}", self.painter.heading("Connected device:"))?;
        write!(f, "\n{device}")?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("Read:"))?;
        write!(f, "\n{table}")
    }
}

/// Renders a completed write.
pub(crate) struct WriteView<'a> {
    report: &'a WriteReport,
    painter: &'a Painter,
}

impl<'a> WriteView<'a> {
    pub(crate) fn new(report: &'a WriteReport, painter: &'a Painter) -> Self {
        Self { report, painter }
    }
}

impl Display for WriteView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let table = Table::key_value(
            self.painter,
            vec![
                ("service", self.report.service.to_string()),
                ("characteristic", self.report.characteristic.to_string()),
                ("mode", self.report.mode.to_string()),
                ("values", self.painter.value(format_values(&self.report.values))),
            ],
        );

        write!(
            f,
            "{} {}",
            self.painter.success("✓ Written to"),
            self.painter.value(self.report.peripheral.address())
        )?;
        write!(f, "\n{table}")
    }
}

/// Renders a single notification line.
pub(crate) struct NotificationView<'a> {
    record: &'a NotificationRecord,
    painter: &'a Painter,
}

impl<'a> NotificationView<'a> {
    pub(crate) fn new(record: &'a NotificationRecord, painter: &'a Painter) -> Self {
        Self { record, painter }
    }
}

impl Display for NotificationView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let index_label = self.painter.muted(format!("[{:04}]", self.record.index));
        match &self.record.outcome {
            NotificationOutcome::Values(values) => {
                write!(f, "{index_label} {}", self.painter.value(format_values(values)))
            }
            NotificationOutcome::Error { kind, detail } => write!(
                f,
                "{index_label} {} {}",
                self.painter.failure(kind.to_string()),
                self.painter.muted(detail)
            ),
        }
    }
}

/// Renders the subscription summary.
pub(crate) struct SubscriptionSummaryView<'a> {
    summary: &'a SubscriptionSummary,
    painter: &'a Painter,
}

impl<'a> SubscriptionSummaryView<'a> {
    pub(crate) fn new(summary: &'a SubscriptionSummary, painter: &'a Painter) -> Self {
        Self { summary, painter }
    }
}

impl Display for SubscriptionSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stop_reason = match self.summary.stop_reason {
            StopReason::ReachedLimit => self.painter.success("reached notification limit"),
            StopReason::Interrupted => self.painter.warning("interrupted"),
            StopReason::StreamClosed => self.painter.warning("link closed"),
        };
        let table = Table::key_value(
            self.painter,
            vec![
                ("device", self.summary.peripheral.address().to_string()),
                ("characteristic", self.summary.characteristic.to_string()),
                ("received", self.painter.value(self.summary.received.to_string())),
                ("stopped", stop_reason),
            ],
        );

        write!(f, "{}", self.painter.heading("Subscription summary:"))?;
        write!(f, "\n{table}")
    }
}
