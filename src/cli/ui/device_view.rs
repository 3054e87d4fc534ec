use std::fmt::{self, Display, Formatter};

use crate::gatt::Peripheral;
use crate::utils::format_rssi;

use super::painter::Painter;
use super::table::Table;

const UNNAMED: &str = "<unnamed>";

/// Renders one peripheral as a key-value table.
pub(crate) struct DeviceView<'a> {
    peripheral: &'a Peripheral,
    painter: &'a Painter,
}

impl<'a> DeviceView<'a> {
    pub(crate) fn new(peripheral: &'a Peripheral, painter: &'a Painter) -> Self {
        Self {
            peripheral,
            painter,
        }
    }
}

impl Display for DeviceView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = self.peripheral.name().unwrap_or(UNNAMED);
        let table = Table::key_value(
            self.painter,
            vec![
                ("address", self.painter.value(self.peripheral.address())),
                ("name", self.painter.value(name)),
                (
                    "rssi",
                    self.painter.value(format_rssi(self.peripheral.rssi())),
                ),
            ],
        );
        write!(f, "{table}")
    }
}

/// Renders scan results in discovery order with their connect index.
pub(crate) struct DeviceListView<'a> {
    peripherals: &'a [Peripheral],
    painter: &'a Painter,
}

impl<'a> DeviceListView<'a> {
    pub(crate) fn new(peripherals: &'a [Peripheral], painter: &'a Painter) -> Self {
        Self {
            peripherals,
            painter,
        }
    }
}

impl Display for DeviceListView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.peripherals.is_empty() {
            return write!(f, "{}", self.painter.warning("No devices found."));
        }
        let rows = self
            .peripherals
            .iter()
            .enumerate()
            .map(|(index, peripheral)| {
                vec![
                    self.painter.muted(index.to_string()),
                    self.painter.value(peripheral.address()),
                    peripheral.name().unwrap_or(UNNAMED).to_string(),
                    format_rssi(peripheral.rssi()),
                ]
            })
            .collect();
        let table = Table::grid(["#", "address", "name", "rssi"], rows);

        write!(
            f,
            "{}",
            self.painter
                .heading(format!("Discovered devices ({}):", self.peripherals.len()))
        )?;
        write!(f, "\n{table}")
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn device_view_marks_missing_fields() {
        let painter = Painter::new(false);
        let peripheral = Peripheral::new("AA:BB:CC:DD:EE:01", None, None);

        assert_snapshot!(DeviceView::new(&peripheral, &painter).to_string(), @r"
        ╭─────────┬───────────────────╮
        │ field   │ value             │
        ├─────────┼───────────────────┤
        │ address │ AA:BB:CC:DD:EE:01 │
        │ name    │ <unnamed>         │
        │ rssi    │ -                 │
        ╰─────────┴───────────────────╯
        ");
    }

    #[test]
    fn device_list_keeps_discovery_order_with_indices() {
        let painter = Painter::new(false);
        let peripherals = vec![
            Peripheral::new("AA:BB:CC:DD:EE:02", Some("HRM-2".into()), Some(-70)),
            Peripheral::new("AA:BB:CC:DD:EE:01", Some("HRM-1".into()), Some(-40)),
        ];

        assert_snapshot!(DeviceListView::new(&peripherals, &painter).to_string(), @r"
        Discovered devices (2):
        ╭───┬───────────────────┬───────┬─────────╮
        │ # │ address           │ name  │ rssi    │
        ├───┼───────────────────┼───────┼─────────┤
        │ 0 │ AA:BB:CC:DD:EE:02 │ HRM-2 │ -70 dBm │
        │ 1 │ AA:BB:CC:DD:EE:01 │ HRM-1 │ -40 dBm │
        ╰───┴───────────────────┴───────┴─────────╯
        ");
    }

    #[test]
    fn empty_device_list_renders_a_warning() {
        let painter = Painter::new(false);

        assert_eq!(
            "No devices found.",
            DeviceListView::new(&[], &painter).to_string()
        );
    }
}
