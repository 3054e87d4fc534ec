use crate::codec::Values;

/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }
    bytes
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats an optional RSSI for terminal output.
pub(crate) fn format_rssi(rssi: Option<i16>) -> String {
    match rssi {
        Some(value) => format!("{value} dBm"),
        None => "-".to_string(),
    }
}

/// Formats decoded values as a comma-separated list; strings are quoted.
pub(crate) fn format_values(values: &Values) -> String {
    fn join<T: ToString>(items: &[T]) -> String {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    let rendered = match values {
        Values::Int8(items) => join(items),
        Values::UInt8(items) => join(items),
        Values::Int16(items) => join(items),
        Values::UInt16(items) => join(items),
        Values::Int32(items) => join(items),
        Values::UInt32(items) => join(items),
        Values::Float16(items) | Values::Float32(items) => join(items),
        Values::Utf8(items) | Values::Utf16(items) => items
            .iter()
            .map(|item| format!("{item:?}"))
            .collect::<Vec<_>>()
            .join(", "),
    };
    format!("[{rendered}]")
}
