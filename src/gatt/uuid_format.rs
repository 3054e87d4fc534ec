use tracing::trace;
use uuid::Uuid;

use crate::error::GattError;

const CANONICAL_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Parses a boundary UUID string in canonical `8-4-4-4-12` form.
///
/// Layout is checked before content, so a string of the wrong shape reports
/// `InvalidUuidFormat` even when it also contains non-hex characters.
///
/// ```
/// use blesched::{GattError, parse_gatt_uuid};
///
/// let uuid = parse_gatt_uuid("0000180F-0000-1000-8000-00805f9b34fb")?;
/// assert_eq!(0x0000_180F_0000_1000_8000_0080_5F9B_34FB, uuid.as_u128());
///
/// assert!(matches!(
///     parse_gatt_uuid("not-a-uuid"),
///     Err(GattError::InvalidUuidFormat { .. })
/// ));
/// # Ok::<(), GattError>(())
/// ```
///
/// # Errors
///
/// Returns `InvalidUuidFormat` when the length or hyphen layout is wrong and
/// `InvalidUuidChars` when a non-hyphen position is not a hex digit.
pub fn parse_gatt_uuid(raw: &str) -> Result<Uuid, GattError> {
    let bytes = raw.as_bytes();
    let well_formed = bytes.len() == CANONICAL_LEN
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| (*byte == b'-') == HYPHEN_POSITIONS.contains(&index));
    if !well_formed {
        trace!(raw, "rejecting UUID with non-canonical layout");
        return Err(GattError::InvalidUuidFormat {
            uuid: raw.to_string(),
        });
    }

    if !bytes
        .iter()
        .enumerate()
        .filter(|(index, _byte)| !HYPHEN_POSITIONS.contains(index))
        .all(|(_index, byte)| byte.is_ascii_hexdigit())
    {
        trace!(raw, "rejecting UUID with non-hex characters");
        return Err(GattError::InvalidUuidChars {
            uuid: raw.to_string(),
        });
    }

    Uuid::parse_str(raw).map_err(|_error| GattError::InvalidUuidChars {
        uuid: raw.to_string(),
    })
}
