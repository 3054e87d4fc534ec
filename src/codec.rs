use serde::Serialize;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

const F32_EXPONENT_BIAS: i32 = 127;
const SFLOAT_EXPONENT_BIAS: i32 = 15;
const SFLOAT_EXPONENT_ALL_ONES: i32 = 0x1F;
const SFLOAT_SIGN_MASK: u16 = 0x8000;
const SFLOAT_INFINITY: u16 = 0x7C00;
const SFLOAT_QUIET_NAN_BIT: u16 = 0x0200;
const SFLOAT_MANTISSA_MASK: u16 = 0x03FF;

/// Element types carried by characteristic values.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumIter, EnumString, Serialize)]
pub enum ElementType {
    #[strum(serialize = "int8")]
    #[serde(rename = "int8")]
    Int8,
    #[strum(serialize = "uint8")]
    #[serde(rename = "uint8")]
    UInt8,
    #[strum(serialize = "int16")]
    #[serde(rename = "int16")]
    Int16,
    #[strum(serialize = "uint16")]
    #[serde(rename = "uint16")]
    UInt16,
    #[strum(serialize = "int32")]
    #[serde(rename = "int32")]
    Int32,
    #[strum(serialize = "uint32")]
    #[serde(rename = "uint32")]
    UInt32,
    /// Bluetooth SFLOAT ("short float").
    #[strum(serialize = "float16")]
    #[serde(rename = "float16")]
    Float16,
    #[strum(serialize = "float32")]
    #[serde(rename = "float32")]
    Float32,
    /// Zero-terminated UTF-8 strings.
    #[strum(serialize = "utf8")]
    #[serde(rename = "utf8")]
    Utf8String,
    /// Zero-terminated UTF-16LE strings.
    #[strum(serialize = "utf16")]
    #[serde(rename = "utf16")]
    Utf16String,
}

impl ElementType {
    /// Returns the integer element type for a byte width and signedness.
    ///
    /// ```
    /// use blesched::ElementType;
    ///
    /// assert_eq!(Some(ElementType::Int16), ElementType::integer(2, true));
    /// assert_eq!(Some(ElementType::UInt8), ElementType::integer(1, false));
    /// assert_eq!(None, ElementType::integer(3, false));
    /// ```
    #[must_use]
    pub const fn integer(width: usize, signed: bool) -> Option<Self> {
        match (width, signed) {
            (1, true) => Some(Self::Int8),
            (1, false) => Some(Self::UInt8),
            (2, true) => Some(Self::Int16),
            (2, false) => Some(Self::UInt16),
            (4, true) => Some(Self::Int32),
            (4, false) => Some(Self::UInt32),
            _ => None,
        }
    }

    /// Width in bytes of one element, or of one code unit for strings.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Utf8String => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::Utf16String => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
        }
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::UInt8 | Self::Int16 | Self::UInt16 | Self::Int32 | Self::UInt32
        )
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32)
    }

    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::Utf8String | Self::Utf16String)
    }
}

/// Errors returned by the value codec.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CodecError {
    /// The buffer length is not a multiple of the element width.
    #[error("buffer of {len} bytes is not a multiple of the {width}-byte `{element}` width")]
    TruncatedBuffer {
        element: ElementType,
        len: usize,
        width: usize,
    },
    /// An input value does not fit in the requested element type.
    #[error("value {value} does not fit in `{element}`")]
    ValueOutOfRange { element: ElementType, value: String },
    /// The input kind cannot be stored in the requested element type.
    #[error("`{element}` elements cannot be built from {supplied} input")]
    ElementMismatch {
        element: ElementType,
        supplied: &'static str,
    },
}

/// Whether string encoding terminates the final string.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum StringTermination {
    /// Terminators only separate strings; the last one is left open.
    #[default]
    Separated,
    /// Every string, including the last, is followed by a terminator.
    Terminated,
}

/// A typed sequence of characteristic values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values")]
pub enum Values {
    #[serde(rename = "int8")]
    Int8(Vec<i8>),
    #[serde(rename = "uint8")]
    UInt8(Vec<u8>),
    #[serde(rename = "int16")]
    Int16(Vec<i16>),
    #[serde(rename = "uint16")]
    UInt16(Vec<u16>),
    #[serde(rename = "int32")]
    Int32(Vec<i32>),
    #[serde(rename = "uint32")]
    UInt32(Vec<u32>),
    #[serde(rename = "float16")]
    Float16(Vec<f32>),
    #[serde(rename = "float32")]
    Float32(Vec<f32>),
    #[serde(rename = "utf8")]
    Utf8(Vec<String>),
    #[serde(rename = "utf16")]
    Utf16(Vec<String>),
}

impl Values {
    /// Returns the element type of this sequence.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Int8(_) => ElementType::Int8,
            Self::UInt8(_) => ElementType::UInt8,
            Self::Int16(_) => ElementType::Int16,
            Self::UInt16(_) => ElementType::UInt16,
            Self::Int32(_) => ElementType::Int32,
            Self::UInt32(_) => ElementType::UInt32,
            Self::Float16(_) => ElementType::Float16,
            Self::Float32(_) => ElementType::Float32,
            Self::Utf8(_) => ElementType::Utf8String,
            Self::Utf16(_) => ElementType::Utf16String,
        }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(values) => values.len(),
            Self::UInt8(values) => values.len(),
            Self::Int16(values) => values.len(),
            Self::UInt16(values) => values.len(),
            Self::Int32(values) => values.len(),
            Self::UInt32(values) => values.len(),
            Self::Float16(values) | Self::Float32(values) => values.len(),
            Self::Utf8(values) | Self::Utf16(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds an integer sequence, rejecting values the element cannot hold.
    ///
    /// # Errors
    ///
    /// Returns an error when `element` is not an integer type or a value is
    /// out of range.
    ///
    /// ```
    /// use blesched::{ElementType, Values};
    ///
    /// let values = Values::from_integers(ElementType::Int16, &[-2, 300])?;
    /// assert_eq!(Values::Int16(vec![-2, 300]), values);
    /// assert!(Values::from_integers(ElementType::UInt8, &[256]).is_err());
    /// # Ok::<(), blesched::CodecError>(())
    /// ```
    pub fn from_integers(element: ElementType, values: &[i64]) -> Result<Self, CodecError> {
        let values = match element {
            ElementType::Int8 => Self::Int8(narrow(element, values)?),
            ElementType::UInt8 => Self::UInt8(narrow(element, values)?),
            ElementType::Int16 => Self::Int16(narrow(element, values)?),
            ElementType::UInt16 => Self::UInt16(narrow(element, values)?),
            ElementType::Int32 => Self::Int32(narrow(element, values)?),
            ElementType::UInt32 => Self::UInt32(narrow(element, values)?),
            _ => {
                return Err(CodecError::ElementMismatch {
                    element,
                    supplied: "integer",
                });
            }
        };
        Ok(values)
    }

    /// Builds a float sequence for `Float16` or `Float32`.
    ///
    /// # Errors
    ///
    /// Returns an error when `element` is not a float type.
    pub fn from_floats(element: ElementType, values: &[f32]) -> Result<Self, CodecError> {
        match element {
            ElementType::Float16 => Ok(Self::Float16(values.to_vec())),
            ElementType::Float32 => Ok(Self::Float32(values.to_vec())),
            _ => Err(CodecError::ElementMismatch {
                element,
                supplied: "float",
            }),
        }
    }

    /// Builds a string sequence for `Utf8String` or `Utf16String`.
    ///
    /// # Errors
    ///
    /// Returns an error when `element` is not a string type.
    pub fn from_strings(element: ElementType, values: Vec<String>) -> Result<Self, CodecError> {
        match element {
            ElementType::Utf8String => Ok(Self::Utf8(values)),
            ElementType::Utf16String => Ok(Self::Utf16(values)),
            _ => Err(CodecError::ElementMismatch {
                element,
                supplied: "string",
            }),
        }
    }
}

fn narrow<T>(element: ElementType, values: &[i64]) -> Result<Vec<T>, CodecError>
where
    T: TryFrom<i64>,
{
    values
        .iter()
        .map(|value| {
            T::try_from(*value).map_err(|_| CodecError::ValueOutOfRange {
                element,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Converts typed values to and from raw characteristic bytes.
pub struct ValueCodec;

impl ValueCodec {
    /// Encodes values with separator-only string termination.
    ///
    /// A trailing empty string leaves no bytes behind in this mode, so it does
    /// not survive a decode. Use [`StringTermination::Terminated`] through
    /// [`ValueCodec::encode_with`] when every string must come back.
    ///
    /// ```
    /// use blesched::{ValueCodec, Values};
    ///
    /// assert_eq!(vec![0x01, 0x00, 0xFF, 0xFF], ValueCodec::encode(&Values::Int16(vec![1, -1])));
    /// assert_eq!(b"ab\0c".to_vec(), ValueCodec::encode(&Values::Utf8(vec!["ab".into(), "c".into()])));
    /// ```
    #[must_use]
    pub fn encode(values: &Values) -> Vec<u8> {
        Self::encode_with(values, StringTermination::Separated)
    }

    /// Encodes values, little-endian, packed back to back.
    #[must_use]
    pub fn encode_with(values: &Values, termination: StringTermination) -> Vec<u8> {
        match values {
            Values::Int8(values) => values.iter().flat_map(|value| value.to_le_bytes()).collect(),
            Values::UInt8(values) => values.clone(),
            Values::Int16(values) => values.iter().flat_map(|value| value.to_le_bytes()).collect(),
            Values::UInt16(values) => values.iter().flat_map(|value| value.to_le_bytes()).collect(),
            Values::Int32(values) => values.iter().flat_map(|value| value.to_le_bytes()).collect(),
            Values::UInt32(values) => values.iter().flat_map(|value| value.to_le_bytes()).collect(),
            Values::Float16(values) => values
                .iter()
                .flat_map(|value| f32_to_sfloat(*value).to_le_bytes())
                .collect(),
            Values::Float32(values) => values.iter().flat_map(|value| value.to_le_bytes()).collect(),
            Values::Utf8(values) => encode_strings(values, termination, &[0], |value| {
                value.as_bytes().to_vec()
            }),
            Values::Utf16(values) => encode_strings(values, termination, &[0, 0], |value| {
                value.encode_utf16().flat_map(u16::to_le_bytes).collect()
            }),
        }
    }

    /// Decodes a raw buffer into values of one element type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TruncatedBuffer`] when the buffer length is not a
    /// multiple of the element width.
    ///
    /// ```
    /// use blesched::{ElementType, ValueCodec, Values};
    ///
    /// let decoded = ValueCodec::decode(ElementType::UInt8, &[0x01, 0x02, 0x03])?;
    /// assert_eq!(Values::UInt8(vec![1, 2, 3]), decoded);
    /// # Ok::<(), blesched::CodecError>(())
    /// ```
    pub fn decode(element: ElementType, bytes: &[u8]) -> Result<Values, CodecError> {
        let width = element.width();
        if !bytes.len().is_multiple_of(width) {
            return Err(CodecError::TruncatedBuffer {
                element,
                len: bytes.len(),
                width,
            });
        }

        let values = match element {
            ElementType::Int8 => {
                Values::Int8(bytes.iter().map(|byte| i8::from_le_bytes([*byte])).collect())
            }
            ElementType::UInt8 => Values::UInt8(bytes.to_vec()),
            ElementType::Int16 => {
                Values::Int16(bytes.chunks_exact(2).map(|c| i16::from_le_bytes(le2(c))).collect())
            }
            ElementType::UInt16 => {
                Values::UInt16(bytes.chunks_exact(2).map(|c| u16::from_le_bytes(le2(c))).collect())
            }
            ElementType::Int32 => {
                Values::Int32(bytes.chunks_exact(4).map(|c| i32::from_le_bytes(le4(c))).collect())
            }
            ElementType::UInt32 => {
                Values::UInt32(bytes.chunks_exact(4).map(|c| u32::from_le_bytes(le4(c))).collect())
            }
            ElementType::Float16 => Values::Float16(
                bytes
                    .chunks_exact(2)
                    .map(|c| sfloat_to_f32(u16::from_le_bytes(le2(c))))
                    .collect(),
            ),
            ElementType::Float32 => {
                Values::Float32(bytes.chunks_exact(4).map(|c| f32::from_le_bytes(le4(c))).collect())
            }
            ElementType::Utf8String => Values::Utf8(
                split_terminated(bytes)
                    .into_iter()
                    .map(|segment| String::from_utf8_lossy(segment).into_owned())
                    .collect(),
            ),
            ElementType::Utf16String => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes(le2(c)))
                    .collect();
                Values::Utf16(
                    split_terminated(&units)
                        .into_iter()
                        .map(String::from_utf16_lossy)
                        .collect(),
                )
            }
        };

        Ok(values)
    }
}

fn encode_strings<F>(
    values: &[String],
    termination: StringTermination,
    terminator: &[u8],
    encode_one: F,
) -> Vec<u8>
where
    F: Fn(&str) -> Vec<u8>,
{
    let mut encoded = Vec::new();
    for (index, value) in values.iter().enumerate() {
        encoded.extend(encode_one(value));
        let is_last = index + 1 == values.len();
        if !is_last || termination == StringTermination::Terminated {
            encoded.extend_from_slice(terminator);
        }
    }
    encoded
}

/// Splits code units on zero terminators.
///
/// A buffer ending in a terminator yields no trailing empty segment; an
/// unterminated remainder is kept as the final segment.
fn split_terminated<T>(units: &[T]) -> Vec<&[T]>
where
    T: Default + PartialEq,
{
    let terminator = T::default();
    let mut segments: Vec<&[T]> = units.split(|unit| *unit == terminator).collect();
    if segments.last().is_some_and(|segment| segment.is_empty()) {
        segments.pop();
    }
    segments
}

fn le2(chunk: &[u8]) -> [u8; 2] {
    [chunk[0], chunk[1]]
}

fn le4(chunk: &[u8]) -> [u8; 4] {
    [chunk[0], chunk[1], chunk[2], chunk[3]]
}

/// Converts an IEEE-754 binary32 value to the 16-bit SFLOAT layout.
///
/// The exponent is re-biased from 127 to 15 and the top 10 mantissa bits are
/// kept. Values too small for a normal SFLOAT flush to signed zero and values
/// too large saturate to infinity.
///
/// ```
/// assert_eq!(0x3E00, blesched::f32_to_sfloat(1.5));
/// assert_eq!(0xC000, blesched::f32_to_sfloat(-2.0));
/// ```
#[must_use]
pub fn f32_to_sfloat(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) as u16) & SFLOAT_SIGN_MASK;
    let exponent = ((bits >> 23) & 0xFF) as i32;
    let mantissa = ((bits >> 13) as u16) & SFLOAT_MANTISSA_MASK;

    if exponent == 0xFF {
        let nan_bit = if bits & 0x007F_FFFF == 0 {
            0
        } else {
            SFLOAT_QUIET_NAN_BIT
        };
        return sign | SFLOAT_INFINITY | nan_bit;
    }
    if exponent == 0 {
        return sign;
    }

    let rebiased = exponent - F32_EXPONENT_BIAS + SFLOAT_EXPONENT_BIAS;
    if rebiased >= SFLOAT_EXPONENT_ALL_ONES {
        return sign | SFLOAT_INFINITY;
    }
    if rebiased <= 0 {
        return sign;
    }

    sign | ((rebiased as u16) << 10) | mantissa
}

/// Converts a 16-bit SFLOAT value back to binary32.
///
/// ```
/// assert_eq!(1.5, blesched::sfloat_to_f32(0x3E00));
/// assert_eq!(65504.0, blesched::sfloat_to_f32(0x7BFF));
/// ```
#[must_use]
pub fn sfloat_to_f32(raw: u16) -> f32 {
    let negative = raw & SFLOAT_SIGN_MASK != 0;
    let sign = u32::from(raw & SFLOAT_SIGN_MASK) << 16;
    let exponent = i32::from((raw >> 10) & 0x1F);
    let mantissa = u32::from(raw & SFLOAT_MANTISSA_MASK);

    match exponent {
        0 if mantissa == 0 => f32::from_bits(sign),
        0 => {
            // subnormal: mantissa * 2^-24
            let magnitude = mantissa as f32 * 2f32.powi(-24);
            if negative { -magnitude } else { magnitude }
        }
        SFLOAT_EXPONENT_ALL_ONES => f32::from_bits(sign | 0x7F80_0000 | (mantissa << 13)),
        _ => {
            let rebiased = (exponent - SFLOAT_EXPONENT_BIAS + F32_EXPONENT_BIAS) as u32;
            f32::from_bits(sign | (rebiased << 23) | (mantissa << 13))
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[rstest]
    #[case(Values::Int8(vec![-128, -1, 0, 127]))]
    #[case(Values::UInt8(vec![0, 1, 255]))]
    #[case(Values::Int16(vec![i16::MIN, -2, 0, i16::MAX]))]
    #[case(Values::UInt16(vec![0, 0xBEEF, u16::MAX]))]
    #[case(Values::Int32(vec![i32::MIN, -70_000, 0, i32::MAX]))]
    #[case(Values::UInt32(vec![0, 0xDEAD_BEEF, u32::MAX]))]
    #[case(Values::Float32(vec![0.0, -1.25, 3.5e7, f32::MIN_POSITIVE]))]
    #[case(Values::Utf8(strings(&["a", "bb", ""])))]
    #[case(Values::Utf16(strings(&["héllo", "", "ω"])))]
    fn terminated_encoding_decodes_to_same_values(#[case] values: Values) {
        let encoded = ValueCodec::encode_with(&values, StringTermination::Terminated);
        let decoded = ValueCodec::decode(values.element_type(), &encoded)
            .expect("well-formed buffer should decode");
        assert_eq!(values, decoded);
    }

    #[rstest]
    #[case(1.0)]
    #[case(-2.5)]
    #[case(0.333_333)]
    #[case(1234.567)]
    #[case(-0.000_123)]
    #[case(60_000.0)]
    fn float16_round_trip_stays_within_mantissa_precision(#[case] value: f32) {
        let encoded = ValueCodec::encode(&Values::Float16(vec![value]));
        let decoded = ValueCodec::decode(ElementType::Float16, &encoded)
            .expect("two-byte buffer should decode");
        let Values::Float16(decoded) = decoded else {
            panic!("Float16 buffer should decode to Float16 values");
        };
        let tolerance = value.abs() * 2f32.powi(-10);
        assert!(
            (decoded[0] - value).abs() <= tolerance,
            "{value} decoded as {}",
            decoded[0]
        );
    }

    #[rstest]
    #[case(0.0, 0x0000)]
    #[case(-0.0, 0x8000)]
    #[case(1.0, 0x3C00)]
    #[case(-2.0, 0xC000)]
    #[case(65504.0, 0x7BFF)]
    #[case(1.0e6, 0x7C00)]
    #[case(1.0e-10, 0x0000)]
    #[case(f32::INFINITY, 0x7C00)]
    fn f32_to_sfloat_rebiases_exponent(#[case] value: f32, #[case] expected: u16) {
        assert_eq!(expected, f32_to_sfloat(value));
    }

    #[test]
    fn sfloat_nan_survives_conversion() {
        let raw = f32_to_sfloat(f32::NAN);
        assert!(sfloat_to_f32(raw).is_nan());
    }

    #[test]
    fn sfloat_subnormal_decodes_to_small_value() {
        assert_eq!(2f32.powi(-24), sfloat_to_f32(0x0001));
    }

    #[test]
    fn strings_are_separated_but_not_terminated_by_default() {
        let encoded = ValueCodec::encode(&Values::Utf8(strings(&["a", "bb"])));
        assert_eq!(b"a\0bb".to_vec(), encoded);

        let terminated =
            ValueCodec::encode_with(&Values::Utf8(strings(&["a", "bb"])), StringTermination::Terminated);
        assert_eq!(b"a\0bb\0".to_vec(), terminated);
    }

    #[test]
    fn separated_encoding_drops_a_trailing_empty_string() {
        let values = Values::Utf8(strings(&["a", "bb", ""]));

        let separated = ValueCodec::encode(&values);
        assert_eq!(
            Values::Utf8(strings(&["a", "bb"])),
            ValueCodec::decode(ElementType::Utf8String, &separated)
                .expect("utf8 buffers always decode")
        );

        let terminated = ValueCodec::encode_with(&values, StringTermination::Terminated);
        assert_eq!(
            values,
            ValueCodec::decode(ElementType::Utf8String, &terminated)
                .expect("utf8 buffers always decode")
        );
    }

    #[rstest]
    #[case(b"a\0bb\0".as_slice(), &["a", "bb"])]
    #[case(b"a\0bb".as_slice(), &["a", "bb"])]
    #[case(b"a\0\0b".as_slice(), &["a", "", "b"])]
    #[case(b"".as_slice(), &[])]
    #[case(b"\0".as_slice(), &[""])]
    fn utf8_decode_splits_on_terminators(#[case] bytes: &[u8], #[case] expected: &[&str]) {
        let decoded =
            ValueCodec::decode(ElementType::Utf8String, bytes).expect("utf8 buffers always decode");
        assert_eq!(Values::Utf8(strings(expected)), decoded);
    }

    #[test]
    fn utf16_encodes_little_endian_code_units() {
        let encoded = ValueCodec::encode(&Values::Utf16(strings(&["A", "B"])));
        assert_eq!(vec![0x41, 0x00, 0x00, 0x00, 0x42, 0x00], encoded);
    }

    #[rstest]
    #[case(ElementType::Int16, 3)]
    #[case(ElementType::UInt32, 6)]
    #[case(ElementType::Float32, 1)]
    #[case(ElementType::Float16, 5)]
    #[case(ElementType::Utf16String, 3)]
    fn decode_rejects_partial_elements(#[case] element: ElementType, #[case] len: usize) {
        let buffer = vec![0xAB; len];
        let result = ValueCodec::decode(element, &buffer);
        assert_matches!(
            result,
            Err(CodecError::TruncatedBuffer { element: rejected, len: rejected_len, .. })
                if rejected == element && rejected_len == len
        );
    }

    #[test]
    fn every_element_type_decodes_an_empty_buffer() {
        for element in ElementType::iter() {
            let decoded = ValueCodec::decode(element, &[]).expect("empty buffer should decode");
            assert_eq!(element, decoded.element_type());
            assert!(decoded.is_empty());
        }
    }

    #[test]
    fn integer_builder_rejects_out_of_range_values() {
        let result = Values::from_integers(ElementType::Int8, &[1, 200]);
        assert_matches!(
            result,
            Err(CodecError::ValueOutOfRange { element: ElementType::Int8, value }) if value == "200"
        );
    }

    #[test]
    fn builders_reject_mismatched_elements() {
        assert_matches!(
            Values::from_floats(ElementType::UInt8, &[1.0]),
            Err(CodecError::ElementMismatch { supplied: "float", .. })
        );
        assert_matches!(
            Values::from_strings(ElementType::Float32, vec![]),
            Err(CodecError::ElementMismatch { supplied: "string", .. })
        );
    }

    #[test]
    fn element_type_parses_lowercase_names() {
        assert_eq!(Ok(ElementType::UInt16), "uint16".parse::<ElementType>());
        assert_eq!("utf16", ElementType::Utf16String.to_string());
    }
}
