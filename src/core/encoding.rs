//! Source Encoding Detection and Conversion
//!
//! Sniffs the byte order mark (or the `<` byte pattern) and produces a UTF-8
//! `String` for the tokenizer. Anything that is not UTF-16 must already be
//! valid UTF-8.

use crate::reader::position::LineIndex;

/// Detected encoding of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        match (input[0], input[1]) {
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // No BOM: `<` next to a NUL byte
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Decoding failure, positioned at a byte offset of the raw input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    pub message: String,
    pub offset: usize,
    /// 1-based line of the failure in the decoded text
    pub line: u32,
    /// 1-based byte column of the failure in the decoded text
    pub column: u32,
}

/// Convert raw source bytes into a UTF-8 string.
///
/// Takes ownership so that valid UTF-8 input without a BOM is not copied.
pub fn decode_source(input: Vec<u8>) -> Result<String, EncodingError> {
    match XmlEncoding::detect(&input) {
        XmlEncoding::Utf8 => {
            let bom = if input.starts_with(&[0xEF, 0xBB, 0xBF]) { 3 } else { 0 };
            let mut bytes = input;
            if bom > 0 {
                bytes.drain(..bom);
            }
            String::from_utf8(bytes).map_err(|e| {
                let valid = e.utf8_error().valid_up_to();
                let (line, column) = LineIndex::new(e.as_bytes()).position(valid);
                EncodingError {
                    message: "invalid UTF-8 byte sequence".to_string(),
                    offset: bom + valid,
                    line,
                    column,
                }
            })
        }
        XmlEncoding::Utf16Le => decode_utf16(&input, [0xFF, 0xFE], u16::from_le_bytes),
        XmlEncoding::Utf16Be => decode_utf16(&input, [0xFE, 0xFF], u16::from_be_bytes),
    }
}

fn decode_utf16(
    input: &[u8],
    bom: [u8; 2],
    unit: fn([u8; 2]) -> u16,
) -> Result<String, EncodingError> {
    let start = if input.starts_with(&bom) { 2 } else { 0 };
    let bytes = &input[start..];

    let mut out = String::with_capacity(bytes.len() / 2);
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    let mut consumed = 0usize;
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => {
                out.push(c);
                consumed += c.len_utf16();
            }
            Err(e) => {
                return Err(utf16_error(
                    format!("invalid UTF-16: unpaired surrogate {:#06x}", e.unpaired_surrogate()),
                    start + consumed * 2,
                    &out,
                ));
            }
        }
    }

    if bytes.len() % 2 != 0 {
        return Err(utf16_error(
            "invalid UTF-16: odd number of bytes".to_string(),
            input.len() - 1,
            &out,
        ));
    }
    Ok(out)
}

/// Position the error at the end of what was decoded so far
fn utf16_error(message: String, offset: usize, decoded: &str) -> EncodingError {
    let (line, column) = LineIndex::new(decoded.as_bytes()).position(decoded.len());
    EncodingError {
        message,
        offset,
        line,
        column,
    }
}
