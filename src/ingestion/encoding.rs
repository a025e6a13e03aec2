//! Text encoding resolution for delimited uploads.
//!
//! [`resolve`] picks a starting point (an explicit label, or a statistical guess from
//! [`detect`]) and [`attempt_order`] turns it into the ordered list of encodings the pipeline
//! tries. The list always ends with the fixed fallback candidates in [`FALLBACK_CANDIDATES`].

use std::borrow::Cow;
use std::fmt;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};

use crate::error::{IngestionError, IngestionResult};

/// Bytes inspected by [`detect`]; inputs are usually far smaller.
const DETECTION_WINDOW: usize = 1 << 20;

/// Bytes that Windows-1252 leaves undefined.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// A text encoding the delimited reader can decode with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Latin-1, every byte maps to the code point of the same value.
    Latin1,
    /// Same decoding as [`TextEncoding::Latin1`], reported under its ISO name.
    Iso8859_1,
    /// Windows-1252; the five undefined bytes are rejected.
    Windows1252,
    /// UTF-16 honouring a byte order mark; BOM-less input is read as little-endian when it
    /// shows the matching zero-byte pattern.
    Utf16,
    /// Any other WHATWG encoding, reached through an explicit label or detection.
    Other(&'static Encoding),
}

/// Fallback order used whenever detection is not trusted or its guess fails.
pub const FALLBACK_CANDIDATES: [TextEncoding; 5] = [
    TextEncoding::Utf8,
    TextEncoding::Latin1,
    TextEncoding::Iso8859_1,
    TextEncoding::Windows1252,
    TextEncoding::Utf16,
];

impl TextEncoding {
    /// Resolve a user-supplied label (case-insensitive, `_` and `-` interchangeable).
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_ascii_lowercase();
        match lower.replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "latin-1" | "latin1" | "l1" => Some(Self::Latin1),
            "iso-8859-1" | "iso8859-1" => Some(Self::Iso8859_1),
            "cp1252" | "windows-1252" => Some(Self::Windows1252),
            "utf-16" | "utf16" => Some(Self::Utf16),
            _ => Encoding::for_label(lower.as_bytes()).map(|enc| {
                if enc == UTF_8 {
                    Self::Utf8
                } else if enc == WINDOWS_1252 {
                    Self::Windows1252
                } else {
                    Self::Other(enc)
                }
            }),
        }
    }

    /// Name reported in parse metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
            Self::Iso8859_1 => "iso-8859-1",
            Self::Windows1252 => "windows-1252",
            Self::Utf16 => "utf-16",
            Self::Other(enc) => enc.name(),
        }
    }

    /// Decode without replacement; `None` when the bytes are malformed for this encoding.
    pub fn decode_strict<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            Self::Utf8 => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                UTF_8.decode_without_bom_handling_and_without_replacement(body)
            }
            Self::Latin1 | Self::Iso8859_1 => Some(encoding_rs::mem::decode_latin1(bytes)),
            Self::Windows1252 => {
                if bytes.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
                    return None;
                }
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
            Self::Utf16 => {
                let (enc, body) = match Encoding::for_bom(bytes) {
                    Some((enc, len)) if enc == UTF_16LE || enc == UTF_16BE => (enc, &bytes[len..]),
                    _ => {
                        // Any even-length byte run is valid UTF-16; require the zero-byte shape.
                        let sample = &bytes[..bytes.len().min(DETECTION_WINDOW)];
                        match detect_bomless_utf16(sample) {
                            Some(Detection {
                                encoding: Self::Utf16,
                                ..
                            }) => (UTF_16LE, bytes),
                            _ => return None,
                        }
                    }
                };
                enc.decode_without_bom_handling_and_without_replacement(body)
            }
            Self::Other(enc) => {
                let body = match Encoding::for_bom(bytes) {
                    Some((bom_enc, len)) if bom_enc == *enc => &bytes[len..],
                    _ => bytes,
                };
                enc.decode_without_bom_handling_and_without_replacement(body)
            }
        }
    }

    /// Decode with malformed sequences replaced. Never fails.
    pub fn decode_lossy<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Self::Latin1 | Self::Iso8859_1 => encoding_rs::mem::decode_latin1(bytes),
            Self::Utf8 => UTF_8.decode_with_bom_removal(bytes).0,
            Self::Windows1252 => WINDOWS_1252.decode(bytes).0,
            Self::Utf16 => UTF_16LE.decode(bytes).0,
            Self::Other(enc) => enc.decode(bytes).0,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of statistical detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub encoding: TextEncoding,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Starting point for decoding: the encoding to report and how much it is trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingResolution {
    pub encoding: TextEncoding,
    pub confidence: f32,
    /// True when the caller named the encoding; no fallback happens in that case.
    pub explicit: bool,
}

/// Resolve the encoding to start with.
///
/// An explicit label is used verbatim with confidence `1.0`. Otherwise the bytes are run
/// through [`detect`].
pub fn resolve(bytes: &[u8], explicit: Option<&str>) -> IngestionResult<EncodingResolution> {
    if let Some(label) = explicit {
        let encoding = TextEncoding::from_label(label).ok_or_else(|| IngestionError::UnknownEncoding {
            label: label.to_string(),
        })?;
        return Ok(EncodingResolution {
            encoding,
            confidence: 1.0,
            explicit: true,
        });
    }

    let Detection { encoding, confidence } = detect(bytes);
    Ok(EncodingResolution {
        encoding,
        confidence,
        explicit: false,
    })
}

/// Ordered encodings to attempt for a resolution.
///
/// Explicit resolutions yield exactly one entry. Detected encodings above `threshold` go first,
/// followed by the fallback candidates (without repeating the detected one).
pub fn attempt_order(resolution: &EncodingResolution, threshold: f32) -> Vec<TextEncoding> {
    if resolution.explicit {
        return vec![resolution.encoding];
    }
    let mut order = Vec::with_capacity(FALLBACK_CANDIDATES.len() + 1);
    if resolution.confidence > threshold {
        order.push(resolution.encoding);
    }
    for candidate in FALLBACK_CANDIDATES {
        if !order.contains(&candidate) {
            order.push(candidate);
        }
    }
    order
}

/// Guess the encoding of `bytes`.
///
/// Checks, in order: a byte order mark, the zero-byte pattern of BOM-less UTF-16, pure ASCII,
/// valid UTF-8 (confidence grows with the number of multi-byte characters), and finally the
/// `chardetng` statistical guess among legacy encodings (Windows-125x, Shift_JIS, GBK, EUC-KR,
/// KOI8-R, ...).
pub fn detect(bytes: &[u8]) -> Detection {
    let sample = &bytes[..bytes.len().min(DETECTION_WINDOW)];
    if sample.is_empty() {
        return Detection {
            encoding: TextEncoding::Utf8,
            confidence: 0.0,
        };
    }

    if let Some((enc, _)) = Encoding::for_bom(sample) {
        let encoding = if enc == UTF_8 {
            TextEncoding::Utf8
        } else {
            TextEncoding::Utf16
        };
        return Detection {
            encoding,
            confidence: 1.0,
        };
    }

    if let Some(det) = detect_bomless_utf16(sample) {
        return det;
    }

    if sample.is_ascii() {
        return Detection {
            encoding: TextEncoding::Utf8,
            confidence: 1.0,
        };
    }

    let truncated = sample.len() < bytes.len();
    let valid_prefix = match std::str::from_utf8(sample) {
        Ok(s) => Some(s),
        // A window cut through a multi-byte sequence is still UTF-8.
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&sample[..e.valid_up_to()]).ok()
        }
        Err(_) => None,
    };
    if let Some(text) = valid_prefix {
        let multibyte = text.chars().filter(|c| c.len_utf8() > 1).count();
        let confidence = if multibyte < 6 {
            1.0 - 0.99 * 0.5_f32.powi(multibyte as i32)
        } else {
            0.99
        };
        return Detection {
            encoding: TextEncoding::Utf8,
            confidence,
        };
    }

    detect_legacy(sample, !truncated)
}

fn detect_bomless_utf16(sample: &[u8]) -> Option<Detection> {
    if sample.len() < 4 {
        return None;
    }
    let pairs = (sample.len() / 2) as f32;
    let (mut even_zero, mut odd_zero) = (0usize, 0usize);
    for (i, b) in sample.iter().enumerate() {
        if *b == 0 {
            if i % 2 == 0 {
                even_zero += 1;
            } else {
                odd_zero += 1;
            }
        }
    }
    let even = even_zero as f32 / pairs;
    let odd = odd_zero as f32 / pairs;
    let encoding = if odd > 0.3 && even < 0.05 {
        TextEncoding::Utf16
    } else if even > 0.3 && odd < 0.05 {
        TextEncoding::Other(UTF_16BE)
    } else {
        return None;
    };
    Some(Detection {
        encoding,
        confidence: 0.8,
    })
}

/// Legacy-encoding guess for input that is neither ASCII nor UTF-8. The guess is trusted when
/// it decodes the sample cleanly.
fn detect_legacy(sample: &[u8], last: bool) -> Detection {
    let mut detector = EncodingDetector::new();
    detector.feed(sample, last);
    let guess = detector.guess(None, false);
    let confidence = if guess
        .decode_without_bom_handling_and_without_replacement(sample)
        .is_some()
    {
        0.9
    } else {
        0.3
    };
    let encoding = if guess == WINDOWS_1252 {
        TextEncoding::Windows1252
    } else {
        TextEncoding::Other(guess)
    };
    Detection { encoding, confidence }
}
