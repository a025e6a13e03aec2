//! Upload checks (before parsing) and structural validation (after parsing).

use crate::config::{StructuralLimits, UploadLimits};
use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, FileKind};

const ALLOWED_TYPES: [&str; 2] = ["CSV", "XLSX"];

/// Bytes inspected when sniffing delimited content.
const SNIFF_BYTES: usize = 2048;

/// Validate an upload before parsing and return its [`FileKind`].
///
/// Checks, in order: a non-blank filename, a supported extension, the size limit, and that the
/// content plausibly matches the extension.
pub fn validate_upload(filename: &str, bytes: &[u8], limits: &UploadLimits) -> IngestionResult<FileKind> {
    let kind = file_kind_for(filename)?;

    if bytes.len() > limits.max_file_size_bytes {
        return Err(IngestionError::FileTooLarge {
            size_bytes: bytes.len(),
            max_bytes: limits.max_file_size_bytes,
        });
    }

    let content_ok = match kind {
        FileKind::Spreadsheet => looks_like_workbook(bytes),
        FileKind::Delimited => looks_like_delimited(bytes),
    };
    if !content_ok {
        return Err(unsupported(filename, "unknown".to_string()));
    }
    Ok(kind)
}

/// Map a filename to its [`FileKind`] by extension.
pub fn file_kind_for(filename: &str) -> IngestionResult<FileKind> {
    if filename.trim().is_empty() {
        return Err(IngestionError::MissingFilename);
    }
    FileKind::from_filename(filename.trim()).ok_or_else(|| unsupported(filename, extension_label(filename)))
}

/// Check row/column bounds and header shape of a parsed table.
pub fn validate_structure(table: &DataSet, limits: &StructuralLimits) -> IngestionResult<()> {
    let rows = table.row_count();
    let columns = table.column_count();
    let fail = |reason: String| {
        Err(IngestionError::StructuralValidationFailed {
            reason,
            rows,
            columns,
            limits: *limits,
        })
    };

    if rows < limits.min_rows || columns < limits.min_columns {
        return fail(format!(
            "file must have at least {} row(s) and {} column(s)",
            limits.min_rows, limits.min_columns
        ));
    }
    if rows > limits.max_rows {
        return fail(format!("file exceeds maximum allowed rows ({})", limits.max_rows));
    }
    if columns > limits.max_columns {
        return fail(format!("file exceeds maximum allowed columns ({})", limits.max_columns));
    }
    if let Some(name) = table.schema.field_names().find(|n| is_placeholder_header(n)) {
        return fail(format!("file appears to have missing or invalid headers ('{name}')"));
    }
    Ok(())
}

/// Blank headers and reader-generated `Unnamed: N` names (also `Unnamed: N_level_M` as written
/// by multi-index exports). Real names that merely start with "unnamed" are fine.
pub fn is_placeholder_header(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return true;
    }
    let Some(rest) = trimmed.strip_prefix("Unnamed: ") else {
        return false;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match rest.split_once("_level_") {
        Some((idx, level)) => all_digits(idx) && all_digits(level),
        None => all_digits(rest),
    }
}

fn unsupported(filename: &str, detected: String) -> IngestionError {
    IngestionError::UnsupportedFileType {
        filename: filename.to_string(),
        detected,
        allowed: ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
    }
}

fn extension_label(filename: &str) -> String {
    filename
        .trim()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_uppercase())
        .unwrap_or_else(|| "unknown".to_string())
}

/// ZIP container (xlsx/xlsm/ods) or OLE2 compound file (xls).
fn looks_like_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
}

/// Plausible text whose first line is followed by at least one non-empty line. When the first
/// line has commas, one of the next ten lines must have a similar field count.
fn looks_like_delimited(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    // UTF-16 input is sniffed on its decoded form.
    let text = match encoding_rs::Encoding::for_bom(head) {
        Some((enc, _)) => enc.decode(head).0,
        None => encoding_rs::mem::decode_latin1(head),
    };
    let text = if text.contains('\0') {
        std::borrow::Cow::Owned(text.replace('\0', ""))
    } else {
        text
    };

    let mut lines = text.lines();
    let Some(header) = lines.next() else {
        return false;
    };
    if text.chars().any(|c| c.is_ascii_control() && !matches!(c, '\n' | '\r' | '\t')) {
        return false;
    }
    let header = header.trim();
    let mut body = lines.map(str::trim).filter(|l| !l.is_empty()).take(10).peekable();
    if header.is_empty() || body.peek().is_none() {
        return false;
    }
    // Single-column files have no delimiter at all.
    if !header.contains(',') {
        return true;
    }
    let header_fields = header.matches(',').count() + 1;
    body.any(|l| (l.matches(',').count() + 1).abs_diff(header_fields) <= 2)
}
