#![cfg(feature = "excel_test_writer")]

use rust_xlsxwriter::Workbook;

use tabular_session::config::{SessionConfig, UploadLimits};
use tabular_session::error::{IngestionError, UploadError};
use tabular_session::ingestion::{ingest, preview, validate_upload, IngestionOptions};
use tabular_session::session::SessionStore;
use tabular_session::types::{DataType, FileKind, Value};
use tabular_session::upload::{upload, UploadOptions};

fn people_xlsx(rows: usize) -> Vec<u8> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("People").unwrap();

    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();
    for i in 0..rows {
        let r = (i + 1) as u32;
        ws.write_number(r, 0, i as f64).unwrap();
        ws.write_string(r, 1, format!("person {i}")).unwrap();
        ws.write_number(r, 2, 50.0 + i as f64 / 4.0).unwrap();
        ws.write_boolean(r, 3, i % 2 == 0).unwrap();
    }

    wb.save_to_buffer().unwrap()
}

#[test]
fn workbook_passes_upload_validation() {
    let bytes = people_xlsx(3);
    let kind = validate_upload("people.xlsx", &bytes, &UploadLimits::default()).unwrap();
    assert_eq!(kind, FileKind::Spreadsheet);

    // Text renamed to .xlsx fails the content sniff.
    let err = validate_upload("people.xlsx", b"id,name\n1,Ada\n", &UploadLimits::default()).unwrap_err();
    assert!(matches!(err, IngestionError::UnsupportedFileType { .. }));
}

#[test]
fn first_sheet_is_read_with_inferred_types() {
    let out = ingest("people.xlsx", &people_xlsx(4), None, &IngestionOptions::default()).unwrap();

    assert_eq!(out.file_kind, FileKind::Spreadsheet);
    assert_eq!(out.table.column_names(), vec!["id", "name", "score", "active"]);
    let types: Vec<DataType> = out.table.schema.fields.iter().map(|f| f.data_type).collect();
    assert_eq!(
        types,
        vec![DataType::Int64, DataType::Utf8, DataType::Float64, DataType::Bool]
    );
    assert_eq!(out.table.rows[3][0], Value::Int64(3));
    assert_eq!(out.table.rows[1][2], Value::Float64(50.25));
    assert_eq!(out.table.rows[0][3], Value::Bool(true));

    assert_eq!(out.metadata.encoding_used, None);
    assert!(!out.metadata.is_chunked);
    assert_eq!(out.metadata.total_rows, 4);
}

#[test]
fn sampling_limits_spreadsheet_rows() {
    let opts = IngestionOptions {
        sample_rows: Some(2),
        ..IngestionOptions::default()
    };
    let out = ingest("people.xlsx", &people_xlsx(10), None, &opts).unwrap();
    assert_eq!(out.table.row_count(), 2);
    assert!(out.metadata.is_sampled);

    let p = preview("people.xlsx", &people_xlsx(10), Some(3), None).unwrap();
    assert_eq!(p.rows.len(), 3);
}

#[test]
fn blank_header_cell_is_rejected() {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.write_string(0, 1, "value").unwrap();
    for r in 1..4u32 {
        ws.write_number(r, 0, r as f64).unwrap();
        ws.write_number(r, 1, r as f64 * 10.0).unwrap();
    }
    let bytes = wb.save_to_buffer().unwrap();

    let store = SessionStore::new(SessionConfig::default());
    let err = upload(&store, "o", "index.xlsx", &bytes, None, &UploadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        UploadError::Ingestion(IngestionError::StructuralValidationFailed { rows: 3, columns: 2, .. })
    ));
    assert!(store.is_empty());
}

#[test]
fn workbook_upload_creates_a_session() {
    let store = SessionStore::new(SessionConfig::default());
    let out = upload(&store, "o", "people.xlsx", &people_xlsx(5), None, &UploadOptions::default()).unwrap();
    assert_eq!(out.file_kind, FileKind::Spreadsheet);

    let rec = store.get(&out.session_id, "o").unwrap();
    assert_eq!(rec.row_count(), 5);
    assert_eq!(rec.column_count(), 4);
    assert_eq!(rec.file_kind(), FileKind::Spreadsheet);
}
