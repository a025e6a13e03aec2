use proptest::prelude::*;

use tabular_session::error::IngestionError;
use tabular_session::ingestion::{ingest, IngestionOptions, TextEncoding};
use tabular_session::types::Value;

#[derive(Debug, Clone, Copy)]
enum Wire {
    Utf8,
    Latin1,
    Windows1252,
    Utf16LeBom,
}

fn encode(text: &str, wire: Wire) -> Vec<u8> {
    match wire {
        Wire::Utf8 => text.as_bytes().to_vec(),
        // Only code points below U+0100 are generated, and none in the C1 range.
        Wire::Latin1 | Wire::Windows1252 => text.chars().map(|c| c as u32 as u8).collect(),
        Wire::Utf16LeBom => {
            let mut out = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
    }
}

fn wire() -> impl Strategy<Value = Wire> {
    prop_oneof![
        Just(Wire::Utf8),
        Just(Wire::Latin1),
        Just(Wire::Windows1252),
        Just(Wire::Utf16LeBom),
    ]
}

fn cells() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("x[a-zA-Z éèüñçÅø]{0,8}[a-z]", 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn decodable_inputs_round_trip_through_the_reported_encoding(values in cells(), wire in wire()) {
        let mut text = String::from("name,n\n");
        for (i, v) in values.iter().enumerate() {
            text.push_str(&format!("{v},{i}\n"));
        }
        let bytes = encode(&text, wire);

        let out = ingest("words.csv", &bytes, None, &IngestionOptions::default()).unwrap();
        prop_assert!(!out.metadata.lossy);

        let used = out.metadata.encoding_used.clone().unwrap();
        prop_assert!(out.metadata.attempted_encodings.contains(&used));
        let decoded = TextEncoding::from_label(&used).unwrap().decode_strict(&bytes).unwrap();

        // The table holds exactly what the reported encoding yields.
        let expected: Vec<String> = decoded
            .lines()
            .skip(1)
            .filter_map(|l| l.rsplit_once(',').map(|(v, _)| v.to_string()))
            .collect();
        let got: Vec<String> = out.table.column(0).map(|v| v.to_string()).collect();
        prop_assert_eq!(&got, &expected);

        // Unicode wires can only be read one way.
        if matches!(wire, Wire::Utf8 | Wire::Utf16LeBom) {
            prop_assert_eq!(&*decoded, text.as_str());
            prop_assert_eq!(got, values);
        }
    }
}

#[test]
fn windows_1252_smart_quotes_survive() {
    let bytes = b"quote,author\n\x93Less is more\x94,Mies\n";
    let out = ingest("q.csv", bytes, None, &IngestionOptions::default()).unwrap();
    assert!(!out.metadata.lossy);
    assert_eq!(
        out.table.rows[0][0],
        Value::Utf8("\u{201C}Less is more\u{201D}".into())
    );
}

#[test]
fn shift_jis_round_trips() {
    let text = "名前,都市\n山田太郎,東京都\n佐藤花子,大阪府\n鈴木一郎,北海道札幌市\n";
    let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(text);
    let out = ingest("jp.csv", &bytes, None, &IngestionOptions::default()).unwrap();

    assert_eq!(out.metadata.encoding_used.as_deref(), Some("Shift_JIS"));
    assert_eq!(out.metadata.detected_encoding.as_deref(), Some("Shift_JIS"));
    assert!(!out.metadata.lossy);
    assert_eq!(out.table.column_names(), vec!["名前", "都市"]);
    assert_eq!(out.table.rows[2][1], Value::Utf8("北海道札幌市".into()));
}

#[test]
fn bomless_utf16_is_read() {
    let text = "city,temp\nOslo,-3\nLima,19\n";
    let bytes: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    let out = ingest("w.csv", &bytes, None, &IngestionOptions::default()).unwrap();
    assert_eq!(out.metadata.encoding_used.as_deref(), Some("utf-16"));
    assert_eq!(out.table.rows[1][1], Value::Int64(19));
}

#[test]
fn explicit_encoding_wins_over_detection() {
    // Valid UTF-8 bytes, read as Latin-1 on request.
    let bytes = "name\nJosé\n".as_bytes();
    let out = ingest("n.csv", bytes, Some("ISO-8859-1"), &IngestionOptions::default()).unwrap();
    assert_eq!(out.metadata.encoding_used.as_deref(), Some("iso-8859-1"));
    assert_eq!(out.table.rows[0][0], Value::Utf8("JosÃ©".into()));
}

#[test]
fn unknown_explicit_encoding_is_rejected() {
    let err = ingest("n.csv", b"a\n1\n", Some("ebcdic-klingon"), &IngestionOptions::default()).unwrap_err();
    assert!(matches!(err, IngestionError::UnknownEncoding { label } if label == "ebcdic-klingon"));
}

#[test]
fn exhausted_candidates_without_lossy_fallback() {
    let opts = IngestionOptions {
        allow_lossy_fallback: false,
        ..IngestionOptions::default()
    };
    // Structurally broken under every candidate.
    let err = ingest("b.csv", b"a,b\n1,2,3\n", None, &opts).unwrap_err();
    match err {
        IngestionError::ParseFailed { attempted, .. } => {
            assert_eq!(attempted.first().map(String::as_str), Some("utf-8"));
            assert!(!attempted.iter().any(|a| a.contains("lossy")));
        }
        other => panic!("unexpected {other:?}"),
    }
}
