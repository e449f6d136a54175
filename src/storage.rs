use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::domain::{Record, RecordStore};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("data file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse JSON records in {}: {source}", .path.display())]
    JsonDecode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse JSONL record in {} at line {line}: {source}", .path.display())]
    JsonLineDecode {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Loads the export once. Accepts a JSON array of records or JSON Lines.
pub fn load_records(path: &Path) -> Result<RecordStore, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        Err(err) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    let records = parse_records(&raw, path)?;
    info!(path = %path.display(), records = records.len(), "loaded records");
    Ok(RecordStore::new(records))
}

pub fn parse_records(raw: &str, origin: &Path) -> Result<Vec<Record>, StorageError> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|source| StorageError::JsonDecode {
            path: origin.to_path_buf(),
            source,
        });
    }

    let mut records = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| StorageError::JsonLineDecode {
            path: origin.to_path_buf(),
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::domain::RecordStore;

    use super::{StorageError, load_records, parse_records};

    #[test]
    fn loads_json_array_exports() {
        let path = temp_file("voc_storage_array.json");
        fs::write(
            &path,
            r#"[
                {"chatId": "a1", "chatText": "hi", "label": "A,B", "latestUserDate": "2025-01-05T10:00:00Z"},
                {"chatId": "a2", "chatText": "there", "label": "", "firstUserDate": "2025-01-06", "extra": true}
            ]"#,
        )
        .expect("fixture should be written");

        let store = load_records(&path).expect("load should succeed");
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].id, "a1");
        let fallback_day = store.records()[1].event_date().map(|day| day.to_string());
        assert_eq!(fallback_day.as_deref(), Some("2025-01-06"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn loads_json_lines_and_reports_bad_lines() {
        let raw = "{\"chatId\": \"1\", \"label\": \"A\"}\n\n{\"chatId\": \"2\"}\n";
        let records = parse_records(raw, Path::new("inline.jsonl")).expect("jsonl should parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].label_csv, "");

        let broken = "{\"chatId\": \"1\"}\n{not json}\n";
        match parse_records(broken, Path::new("inline.jsonl")) {
            Err(StorageError::JsonLineDecode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected line error, got {other:?}"),
        }
    }

    #[test]
    fn odd_date_types_leave_the_record_undated_instead_of_failing() {
        let raw = r#"[
            {"chatId": "1", "label": "A", "latestUserDate": {"seconds": 1736035200}},
            {"chatId": "2", "label": "A", "latestUserDate": "2025-01-05T10:00:00"},
            {"chatId": "3", "label": "B", "firstUserDate": 1736035200000}
        ]"#;
        let records = parse_records(raw, Path::new("inline.json")).expect("export should parse");
        assert_eq!(records.len(), 3);

        let store = RecordStore::new(records);
        assert_eq!(store.undated_count(), 1);
        let fallback_day = store.records()[2].event_date().map(|day| day.to_string());
        assert_eq!(fallback_day.as_deref(), Some("2025-01-05"));
    }

    #[test]
    fn missing_file_is_reported() {
        let path = temp_file("voc_storage_missing.json");
        assert!(matches!(load_records(&path), Err(StorageError::NotFound(_))));
    }

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }
}
