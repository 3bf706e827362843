// Record loader: flattens the nested review corpus into a single table.
//
// The corpus is a JSON array with one element per professor, each element
// an array of review objects. Flattening keeps professor-group order and
// the order of reviews within each group.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::record::{
    ReviewRecord, ReviewTable, FIELD_COMMENT, FIELD_COURSE_ID, FIELD_DIFFICULTY, FIELD_PROFESSOR,
    FIELD_QUALITY,
};
use crate::error::ReviewError;

/// Where the review JSON comes from.
#[derive(Debug, Clone)]
pub enum ReviewSource {
    /// A JSON file on disk.
    Path(PathBuf),
    /// JSON already in memory (e.g. an uploaded file), with a display name.
    Bytes { name: String, bytes: Vec<u8> },
}

impl ReviewSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Human-readable description used in errors and logs.
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Load and flatten reviews from a file or in-memory source.
///
/// Fails with `MalformedInput` if the source can't be read, isn't JSON, or
/// isn't an array of arrays of objects. Fails with `EmptyInput` if it
/// holds no reviews; callers decide whether that is fatal.
pub fn load_reviews(source: &ReviewSource) -> Result<ReviewTable, ReviewError> {
    let name = source.name();
    let raw: Value = match source {
        ReviewSource::Path(path) => {
            let bytes = std::fs::read(path)
                .map_err(|e| ReviewError::malformed(&name, format!("cannot read source: {e}")))?;
            parse_json(&name, &bytes)?
        }
        ReviewSource::Bytes { bytes, .. } => parse_json(&name, bytes)?,
    };
    flatten_groups(&name, raw)
}

fn parse_json(name: &str, bytes: &[u8]) -> Result<Value, ReviewError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ReviewError::malformed(name, format!("invalid JSON: {e}")))
}

/// Concatenate every professor group into one table.
fn flatten_groups(name: &str, raw: Value) -> Result<ReviewTable, ReviewError> {
    let groups = match raw {
        Value::Array(groups) => groups,
        other => {
            return Err(ReviewError::malformed(
                name,
                format!("top level must be an array, found {}", json_kind(&other)),
            ))
        }
    };

    let group_count = groups.len();
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (group_idx, group) in groups.into_iter().enumerate() {
        let items = match group {
            Value::Array(items) => items,
            other => {
                return Err(ReviewError::malformed(
                    name,
                    format!(
                        "professor group {group_idx} must be an array, found {}",
                        json_kind(&other)
                    ),
                ))
            }
        };

        for (row_idx, item) in items.into_iter().enumerate() {
            let object = match item {
                Value::Object(object) => object,
                other => {
                    return Err(ReviewError::malformed(
                        name,
                        format!(
                            "review {row_idx} in professor group {group_idx} must be an object, found {}",
                            json_kind(&other)
                        ),
                    ))
                }
            };

            for key in object.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }

            let record = record_from_object(object).map_err(|reason| {
                ReviewError::malformed(
                    name,
                    format!("review {row_idx} in professor group {group_idx}: {reason}"),
                )
            })?;
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(ReviewError::EmptyInput {
            source_name: name.to_string(),
        });
    }

    info!(
        source = name,
        groups = group_count,
        reviews = records.len(),
        "Loaded reviews"
    );
    debug!(columns = ?columns, "Review columns");

    Ok(ReviewTable::new(columns, records))
}

/// Split one review object into typed fields and passthrough values.
///
/// Only a non-text `Comment` is an error. Ids and ratings that can't be
/// converted stay in `extra` under their source key and export as-is.
fn record_from_object(object: Map<String, Value>) -> Result<ReviewRecord, String> {
    let mut record = ReviewRecord::default();

    for (key, value) in object {
        match key.as_str() {
            FIELD_PROFESSOR => match text_field(value) {
                Ok(v) => record.professor = v,
                Err(raw) => keep_raw(&mut record, key, raw),
            },
            FIELD_COURSE_ID => match text_field(value) {
                Ok(v) => record.course_id = v,
                Err(raw) => keep_raw(&mut record, key, raw),
            },
            FIELD_COMMENT => {
                record.comment = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => {
                        return Err(format!(
                            "`{key}` must be a string or null, found {}",
                            json_kind(&other)
                        ))
                    }
                }
            }
            FIELD_QUALITY => match number_field(value) {
                Ok(v) => record.quality = v,
                Err(raw) => keep_raw(&mut record, key, raw),
            },
            FIELD_DIFFICULTY => match number_field(value) {
                Ok(v) => record.difficulty = v,
                Err(raw) => keep_raw(&mut record, key, raw),
            },
            _ => {
                record.extra.insert(key, value);
            }
        }
    }

    Ok(record)
}

fn keep_raw(record: &mut ReviewRecord, key: String, raw: Value) {
    debug!(field = %key, kind = json_kind(&raw), "Keeping unconvertible value as passthrough");
    record.extra.insert(key, raw);
}

/// Identifier-like fields: strings, with numeric ids accepted as text.
/// Anything else is handed back unchanged.
fn text_field(value: Value) -> Result<Option<String>, Value> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(other),
    }
}

/// Rating fields: numbers, with numeric strings like "4.5" accepted.
/// Anything else (e.g. "N/A") is handed back unchanged.
fn number_field(value: Value) -> Result<Option<f64>, Value> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(Value::String(s)),
        },
        other => Err(other),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(json: &str) -> Result<ReviewTable, ReviewError> {
        load_reviews(&ReviewSource::from_bytes("test.json", json.as_bytes()))
    }

    #[test]
    fn test_flattens_in_group_then_row_order() {
        let table = load_str(
            r#"[
                [{"professor": "A", "Comment": "a1"}, {"professor": "A", "Comment": "a2"}],
                [],
                [{"professor": "B", "Comment": "b1"}]
            ]"#,
        )
        .unwrap();

        let comments: Vec<_> = table.iter().map(|r| r.comment.as_deref()).collect();
        assert_eq!(comments, vec![Some("a1"), Some("a2"), Some("b1")]);
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let table = load_str(
            r#"[[{"professor": "A", "Comment": "x"}, {"course_id": "C1", "professor": "B", "Tags": []}]]"#,
        )
        .unwrap();
        assert_eq!(table.columns(), ["professor", "Comment", "course_id", "Tags"]);
        // Missing keys are simply absent on that row
        assert_eq!(table.records()[1].comment, None);
        assert_eq!(table.records()[0].course_id, None);
    }

    #[test]
    fn test_typed_and_passthrough_fields() {
        let table = load_str(
            r#"[[{"professor": "A", "course_id": 101, "Comment": null,
                  "Quality": 4.5, "Difficulty": "3", "Date": "Jan 1"}]]"#,
        )
        .unwrap();
        let r = &table.records()[0];
        assert_eq!(r.course_id.as_deref(), Some("101"));
        assert_eq!(r.comment, None);
        assert_eq!(r.quality, Some(4.5));
        assert_eq!(r.difficulty, Some(3.0));
        assert_eq!(r.extra.get("Date").and_then(|v| v.as_str()), Some("Jan 1"));
    }

    #[test]
    fn test_object_top_level_is_malformed() {
        let err = load_str(r#"{"not": "an array"}"#).unwrap_err();
        assert!(matches!(err, ReviewError::MalformedInput { .. }), "got {err:?}");
    }

    #[test]
    fn test_flat_array_is_malformed() {
        let err = load_str(r#"[{"professor": "A"}]"#).unwrap_err();
        assert!(matches!(err, ReviewError::MalformedInput { .. }));
        assert!(err.to_string().contains("professor group 0"));
    }

    #[test]
    fn test_non_object_row_is_malformed() {
        let err = load_str(r#"[[{"professor": "A"}, "oops"]]"#).unwrap_err();
        assert!(err.to_string().contains("review 1 in professor group 0"));
    }

    #[test]
    fn test_unconvertible_ratings_and_ids_pass_through() {
        let table = load_str(
            r#"[[{"professor": true, "Comment": "fine", "Quality": "N/A", "Difficulty": {"x": 1}},
                 {"professor": "B", "Comment": "ok", "Quality": 4}]]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);

        let first = &table.records()[0];
        assert_eq!(first.quality, None);
        assert_eq!(first.professor, None);
        assert_eq!(first.cell(FIELD_QUALITY).as_deref(), Some("N/A"));
        assert_eq!(first.cell(FIELD_PROFESSOR).as_deref(), Some("true"));
        assert_eq!(first.cell(FIELD_DIFFICULTY).as_deref(), Some(r#"{"x":1}"#));

        let second = &table.records()[1];
        assert_eq!(second.quality, Some(4.0));
        assert!(second.extra.is_empty());
        assert_eq!(
            table.columns(),
            ["professor", "Comment", "Quality", "Difficulty"]
        );
    }

    #[test]
    fn test_wrong_comment_type_is_malformed() {
        let err = load_str(r#"[[{"Comment": 5}]]"#).unwrap_err();
        assert!(matches!(err, ReviewError::MalformedInput { .. }));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = load_str("[[{").unwrap_err();
        assert!(matches!(err, ReviewError::MalformedInput { .. }));
    }

    #[test]
    fn test_missing_file_is_malformed() {
        let err = load_reviews(&ReviewSource::from_path("/nonexistent/reviews.json")).unwrap_err();
        assert!(matches!(err, ReviewError::MalformedInput { .. }));
        assert!(err.to_string().contains("/nonexistent/reviews.json"));
    }

    #[test]
    fn test_no_rows_is_empty_input() {
        for json in ["[]", "[[], []]"] {
            let err = load_str(json).unwrap_err();
            assert!(err.is_recoverable(), "{json} should be EmptyInput, got {err:?}");
        }
    }
}
